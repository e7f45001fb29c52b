use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use thiserror::Error;
use tracing::debug;

/// Environment variable naming the toolkit executable.
pub const EXECUTABLE_ENV: &str = "CNTK_EXECUTABLE_PATH";

const DEFAULT_EXECUTABLE: &str = "cntk";

#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to start {executable}: {source}")]
    Spawn {
        executable: String,
        source: std::io::Error,
    },

    #[error("failed to capture toolkit output in {path}: {source}")]
    Capture {
        path: String,
        source: std::io::Error,
    },

    #[error("toolkit exited with {status}")]
    Failed { status: ExitStatus, output: String },

    /// The run succeeded but printed nothing. A crash that takes the
    /// output down with it looks the same, so this is never treated as an
    /// empty result.
    #[error("no output returned")]
    NoOutput,
}

/// Runs the toolkit executable on one config file and returns everything it
/// printed. Blocks until the process exits; there is no timeout.
#[derive(Clone, Debug)]
pub struct ProcessRunner {
    executable: PathBuf,
    leading_args: Vec<OsString>,
}

impl ProcessRunner {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            leading_args: Vec::new(),
        }
    }

    /// Uses `$CNTK_EXECUTABLE_PATH`, or `cntk` from the `PATH`.
    pub fn from_env() -> Self {
        let executable = std::env::var_os(EXECUTABLE_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_EXECUTABLE));
        Self::new(executable)
    }

    /// Arguments placed before `configFile=...`, e.g. when the executable is
    /// a launcher such as `mpiexec -n 4 cntk`.
    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Runs with `configFile=<config>` from `workdir`.
    ///
    /// Stdout and stderr both go to `log` so their lines keep the order the
    /// toolkit printed them in; the log is then read back and returned.
    pub fn run(&self, config: &Path, workdir: &Path, log: &Path) -> Result<String, RunError> {
        let capture_err = |source| RunError::Capture {
            path: log.display().to_string(),
            source,
        };
        let stdout = File::create(log).map_err(capture_err)?;
        let stderr = stdout.try_clone().map_err(capture_err)?;

        let mut config_arg = OsString::from("configFile=");
        config_arg.push(config);

        debug!(executable = %self.executable.display(), config = %config.display(), "spawning toolkit");
        let status = Command::new(&self.executable)
            .args(&self.leading_args)
            .arg(config_arg)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .status()
            .map_err(|source| RunError::Spawn {
                executable: self.executable.display().to_string(),
                source,
            })?;

        let bytes = fs::read(log).map_err(capture_err)?;
        let output = String::from_utf8_lossy(&bytes).into_owned();

        if !status.success() {
            return Err(RunError::Failed { status, output });
        }
        if output.is_empty() {
            return Err(RunError::NoOutput);
        }
        Ok(output)
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::from_env()
    }
}
