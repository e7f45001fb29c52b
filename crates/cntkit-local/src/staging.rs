use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cntkit_core::{with_command, Action};
use tracing::info;

const MODEL_DIR_NAME: &str = "Models";
const OUTPUT_FILE_NAME: &str = "out";
const LOG_FILE_NAME: &str = "cntk.log";
const ERROR_FILE_NAME: &str = "error.txt";

/// Per-context working directory: generated configs, the toolkit log, the
/// trained model and the output artifacts all live here.
#[derive(Clone, Debug)]
pub struct StagingArea {
    dir: PathBuf,
    model_dir: PathBuf,
    model_path: PathBuf,
    output_base: PathBuf,
}

impl StagingArea {
    /// Uses `<root>/_cntk_<name>`, creating it unless it is already there.
    pub fn create(root: &Path, name: &str) -> Result<Self> {
        let dir = root.join(format!("_cntk_{name}"));
        if dir.exists() {
            info!(dir = %dir.display(), "staging directory already exists");
        } else {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create staging directory {}", dir.display()))?;
        }

        let model_dir = dir.join(MODEL_DIR_NAME);
        Ok(Self {
            model_path: model_dir.join(name),
            model_dir,
            output_base: dir.join(OUTPUT_FILE_NAME),
            dir,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
    pub fn output_base(&self) -> &Path {
        &self.output_base
    }
    pub fn log_path(&self) -> PathBuf {
        self.dir.join(LOG_FILE_NAME)
    }
    pub fn error_path(&self) -> PathBuf {
        self.dir.join(ERROR_FILE_NAME)
    }

    /// `<base>.<node>`: what a forward evaluation of `node` writes.
    pub fn forward_output(&self, node: &str) -> PathBuf {
        self.artifact(&[node])
    }

    /// `<base>.<input>.grad`: what a backward pass writes for `input`.
    pub fn gradient_output(&self, input: &str) -> PathBuf {
        self.artifact(&[input, "grad"])
    }

    fn artifact(&self, suffixes: &[&str]) -> PathBuf {
        let mut name = OsString::from(self.output_base.as_os_str());
        for suffix in suffixes {
            name.push(".");
            name.push(suffix);
        }
        PathBuf::from(name)
    }

    /// Writes `config` followed by `command=<action>` into the action's
    /// config file and returns its path.
    pub fn save_config(&self, action: Action, config: &str) -> Result<PathBuf> {
        let path = self.dir.join(action.config_file_name());
        fs::write(&path, with_command(config, &[action.name()]))
            .with_context(|| format!("failed to write config {}", path.display()))?;
        Ok(path)
    }

    /// Keeps the output of a failed run next to the configs.
    pub fn record_failure(&self, output: &str) -> Result<PathBuf> {
        let path = self.error_path();
        fs::write(&path, output)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    pub fn remove(&self) -> Result<()> {
        fs::remove_dir_all(&self.dir)
            .with_context(|| format!("failed to remove staging directory {}", self.dir.display()))
    }
}
