use std::fmt;
use std::str::FromStr;

/// The four actions the toolkit can be asked to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Train,
    Test,
    Write,
    Eval,
}

impl Action {
    /// Section name used inside the config and in `command=`.
    pub fn name(self) -> &'static str {
        match self {
            Action::Train => "Train",
            Action::Test => "Test",
            Action::Write => "Write",
            Action::Eval => "Eval",
        }
    }

    pub fn config_file_name(self) -> &'static str {
        match self {
            Action::Train => "train.cntk",
            Action::Test => "test.cntk",
            Action::Write => "write.cntk",
            Action::Eval => "eval.cntk",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Action {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> anyhow::Result<Self> {
        Ok(match raw.to_ascii_lowercase().as_str() {
            "train" => Action::Train,
            "test" => Action::Test,
            "write" => Action::Write,
            "eval" => Action::Eval,
            _ => anyhow::bail!("unknown action: {raw} (expected train, test, write or eval)"),
        })
    }
}
