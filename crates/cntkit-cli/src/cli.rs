use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use cntkit_core::{Action, Device, InputMap, Precision, SgdParams, StreamMapping};
use cntkit_local::EXECUTABLE_ENV;

#[derive(Parser, Debug)]
#[command(name = "cntkit", version, about = "Run CNTK actions and decode their output")]
pub struct Cli {
    /// Log filter (RUST_LOG syntax)
    #[arg(long, global = true, default_value = "info")]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode a tabular result file written by a write or eval action
    Decode {
        file: PathBuf,

        /// Print sample values in row-major instead of column-major order
        #[arg(long)]
        row_major: bool,
    },

    /// List the node shapes announced in a toolkit log
    Shapes { file: PathBuf },

    /// Print the final results of a test run's log
    Summary { file: PathBuf },

    /// Complete a shape with one free dimension from an element count
    Resolve {
        /// Shape as printed by the toolkit, e.g. "2 x *"
        #[arg(long)]
        shape: String,

        /// Number of elements observed
        #[arg(long)]
        count: usize,
    },

    /// Train a model locally
    Train {
        #[command(flatten)]
        context: ContextArgs,

        /// File holding the network description
        #[arg(long)]
        model: PathBuf,

        /// Input node the network declares; each needs a --stream
        #[arg(long = "input")]
        inputs: Vec<String>,

        /// Fail instead of replacing models left by an earlier run
        #[arg(long)]
        keep_models: bool,

        #[command(flatten)]
        reader: ReaderArgs,

        #[command(flatten)]
        sgd: SgdArgs,
    },

    /// Test the context's trained model locally
    Test {
        #[command(flatten)]
        context: ContextArgs,

        #[command(flatten)]
        reader: ReaderArgs,
    },

    /// Write the context's trained model outputs locally
    Write {
        #[command(flatten)]
        context: ContextArgs,

        #[command(flatten)]
        reader: ReaderArgs,
    },

    /// Evaluate one node of a network locally
    Eval {
        #[command(flatten)]
        context: ContextArgs,

        /// File holding the network description
        #[arg(long)]
        model: PathBuf,

        /// Node to evaluate
        #[arg(long)]
        node: String,

        /// Input node the network declares; each needs a --stream
        #[arg(long = "input")]
        inputs: Vec<String>,

        /// Write the gradient with respect to this input instead
        #[arg(long)]
        gradient_of: Option<String>,

        #[command(flatten)]
        reader: ReaderArgs,
    },

    /// Render actions into one config file to run elsewhere
    Export {
        /// Export name; the file is <out>/<name>/<name>.cntk
        #[arg(long)]
        name: String,

        #[arg(long, default_value = ".")]
        out: PathBuf,

        /// Actions in run order, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        actions: Vec<Action>,

        /// Device for the exported run (cpu or gpu:N)
        #[arg(long, default_value = "cpu")]
        device: Device,

        /// float or double
        #[arg(long, default_value = "float")]
        precision: Precision,

        /// Network description, needed by train and eval
        #[arg(long)]
        model: Option<PathBuf>,

        /// Node to evaluate, needed by eval
        #[arg(long)]
        node: Option<String>,

        /// Input node the network declares; each needs a --stream
        #[arg(long = "input")]
        inputs: Vec<String>,

        #[command(flatten)]
        reader: ReaderArgs,

        #[command(flatten)]
        sgd: SgdArgs,
    },
}

#[derive(Args, Debug)]
pub struct ContextArgs {
    /// Context name; a fresh random one is used if omitted
    #[arg(long)]
    pub context: Option<String>,

    /// Directory holding the _cntk_<name> staging directories
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Device for inference and training (cpu or gpu:N)
    #[arg(long, default_value = "cpu")]
    pub device: Device,

    /// float or double
    #[arg(long, default_value = "float")]
    pub precision: Precision,

    /// Toolkit executable
    #[arg(long, env = EXECUTABLE_ENV, default_value = "cntk")]
    pub cntk: PathBuf,

    /// Keep the staging directory after a successful run. Needed to run
    /// test or write on a model trained by an earlier train command
    #[arg(long)]
    pub keep: bool,
}

#[derive(Args, Debug)]
pub struct ReaderArgs {
    /// Data file in the toolkit's text format
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Stream mapping node:alias:dim[:sparse]; repeat for each input
    #[arg(long = "stream")]
    pub streams: Vec<StreamMapping>,

    #[arg(long)]
    pub randomize: bool,
}

impl ReaderArgs {
    pub fn input_map(&self) -> InputMap {
        InputMap {
            file: self.data.clone(),
            streams: self.streams.clone(),
            randomize: self.randomize,
        }
    }
}

#[derive(Args, Debug)]
pub struct SgdArgs {
    /// Samples per epoch, 0 for the whole data set
    #[arg(long, default_value_t = 0)]
    pub epoch_size: usize,

    #[arg(long, default_value_t = 25)]
    pub minibatch_size: usize,

    /// Learning rate per epoch, colon separated (e.g. 0.8:0.4:0.1)
    #[arg(long, value_delimiter = ':', default_value = "0.1")]
    pub learning_rate: Vec<f64>,

    #[arg(long, default_value_t = 0.9)]
    pub momentum: f64,

    #[arg(long, default_value_t = 1)]
    pub max_epochs: usize,

    #[arg(long)]
    pub dropout: Option<f64>,

    /// Per-sample gradient clipping threshold
    #[arg(long)]
    pub clip: Option<f64>,
}

impl SgdArgs {
    pub fn params(&self) -> SgdParams {
        SgdParams {
            epoch_size: self.epoch_size,
            minibatch_size: self.minibatch_size,
            learning_rates_per_mb: self.learning_rate.clone(),
            momentum_per_mb: self.momentum,
            max_epochs: self.max_epochs,
            dropout_rate: self.dropout,
            clipping_threshold_per_sample: self.clip,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_export_actions() {
        let cli = Cli::parse_from([
            "cntkit", "export", "--name", "job", "--actions", "train,test", "--device", "gpu:0",
            "--learning-rate", "0.8:0.1",
        ]);
        let Command::Export {
            actions,
            device,
            sgd,
            ..
        } = cli.command
        else {
            panic!("expected export");
        };
        assert_eq!(actions, vec![Action::Train, Action::Test]);
        assert_eq!(device, Device::Gpu { device_id: 0 });
        assert_eq!(sgd.params().learning_rates_per_mb, vec![0.8, 0.1]);
    }

    #[test]
    fn keep_help_mentions_chaining() {
        let cmd = Cli::command();
        let train = cmd.find_subcommand("train").unwrap();
        let keep = train
            .get_arguments()
            .find(|a| a.get_id() == "keep")
            .unwrap();
        let help = keep.get_help().unwrap().to_string();
        assert!(help.contains("trained by an earlier train command"));
    }

    #[test]
    fn declared_inputs_are_repeatable() {
        let cli = Cli::parse_from([
            "cntkit", "eval", "--model", "m.ndl", "--node", "out", "--input", "a", "--input",
            "b", "--stream", "a:x:1",
        ]);
        let Command::Eval { inputs, reader, .. } = cli.command else {
            panic!("expected eval");
        };
        assert_eq!(inputs, vec!["a", "b"]);
        assert_eq!(reader.streams.len(), 1);
    }
}
