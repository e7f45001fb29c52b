pub mod registry;
pub mod runner;
pub mod staging;

pub use registry::*;
pub use runner::*;
pub use staging::*;

use std::fs;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use cntkit_core::{
    Action, ConfigRenderer, ContextSettings, EvalRequest, ExecutionContext, InputMap,
    ModelDescription, ResolvedShape, ResultSet, SgdParams,
};
use cntkit_output::{
    decode_sequences, parse_shapes, parse_test_summary, resolve_node, NodeShapes, TestSummary,
};
use tracing::{error, info, warn};

/// Runs every action right away with the toolkit installed on this machine.
pub struct LocalContext {
    name: String,
    settings: ContextSettings,
    staging: StagingArea,
    runner: ProcessRunner,
    clean_up: bool,
}

/// Decoded artifact of an eval action, together with the node shapes the
/// toolkit announced while validating the network.
#[derive(Clone, Debug)]
pub struct EvalOutput {
    /// Node whose values `sequences` holds: the evaluated node, or for a
    /// backward pass the input the gradient was taken for.
    pub target: String,
    pub sequences: ResultSet,
    pub shapes: NodeShapes,
}

impl EvalOutput {
    /// Shape of `target` completed with the number of values received.
    pub fn resolve(&self) -> cntkit_core::Result<ResolvedShape> {
        resolve_node(&self.shapes, &self.target, self.sequences.element_count())
    }
}

impl LocalContext {
    pub fn new(
        root: &Path,
        name: impl Into<String>,
        settings: ContextSettings,
        runner: ProcessRunner,
    ) -> Result<Self> {
        let name = name.into();
        let staging = StagingArea::create(root, &name)?;
        Ok(Self {
            name,
            settings,
            staging,
            runner,
            clean_up: true,
        })
    }

    /// Whether `finish` deletes the staging directory. On by default.
    pub fn with_clean_up(mut self, clean_up: bool) -> Self {
        self.clean_up = clean_up;
        self
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    /// Tears the context down, removing its staging directory unless
    /// clean-up was turned off.
    pub fn finish(self) -> Result<()> {
        if self.clean_up {
            info!(
                context = %self.name,
                dir = %self.staging.dir().display(),
                "removing staging directory"
            );
            self.staging.remove()?;
        }
        Ok(())
    }

    fn render(&self, f: impl FnOnce(&ConfigRenderer<'_>) -> String) -> String {
        let model_path = self.staging.model_path().display().to_string();
        let output_base = self.staging.output_base().display().to_string();
        f(&ConfigRenderer::new(&self.settings, &model_path, &output_base))
    }

    /// Saves `config` for `action`, runs the toolkit on it and returns the
    /// captured output. Successful output stays in `cntk.log`; a failed
    /// run's output is copied to `error.txt` before the error is returned.
    fn call(&self, action: Action, config: &str) -> Result<String> {
        let config_path = self.staging.save_config(action, config)?;
        info!(context = %self.name, %action, config = %config_path.display(), "running toolkit");

        match self
            .runner
            .run(&config_path, self.staging.dir(), &self.staging.log_path())
        {
            Ok(output) => Ok(output),
            Err(RunError::Failed { status, output }) => {
                let saved = self.staging.record_failure(&output)?;
                error!(
                    context = %self.name,
                    %action,
                    %status,
                    log = %saved.display(),
                    "toolkit run failed"
                );
                Err(RunError::Failed { status, output }).with_context(|| {
                    format!("{action} action failed, output saved to {}", saved.display())
                })
            }
            Err(e) => Err(e).with_context(|| format!("{action} action failed")),
        }
    }
}

impl ExecutionContext for LocalContext {
    /// Captured toolkit output of the training run.
    type Trained = String;
    type Tested = TestSummary;
    /// Captured toolkit output; the written values are in the staging area.
    type Written = String;
    type Evaluated = EvalOutput;

    fn name(&self) -> &str {
        &self.name
    }

    fn settings(&self) -> &ContextSettings {
        &self.settings
    }

    fn train(
        &mut self,
        model: &ModelDescription,
        sgd: &SgdParams,
        reader: &InputMap,
        override_existing: bool,
    ) -> Result<String> {
        model.check_streams(reader)?;

        let model_dir = self.staging.model_dir();
        if model_dir.exists() {
            ensure!(
                override_existing,
                "directory '{}' already exists, set override_existing to replace it",
                model_dir.display()
            );
            warn!(
                context = %self.name,
                dir = %model_dir.display(),
                "overriding the existing models"
            );
            fs::remove_dir_all(model_dir)
                .with_context(|| format!("failed to remove {}", model_dir.display()))?;
        }

        let action = Action::Train;
        let config = self.render(|r| r.train(action.name(), model, sgd, reader));
        self.call(action, &config)
    }

    fn test(&mut self, reader: &InputMap) -> Result<TestSummary> {
        ensure!(
            !reader.is_empty(),
            "test needs an input map describing the data to test on"
        );

        let action = Action::Test;
        let config = self.render(|r| r.test(action.name(), reader));
        let output = self.call(action, &config)?;
        parse_test_summary(&output).context("failed to read test results")
    }

    fn write(&mut self, reader: &InputMap) -> Result<String> {
        let action = Action::Write;
        let config = self.render(|r| r.write(action.name(), reader));
        self.call(action, &config)
    }

    fn eval(&mut self, request: &EvalRequest, reader: &InputMap) -> Result<EvalOutput> {
        request.model.check_streams(reader)?;

        let action = Action::Eval;
        let config = self.render(|r| r.eval(action.name(), request, reader));
        let output = self.call(action, &config)?;
        let shapes = parse_shapes(&output).context("failed to read node shapes")?;

        let (target, artifact) = match &request.gradient_of {
            Some(input) => (input.clone(), self.staging.gradient_output(input)),
            None => (request.node.clone(), self.staging.forward_output(&request.node)),
        };
        let text = fs::read_to_string(&artifact)
            .with_context(|| format!("failed to read eval output {}", artifact.display()))?;
        let sequences = decode_sequences(&text)
            .with_context(|| format!("failed to decode {}", artifact.display()))?;

        Ok(EvalOutput {
            target,
            sequences,
            shapes,
        })
    }
}
