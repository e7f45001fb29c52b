use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use cntkit_core::{
    with_command, Action, ConfigRenderer, ContextSettings, EvalRequest, ExecutionContext,
    InputMap, ModelDescription, SgdParams,
};
use tracing::{debug, info};

/// Model path placeholder, filled in by the environment that runs the export.
pub const MODEL_PATH: &str = "$ModelDir$/model";
/// Output base placeholder, filled in by the environment that runs the export.
pub const OUTPUT_BASE: &str = "$DataDir$/out";

/// Records actions as configuration instead of running them, so the whole
/// sequence can be exported and run elsewhere (e.g. on a cluster).
pub struct DeferredContext {
    name: String,
    settings: ContextSettings,
    configs: Vec<String>,
    labels: Vec<String>,
    counts: HashMap<Action, usize>,
}

impl DeferredContext {
    pub fn new(name: impl Into<String>, settings: ContextSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            configs: Vec::new(),
            labels: Vec::new(),
            counts: HashMap::new(),
        }
    }

    /// Section labels of the recorded actions, in run order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// The combined config: every recorded section followed by one
    /// `command=` line that runs them in order.
    pub fn to_config(&self) -> String {
        with_command(&self.configs.join("\n"), &self.labels)
    }

    /// Writes the combined config to `<root>/<name>/<name>.cntk`.
    pub fn export(&self, root: &Path) -> Result<PathBuf> {
        let dir = root.join(&self.name);
        if dir.exists() {
            info!(dir = %dir.display(), "export directory already exists");
        } else {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create export directory {}", dir.display()))?;
        }

        let path = dir.join(format!("{}.cntk", self.name));
        fs::write(&path, self.to_config())
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(
            context = %self.name,
            actions = self.labels.len(),
            path = %path.display(),
            "exported config"
        );
        Ok(path)
    }

    /// `Train` for the first train action, `Train2` for the second, and so on,
    /// so sections in one file never share a name.
    fn next_label(&mut self, action: Action) -> String {
        let count = self.counts.entry(action).or_insert(0);
        *count += 1;
        match *count {
            1 => action.name().to_string(),
            n => format!("{}{n}", action.name()),
        }
    }

    fn record(
        &mut self,
        action: Action,
        render: impl FnOnce(&ConfigRenderer<'_>, &str) -> String,
    ) {
        let label = self.next_label(action);
        let config = render(
            &ConfigRenderer::new(&self.settings, MODEL_PATH, OUTPUT_BASE),
            &label,
        );
        debug!(context = %self.name, %label, "recorded action");
        self.configs.push(config);
        self.labels.push(label);
    }
}

impl ExecutionContext for DeferredContext {
    type Trained = ();
    type Tested = ();
    type Written = ();
    type Evaluated = ();

    fn name(&self) -> &str {
        &self.name
    }

    fn settings(&self) -> &ContextSettings {
        &self.settings
    }

    /// `override_existing` has no meaning until the export runs; the
    /// environment running it owns the model directory.
    fn train(
        &mut self,
        model: &ModelDescription,
        sgd: &SgdParams,
        reader: &InputMap,
        _override_existing: bool,
    ) -> Result<()> {
        model.check_streams(reader)?;
        self.record(Action::Train, |r, label| r.train(label, model, sgd, reader));
        Ok(())
    }

    fn test(&mut self, reader: &InputMap) -> Result<()> {
        ensure!(
            !reader.is_empty(),
            "test needs an input map describing the data to test on"
        );
        self.record(Action::Test, |r, label| r.test(label, reader));
        Ok(())
    }

    fn write(&mut self, reader: &InputMap) -> Result<()> {
        self.record(Action::Write, |r, label| r.write(label, reader));
        Ok(())
    }

    fn eval(&mut self, request: &EvalRequest, reader: &InputMap) -> Result<()> {
        request.model.check_streams(reader)?;
        self.record(Action::Eval, |r, label| r.eval(label, request, reader));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_actions_get_distinct_labels() {
        let mut ctx = DeferredContext::new("job", ContextSettings::default());
        let reader = InputMap::new("d.txt");
        ctx.write(&reader).unwrap();
        ctx.write(&reader).unwrap();
        ctx.test(&reader).unwrap();
        ctx.write(&reader).unwrap();

        assert_eq!(ctx.labels(), &["Write", "Write2", "Test", "Write3"]);
        assert!(ctx.to_config().ends_with("command=Write:Write2:Test:Write3"));
    }

    #[test]
    fn uses_placeholder_paths() {
        let mut ctx = DeferredContext::new("job", ContextSettings::default());
        ctx.write(&InputMap::new("d.txt")).unwrap();
        let config = ctx.to_config();
        assert!(config.contains("ModelPath=\"$ModelDir$/model\""));
        assert!(config.contains("outputPath = \"$DataDir$/out\""));
    }
}
