use crate::{ContextSettings, Error, EvalRequest, InputMap, Result, SgdParams};

/// Network description in the toolkit's own description language.
///
/// The text is passed through untouched. `inputs` lists the input nodes it
/// declares; train and eval refuse to run while one of them has no stream
/// in the [`InputMap`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModelDescription {
    pub text: String,
    pub inputs: Vec<String>,
}

impl ModelDescription {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            inputs: Vec::new(),
        }
    }

    pub fn with_inputs<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs = inputs.into_iter().map(Into::into).collect();
        self
    }

    /// Declared inputs that no stream of `reader` feeds.
    pub fn unmapped_inputs(&self, reader: &InputMap) -> Vec<&str> {
        self.inputs
            .iter()
            .map(String::as_str)
            .filter(|input| !reader.feeds(input))
            .collect()
    }

    /// Fails if any declared input has no stream in `reader`.
    pub fn check_streams(&self, reader: &InputMap) -> Result<()> {
        let unmapped = self.unmapped_inputs(reader);
        if unmapped.is_empty() {
            return Ok(());
        }
        Err(Error::UnmappedInputs {
            inputs: unmapped.join(", "),
        })
    }
}

/// Tabular output format the result decoder understands.
/// `%x` is the sample shape and `%d` the sequence id.
const OUTPUT_FORMAT: &str = r"format = [
    sequencePrologue = %d\t|w.shape %x\n%d\t|w\s
    sampleSeparator = \n%d\t|w\s
    elementSeparator = \s
]";

/// Renders action configs for one context's paths and settings.
pub struct ConfigRenderer<'a> {
    settings: &'a ContextSettings,
    model_path: &'a str,
    output_base: &'a str,
}

impl<'a> ConfigRenderer<'a> {
    pub fn new(settings: &'a ContextSettings, model_path: &'a str, output_base: &'a str) -> Self {
        Self {
            settings,
            model_path,
            output_base,
        }
    }

    fn global_params(&self, with_model_path: bool) -> Vec<String> {
        let mut lines = vec![
            format!("DeviceId={}", self.settings.device.config_id()),
            format!("Precision=\"{}\"", self.settings.precision.as_str()),
        ];
        if with_model_path {
            lines.push(format!("ModelPath=\"{}\"", self.model_path));
        }
        lines
    }

    /// Global parameters, then `label = [ body ]`, newline terminated.
    fn section(&self, with_model_path: bool, label: &str, body: Vec<String>) -> String {
        let mut lines = self.global_params(with_model_path);
        lines.push(format!("{label} = ["));
        lines.extend(body);
        lines.push("]".to_string());
        format!("{}\n", lines.join("\n"))
    }

    pub fn train(
        &self,
        label: &str,
        model: &ModelDescription,
        sgd: &SgdParams,
        reader: &InputMap,
    ) -> String {
        let mut body = vec![
            "    action = \"train\"".to_string(),
            indent(&network_builder(model), 4),
            indent(&sgd.render(), 4),
        ];
        body.extend(reader_block(reader));
        self.section(true, label, body)
    }

    pub fn test(&self, label: &str, reader: &InputMap) -> String {
        let mut body = vec!["    action = \"test\"".to_string()];
        body.extend(reader_block(reader));
        self.section(true, label, body)
    }

    pub fn write(&self, label: &str, reader: &InputMap) -> String {
        let mut body = vec![
            "    action = \"write\"".to_string(),
            format!("    outputPath = \"{}\"", self.output_base),
            indent(OUTPUT_FORMAT, 4),
        ];
        body.extend(reader_block(reader));
        self.section(true, label, body)
    }

    /// Eval builds the network from the description instead of loading a
    /// trained model, so no `ModelPath` is emitted.
    pub fn eval(&self, label: &str, request: &EvalRequest, reader: &InputMap) -> String {
        let mut body = vec![
            "    action = \"write\"".to_string(),
            indent(&network_builder(&request.model), 4),
            format!("    nodeUnitTest = {}", request.is_backward()),
            format!("    outputNodeNames = {}", request.node),
            format!("    outputPath = \"{}\"", self.output_base),
            indent(OUTPUT_FORMAT, 4),
        ];
        body.extend(reader_block(reader));
        self.section(false, label, body)
    }
}

/// Appends the `command=` line naming the actions to run, in order.
pub fn with_command<S: AsRef<str>>(config: &str, labels: &[S]) -> String {
    let labels = labels.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(":");
    format!("{config}command={labels}")
}

fn network_builder(model: &ModelDescription) -> String {
    format!(
        "NDLNetworkBuilder = [\n    run = ndlFull\n    ndlFull = [\n{}\n    ]\n]",
        indent(model.text.trim_end(), 8)
    )
}

fn reader_block(reader: &InputMap) -> Option<String> {
    let block = reader.render();
    (!block.is_empty()).then(|| indent(&block, 4))
}

fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{pad}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
