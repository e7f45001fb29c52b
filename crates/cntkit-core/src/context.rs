use std::str::FromStr;

use anyhow::{Context, Result};

use crate::{InputMap, ModelDescription, SgdParams};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Device {
    #[default]
    Cpu,
    Gpu {
        device_id: u32,
    },
}

impl Device {
    /// The toolkit's `DeviceId` value: -1 selects the CPU.
    pub fn config_id(self) -> i64 {
        match self {
            Device::Cpu => -1,
            Device::Gpu { device_id } => i64::from(device_id),
        }
    }
}

impl FromStr for Device {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        if raw.eq_ignore_ascii_case("cpu") {
            return Ok(Device::Cpu);
        }

        if let Some(rest) = raw.strip_prefix("gpu:") {
            let device_id: u32 = rest.parse().context("invalid gpu device id")?;
            return Ok(Device::Gpu { device_id });
        }

        anyhow::bail!("unsupported device: {raw} (expected cpu or gpu:N)");
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Precision {
    #[default]
    Float,
    Double,
}

impl Precision {
    pub fn as_str(self) -> &'static str {
        match self {
            Precision::Float => "float",
            Precision::Double => "double",
        }
    }
}

impl FromStr for Precision {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "float" => Ok(Precision::Float),
            "double" => Ok(Precision::Double),
            _ => anyhow::bail!("unsupported precision: {raw} (expected float or double)"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ContextSettings {
    pub device: Device,
    pub precision: Precision,
}

/// What to evaluate: a node's forward output, or with `gradient_of` set, the
/// gradient with respect to that input.
#[derive(Clone, Debug)]
pub struct EvalRequest {
    pub model: ModelDescription,
    pub node: String,
    pub gradient_of: Option<String>,
}

impl EvalRequest {
    pub fn forward(model: ModelDescription, node: impl Into<String>) -> Self {
        Self {
            model,
            node: node.into(),
            gradient_of: None,
        }
    }

    pub fn backward(
        model: ModelDescription,
        node: impl Into<String>,
        input: impl Into<String>,
    ) -> Self {
        Self {
            model,
            node: node.into(),
            gradient_of: Some(input.into()),
        }
    }

    pub fn is_backward(&self) -> bool {
        self.gradient_of.is_some()
    }
}

/// A place toolkit actions can be sent to.
///
/// Implementations either run the toolkit right away and hand back parsed
/// results, or only record the generated configuration for later export.
pub trait ExecutionContext {
    type Trained;
    type Tested;
    type Written;
    type Evaluated;

    fn name(&self) -> &str;
    fn settings(&self) -> &ContextSettings;

    fn train(
        &mut self,
        model: &ModelDescription,
        sgd: &SgdParams,
        reader: &InputMap,
        override_existing: bool,
    ) -> Result<Self::Trained>;

    /// Evaluates the trained model on `reader`'s data.
    fn test(&mut self, reader: &InputMap) -> Result<Self::Tested>;

    /// Writes the trained model's outputs for `reader`'s data.
    fn write(&mut self, reader: &InputMap) -> Result<Self::Written>;

    fn eval(&mut self, request: &EvalRequest, reader: &InputMap) -> Result<Self::Evaluated>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_devices() {
        assert_eq!("cpu".parse::<Device>().unwrap(), Device::Cpu);
        assert_eq!(
            "gpu:1".parse::<Device>().unwrap(),
            Device::Gpu { device_id: 1 }
        );
        assert!("tpu".parse::<Device>().is_err());
        assert!("gpu:x".parse::<Device>().is_err());
        assert_eq!(Device::Cpu.config_id(), -1);
        assert_eq!(Device::Gpu { device_id: 2 }.config_id(), 2);
    }

    #[test]
    fn parses_precision() {
        assert_eq!("Double".parse::<Precision>().unwrap(), Precision::Double);
        assert!("half".parse::<Precision>().is_err());
    }
}
