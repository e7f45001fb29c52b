use crate::{Shape, ShapeSpec};

/// Failures of the output decoding core.
///
/// None of these are transient: each one means the toolkit's output did not
/// have the form the caller asked for, so they are surfaced as-is.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A data row showed up where a new sequence needed its shape row.
    #[error("expected shape information, but got \"{line}\"")]
    FormatViolation { line: String },

    #[error("could not convert \"{token}\" to a number")]
    Conversion { token: String },

    #[error("invalid dimension \"{token}\" in shape declaration")]
    InvalidDimension { token: String },

    #[error("node '{node}' has shape {spec}, but at most one dimension can be left unspecified")]
    ShapeAmbiguity { node: String, spec: ShapeSpec },

    #[error("unable to retrieve expected size: observed {observed} elements, need at least {expected}")]
    ShapeInsufficiency { observed: usize, expected: usize },

    #[error("could not infer the missing dimension: {observed} elements do not divide into blocks of {known}")]
    IndivisibleShape { observed: usize, known: usize },

    #[error("cannot reshape {got} elements into {shape} ({expected} elements)")]
    ReshapeMismatch {
        shape: Shape,
        expected: usize,
        got: usize,
    },

    #[error("shape {shape} holds more elements than can be addressed")]
    ShapeOverflow { shape: String },

    #[error("no final results line found in output")]
    MissingSummary,

    #[error("malformed final results entry \"{part}\"")]
    MalformedSummary { part: String },

    #[error("no stream in the input map feeds input(s) {inputs}")]
    UnmappedInputs { inputs: String },

    #[error("no shape was reported for node '{node}'")]
    UnknownNode { node: String },
}

pub type Result<T> = std::result::Result<T, Error>;
