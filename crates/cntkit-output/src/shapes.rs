use std::collections::HashMap;
use std::sync::OnceLock;

use cntkit_core::{Error, Result, ShapeSpec};
use regex::Regex;
use tracing::debug;

/// Node name to announced shape, as found in a validation log.
pub type NodeShapes = HashMap<String, ShapeSpec>;

fn shape_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^Validating --> (?P<name>[^ ]+) = [^>]*> \[(?P<shape>[^\]]+)")
            .expect("shape line regex is valid")
    })
}

fn stride_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{.*?\}").expect("stride regex is valid"))
}

/// Parses the inside of a bracketed shape, e.g. `2 x * {1,2}`.
///
/// Debug builds of the toolkit append `{stride,...}` annotations, which are
/// dropped. Each remaining `x`-separated token is a size or `*`.
pub fn parse_shape_spec(text: &str) -> Result<ShapeSpec> {
    let text = stride_regex().replace_all(text, "");
    let dims = text
        .split('x')
        .map(|token| match token.trim() {
            "*" => Ok(None),
            t => t.parse::<usize>().map(Some).map_err(|_| Error::InvalidDimension {
                token: t.to_string(),
            }),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ShapeSpec::from_dims(&dims))
}

/// Parses one `Validating --> name = ... -> [d0 x d1 ...]` line.
/// Returns `Ok(None)` for lines of any other form.
pub fn parse_shape_line(line: &str) -> Result<Option<(String, ShapeSpec)>> {
    let Some(caps) = shape_line_regex().captures(line) else {
        return Ok(None);
    };
    let spec = parse_shape_spec(&caps["shape"])?;
    Ok(Some((caps["name"].to_string(), spec)))
}

/// Collects the shape of every node announced in `output`.
/// A node announced more than once keeps its last shape.
pub fn parse_shapes(output: &str) -> Result<NodeShapes> {
    let mut shapes = NodeShapes::new();
    for line in output.lines() {
        if let Some((name, spec)) = parse_shape_line(line)? {
            shapes.insert(name, spec);
        }
    }
    debug!(nodes = shapes.len(), "parsed node shapes");
    Ok(shapes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_stride_annotation() {
        let (name, spec) = parse_shape_line("Validating --> out = Foo(x) -> [2 x 3 {1,2}]")
            .unwrap()
            .unwrap();
        assert_eq!(name, "out");
        assert_eq!(spec, ShapeSpec::from_dims(&[Some(2), Some(3)]));
    }

    #[test]
    fn wildcard_becomes_free_dim() {
        let (_, spec) = parse_shape_line("Validating --> h = Times (W, x) -> [10 x *]")
            .unwrap()
            .unwrap();
        assert_eq!(spec, ShapeSpec::from_dims(&[Some(10), None]));
    }

    #[test]
    fn skips_other_lines() {
        assert_eq!(parse_shape_line("Validating network. 3 nodes").unwrap(), None);
        assert_eq!(parse_shape_line("  Validating --> out = X -> [2]").unwrap(), None);
    }

    #[test]
    fn parses_bare_spec() {
        assert_eq!(
            parse_shape_spec("3 x * ").unwrap(),
            ShapeSpec::from_dims(&[Some(3), None])
        );
        assert_eq!(
            parse_shape_spec("4{1}").unwrap(),
            ShapeSpec::from_dims(&[Some(4)])
        );
    }

    #[test]
    fn bad_dimension_is_an_error() {
        let err = parse_shape_line("Validating --> out = X -> [2 x q]").unwrap_err();
        assert!(matches!(err, Error::InvalidDimension { token } if token == "q"));
    }

    #[test]
    fn last_announcement_wins() {
        let log = "\
Build info: ...
Validating --> a = InputValue() -> [3 x *]
noise line
Validating --> b = Plus (a, a) -> [3 x *]
Validating --> a = InputValue() -> [3 x 4]
";
        let shapes = parse_shapes(log).unwrap();
        assert_eq!(shapes.len(), 2);
        assert_eq!(shapes["a"], ShapeSpec::from_dims(&[Some(3), Some(4)]));
        assert_eq!(shapes["b"], ShapeSpec::from_dims(&[Some(3), None]));
    }
}
