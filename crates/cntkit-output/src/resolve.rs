use cntkit_core::{Error, ResolvedShape, Result, Shape, ShapeSpec};

use crate::NodeShapes;

/// Completes `spec` using the number of elements actually observed for it.
///
/// With no free dimension the shape is taken as-is. With one free dimension:
/// - exactly as many elements as the known dimensions hold means sequences
///   of length one, and the free axis is dropped;
/// - a larger exact multiple fills the free axis with the quotient;
/// - anything else fails.
pub fn resolve_shape(node: &str, spec: &ShapeSpec, observed: usize) -> Result<ResolvedShape> {
    match spec.free_dims() {
        0 => {
            let shape = spec.to_shape().unwrap_or_default();
            let size = shape.numel()?;
            Ok(ResolvedShape { shape, size })
        }
        1 => {
            let known = spec.known_numel()?;
            if observed == known {
                let shape = Shape(spec.0.iter().flatten().copied().collect());
                return Ok(ResolvedShape { shape, size: known });
            }
            if observed < known {
                return Err(Error::ShapeInsufficiency {
                    observed,
                    expected: known,
                });
            }
            if known == 0 || observed % known != 0 {
                return Err(Error::IndivisibleShape { observed, known });
            }
            let missing = observed / known;
            let shape = Shape(spec.0.iter().map(|d| d.unwrap_or(missing)).collect());
            let size = shape.numel()?;
            Ok(ResolvedShape { shape, size })
        }
        _ => Err(Error::ShapeAmbiguity {
            node: node.to_string(),
            spec: spec.clone(),
        }),
    }
}

/// Looks up `node` in a parsed shape mapping and resolves it.
///
/// A node the toolkit never announced means the request named the wrong
/// node, so this fails rather than guessing.
pub fn resolve_node(shapes: &NodeShapes, node: &str, observed: usize) -> Result<ResolvedShape> {
    let spec = shapes.get(node).ok_or_else(|| Error::UnknownNode {
        node: node.to_string(),
    })?;
    resolve_shape(node, spec, observed)
}
