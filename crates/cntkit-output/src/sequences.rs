use cntkit_core::{Error, Result, ResultSet, Sequence, Shape, Tensor};
use tracing::debug;

use crate::sanitize_tokens;

const SHAPE_TAG: &str = "w.shape";

/// One row of the tabular write format: `<seq>\t|<tag> <payload...>`.
struct Row<'a> {
    seq: &'a str,
    tag: &'a str,
    payload: Vec<&'a str>,
}

impl<'a> Row<'a> {
    fn parse(line: &'a str) -> Result<Self> {
        let mut fields = line.split('|');
        let seq = fields.next().unwrap_or_default().trim();
        let Some(body) = fields.next() else {
            return Err(Error::FormatViolation {
                line: line.to_string(),
            });
        };
        let mut tokens = body.split_whitespace();
        let tag = tokens.next().unwrap_or_default();
        Ok(Row {
            seq,
            tag,
            payload: tokens.collect(),
        })
    }
}

/// Per-sample shape of a sequence from its `w.shape` tokens.
///
/// The trailing token counts the samples in the sequence and is not part of
/// a sample's shape. With only that token present a sample is one element
/// `(1,)`; with no tokens at all it is a scalar.
pub fn sample_shape<S: AsRef<str>>(tokens: &[S]) -> Result<Shape> {
    if tokens.is_empty() {
        return Ok(Shape::default());
    }
    let mut dims = tokens
        .iter()
        .map(|t| {
            let t = t.as_ref();
            t.parse::<usize>().map_err(|_| Error::InvalidDimension {
                token: t.to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    dims.pop();
    if dims.is_empty() {
        dims.push(1);
    }
    Ok(Shape::from_slice(&dims))
}

/// Decodes the tabular output of a write/eval action, written with
///
/// ```text
/// sequencePrologue=%d\t|w.shape %x\n%d\t|w\s
/// sampleSeparator=\n%d\t|w\s
/// elementSeparator=\s
/// ```
///
/// A change of sequence id must come with a `w.shape` row; every further row
/// with the same id is one sample, reshaped column-major into that shape.
///
/// The final sequence is always flushed, even when empty, so decoding empty
/// text yields one empty sequence. Callers rely on the result never being
/// empty. An intermediate sequence that got a shape row but no samples is
/// dropped.
pub fn decode_sequences(output: &str) -> Result<ResultSet> {
    let mut sequences = Vec::new();
    let mut samples: Vec<Tensor> = Vec::new();
    let mut last_seq: Option<&str> = None;
    let mut shape = Shape::default();

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let row = Row::parse(line)?;

        if last_seq != Some(row.seq) {
            if row.tag != SHAPE_TAG {
                return Err(Error::FormatViolation {
                    line: line.to_string(),
                });
            }
            if !samples.is_empty() {
                sequences.push(Sequence::new(std::mem::take(&mut samples)));
            }
            last_seq = Some(row.seq);
            shape = sample_shape(&row.payload)?;
            continue;
        }

        let values = sanitize_tokens(&row.payload)?;
        samples.push(Tensor::from_column_major(shape.clone(), values)?);
    }
    sequences.push(Sequence::new(samples));

    debug!(sequences = sequences.len(), "decoded result output");
    Ok(ResultSet { sequences })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_shape_drops_sequence_axis() {
        assert_eq!(sample_shape(&["1", "1"]).unwrap().dims(), &[1]);
        assert_eq!(sample_shape(&["2", "3", "5"]).unwrap().dims(), &[2, 3]);
        assert_eq!(sample_shape(&["7"]).unwrap().dims(), &[1]);
        assert_eq!(sample_shape::<&str>(&[]).unwrap().rank(), 0);
        assert!(sample_shape(&["2", "*"]).is_err());
    }

    #[test]
    fn row_without_separator_is_rejected() {
        let err = decode_sequences("0 w.shape 1 1").unwrap_err();
        assert!(matches!(err, Error::FormatViolation { .. }));
    }

    #[test]
    fn data_row_for_new_sequence_is_rejected() {
        let text = "0\t|w.shape 1 1\n0\t|w 1.0\n1\t|w 2.0\n";
        let err = decode_sequences(text).unwrap_err();
        assert!(matches!(err, Error::FormatViolation { line } if line == "1\t|w 2.0"));
    }

    #[test]
    fn reshapes_column_major() {
        let text = "0\t|w.shape 2 3 1\n0\t|w 1 2 3 4 5 6\n";
        let result = decode_sequences(text).unwrap();
        let t = &result.sequences[0].samples[0];
        assert_eq!(t.shape.dims(), &[2, 3]);
        assert_eq!(t.get(&[1, 0]), Some(2.0));
        assert_eq!(t.get(&[0, 1]), Some(3.0));
        assert_eq!(t.to_row_major().data, vec![1.0, 3.0, 5.0, 2.0, 4.0, 6.0]);
    }

    #[test]
    fn wrong_sample_size_is_rejected() {
        let text = "0\t|w.shape 2 1\n0\t|w 1 2 3\n";
        assert!(matches!(
            decode_sequences(text).unwrap_err(),
            Error::ReshapeMismatch { expected: 2, got: 3, .. }
        ));
    }

    #[test]
    fn huge_sample_shape_is_rejected() {
        let text = "0\t|w.shape 4294967296 4294967296 4294967296 1\n0\t|w 1.0\n";
        assert!(matches!(
            decode_sequences(text).unwrap_err(),
            Error::ShapeOverflow { .. }
        ));
    }

    #[test]
    fn sequence_without_samples_is_dropped() {
        let text = "0\t|w.shape 1 0\n1\t|w.shape 1 1\n1\t|w 5\n";
        let result = decode_sequences(text).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.sequences[0].samples[0].data, vec![5.0]);
    }
}
