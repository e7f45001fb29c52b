use cntkit_core::{Error, ShapeSpec};
use cntkit_output::{
    decode_sequences, parse_shapes, parse_test_summary, resolve_node, resolve_shape,
};

const RNN_OUTPUT: &str = "0\t|w.shape 1 1
0\t|w 60.000000
1\t|w.shape 1 2
1\t|w 22.000000
1\t|w 24.000000
";

#[test]
fn decodes_variable_length_sequences() {
    let result = decode_sequences(RNN_OUTPUT).unwrap();
    assert_eq!(result.len(), 2);

    let first = &result.sequences[0];
    assert_eq!(first.len(), 1);
    assert_eq!(first.samples[0].shape.dims(), &[1]);
    assert_eq!(first.samples[0].data, vec![60.0]);

    let second = &result.sequences[1];
    assert_eq!(second.len(), 2);
    let stacked = second.stacked().unwrap().unwrap();
    assert_eq!(stacked.shape.dims(), &[1, 2]);
    assert_eq!(stacked.data, vec![22.0, 24.0]);
    assert_eq!(stacked.get(&[0, 1]), Some(24.0));

    assert_eq!(result.element_count(), 3);
}

#[test]
fn empty_output_yields_one_empty_sequence() {
    let result = decode_sequences("").unwrap();
    assert_eq!(result.len(), 1);
    assert!(result.sequences[0].is_empty());
}

#[test]
fn windows_specials_inside_rows() {
    let text = "0\t|w.shape 3 1\n0\t|w 1.#INF -1.#IND 0.5\n";
    let result = decode_sequences(text).unwrap();
    let data = &result.sequences[0].samples[0].data;
    assert_eq!(data[0], f64::INFINITY);
    assert!(data[1].is_nan());
    assert_eq!(data[2], 0.5);
}

#[test]
fn unknown_token_inside_rows() {
    let text = "0\t|w.shape 1 1\n0\t|w what\n";
    assert!(matches!(
        decode_sequences(text).unwrap_err(),
        Error::Conversion { token } if token == "what"
    ));
}

#[test]
fn log_shapes_resolve_against_decoded_output() {
    let log = "\
-------------------------------------------------------------------
Validating network. 4 nodes to process in pass 1.

Validating --> features = InputValue() -> [1 x *]
Validating --> out = Plus (features, features) -> [1 x * {1,1}]
Validating --> loss = SquareError (out, features) -> [1 x 1]

Final Results: Minibatch[1-1]: SamplesSeen = 3; loss = 0.5 * 3
";
    let shapes = parse_shapes(log).unwrap();
    assert_eq!(shapes["out"], ShapeSpec::from_dims(&[Some(1), None]));

    let result = decode_sequences(RNN_OUTPUT).unwrap();
    let resolved = resolve_node(&shapes, "out", result.element_count()).unwrap();
    assert_eq!(resolved.shape.dims(), &[1, 3]);
    assert_eq!(resolved.size, 3);

    let fixed = resolve_node(&shapes, "loss", 1).unwrap();
    assert_eq!(fixed.shape.dims(), &[1, 1]);

    let summary = parse_test_summary(log).unwrap();
    assert_eq!(summary.get("loss"), Some(0.5));
    assert_eq!(summary.get("SamplesSeen"), Some(3.0));
}

#[test]
fn resolution_properties() {
    let spec = ShapeSpec::from_dims(&[Some(2), None]);
    assert_eq!(resolve_shape("x", &spec, 2).unwrap().shape.dims(), &[2]);
    assert_eq!(resolve_shape("x", &spec, 6).unwrap().shape.dims(), &[2, 3]);
    assert!(resolve_shape("x", &spec, 5).is_err());

    let ambiguous = ShapeSpec::from_dims(&[None, None]);
    assert!(resolve_shape("x", &ambiguous, 4).is_err());
}

#[test]
fn huge_logged_shape_is_an_error() {
    let log = "Validating --> out = X(a) -> [4294967296 x 4294967296 x 4294967296 x *]\n";
    let shapes = parse_shapes(log).unwrap();
    assert!(matches!(
        resolve_node(&shapes, "out", 6).unwrap_err(),
        Error::ShapeOverflow { .. }
    ));
}
