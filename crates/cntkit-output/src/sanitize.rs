use cntkit_core::{Error, Result};

/// Spellings of special values printed by the toolkit on Windows, which the
/// standard float parser does not accept. Matched by prefix.
const WINDOWS_SPECIALS: [(&str, f64); 4] = [
    ("1.#IND", f64::NAN),
    ("-1.#IND", -f64::NAN),
    ("1.#INF", f64::INFINITY),
    ("-1.#INF", f64::NEG_INFINITY),
];

/// Converts textual numbers to floats.
///
/// Accepts plain decimals, the `nan`/`inf` spellings of the standard parser
/// and the Windows `1.#IND`/`1.#INF` forms (with optional leading `-`).
pub fn sanitize_tokens<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<f64>> {
    let fast: std::result::Result<Vec<f64>, _> =
        tokens.iter().map(|t| t.as_ref().parse::<f64>()).collect();
    match fast {
        Ok(values) => Ok(values),
        Err(_) => tokens.iter().map(|t| parse_token(t.as_ref())).collect(),
    }
}

pub fn parse_token(token: &str) -> Result<f64> {
    if let Ok(value) = token.parse::<f64>() {
        return Ok(value);
    }
    WINDOWS_SPECIALS
        .iter()
        .find(|(prefix, _)| token.starts_with(prefix))
        .map(|(_, value)| *value)
        .ok_or_else(|| Error::Conversion {
            token: token.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_windows_specials() {
        let values =
            sanitize_tokens(&["1.0", "1.#INF", "-1.#IND", "nan", "-1.#INF", "1.#IND"]).unwrap();
        assert_eq!(values[0], 1.0);
        assert_eq!(values[1], f64::INFINITY);
        assert!(values[2].is_nan());
        assert!(values[3].is_nan());
        assert_eq!(values[4], f64::NEG_INFINITY);
        assert!(values[5].is_nan());
        assert_ne!(values[2].is_sign_negative(), values[5].is_sign_negative());
    }

    #[test]
    fn accepts_native_spellings() {
        let values = sanitize_tokens(&["-inf", "inf", "2.5e-3", "-nan"]).unwrap();
        assert_eq!(values[0], f64::NEG_INFINITY);
        assert_eq!(values[1], f64::INFINITY);
        assert_eq!(values[2], 2.5e-3);
        assert!(values[3].is_nan());
    }

    #[test]
    fn prefix_match_ignores_suffix_digits() {
        let values = sanitize_tokens(&["1.#INF00", "-1.#IND00"]).unwrap();
        assert_eq!(values[0], f64::INFINITY);
        assert!(values[1].is_nan());
    }

    #[test]
    fn rejects_garbage() {
        let err = sanitize_tokens(&["1.0", "abc"]).unwrap_err();
        assert!(matches!(err, Error::Conversion { token } if token == "abc"));
    }
}
