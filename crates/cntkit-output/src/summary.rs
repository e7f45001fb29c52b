use std::collections::BTreeMap;
use std::sync::OnceLock;

use cntkit_core::{Error, Result};
use regex::Regex;

use crate::parse_token;

/// Metrics reported on the last `Final Results:` line of a test run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TestSummary {
    pub metrics: BTreeMap<String, f64>,
}

impl TestSummary {
    pub fn get(&self, key: &str) -> Option<f64> {
        self.metrics.get(key).copied()
    }
    pub fn len(&self) -> usize {
        self.metrics.len()
    }
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.metrics.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

fn final_results_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^Final Results: Minibatch\[.*?\]: (?P<results>.*)")
            .expect("final results regex is valid")
    })
}

/// Parses `Final Results: Minibatch[..]: key = value; key = value * count`.
///
/// Only the last such line counts. A `* count` suffix on a value is
/// dropped.
pub fn parse_test_summary(output: &str) -> Result<TestSummary> {
    let results = output
        .lines()
        .filter_map(|line| final_results_regex().captures(line))
        .last()
        .map(|caps| caps["results"].to_string())
        .ok_or(Error::MissingSummary)?;

    let mut metrics = BTreeMap::new();
    for part in results.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = match part.split('=').collect::<Vec<_>>().as_slice() {
            [key, value] => (key.trim(), *value),
            _ => {
                return Err(Error::MalformedSummary {
                    part: part.to_string(),
                })
            }
        };
        let value = value.split('*').next().unwrap_or_default().trim();
        metrics.insert(key.to_string(), parse_token(value)?);
    }
    Ok(TestSummary { metrics })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_metrics_and_drops_counts() {
        let log = "\
Starting minibatch loop.
Final Results: Minibatch[1-1]: SamplesSeen = 100; Perplexity = 2.34; ce = 0.12 * 100
";
        let summary = parse_test_summary(log).unwrap();
        assert_eq!(summary.len(), 3);
        assert_eq!(summary.get("SamplesSeen"), Some(100.0));
        assert_eq!(summary.get("Perplexity"), Some(2.34));
        assert_eq!(summary.get("ce"), Some(0.12));
    }

    #[test]
    fn last_line_wins() {
        let log = "\
Final Results: Minibatch[1-10]: err = 0.5
Final Results: Minibatch[1-20]: err = 0.25;
";
        let summary = parse_test_summary(log).unwrap();
        assert_eq!(summary.get("err"), Some(0.25));
        assert_eq!(summary.len(), 1);
    }

    #[test]
    fn missing_line_is_an_error() {
        assert!(matches!(
            parse_test_summary("nothing here").unwrap_err(),
            Error::MissingSummary
        ));
    }

    #[test]
    fn malformed_entry_is_an_error() {
        let err = parse_test_summary("Final Results: Minibatch[1-1]: oops").unwrap_err();
        assert!(matches!(err, Error::MalformedSummary { part } if part == "oops"));

        let err = parse_test_summary("Final Results: Minibatch[1-1]: ce = abc").unwrap_err();
        assert!(matches!(err, Error::Conversion { .. }));
    }
}
