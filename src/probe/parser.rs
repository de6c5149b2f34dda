//! Locale-tolerant latency extraction from `ping` output lines.
//!
//! A reply line carries its round-trip time as `<label>=<number>` or
//! `<label><<number>`, where the label is the word for "time" in the
//! system locale (`time`, `temps`, `Zeit`, ...). Matching is
//! case-insensitive and the number may use a decimal comma.

use anyhow::{bail, Context, Result};
use regex::Regex;

/// Labels recognised when none are configured.
pub const DEFAULT_LABELS: &[&str] = &[
    "time", "temps", "zeit", "tiempo", "tempo", "tijd", "tid", "czas", "время",
];

/// Extracts one latency value (in milliseconds) per output line.
#[derive(Debug, Clone)]
pub struct LatencyParser {
    pattern: Regex,
}

impl Default for LatencyParser {
    fn default() -> Self {
        Self::new(DEFAULT_LABELS).expect("default latency labels form a valid pattern")
    }
}

impl LatencyParser {
    /// Build a parser accepting any of the given labels.
    pub fn new<S: AsRef<str>>(labels: &[S]) -> Result<Self> {
        let alternatives: Vec<String> = labels
            .iter()
            .map(|label| label.as_ref().trim())
            .filter(|label| !label.is_empty())
            .map(regex::escape)
            .collect();

        if alternatives.is_empty() {
            bail!("At least one latency label is required");
        }

        let source = format!(
            r"(?i)\b(?:{})\s*[=<]\s*(\d+(?:[.,]\d+)?)",
            alternatives.join("|")
        );
        let pattern = Regex::new(&source)
            .with_context(|| format!("Invalid latency pattern built from labels {:?}", alternatives))?;

        Ok(Self { pattern })
    }

    /// Parse the latency on a line, or `None` when the line carries none.
    ///
    /// `time<1ms` yields `1.0`: the bound is reported as the value.
    pub fn parse(&self, line: &str) -> Option<f64> {
        let captures = self.pattern.captures(line)?;
        let number = captures.get(1)?.as_str().replace(',', ".");
        number.parse::<f64>().ok().filter(|value| value.is_finite())
    }
}
