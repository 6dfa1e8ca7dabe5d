//! Test step codec
//!
//! Three representations of the same ordered step list:
//! - the human line format `"{n}. {action}|{expected}"` used for input,
//! - the remote steps markup (see [`markup`]),
//! - the persisted line format `"Step {n}: {action} - Expected: {expected}"`.

mod escape;
pub mod markup;

pub use markup::{decode_markup, render_markup};

use serde::{Deserialize, Serialize};

/// Expected result used when a step does not state one.
pub const DEFAULT_EXPECTED_RESULT: &str = "Step completes as expected";

const PERSISTED_EXPECTED_SEPARATOR: &str = " - Expected: ";

/// One action / expected-result pair. Position is implied by order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub action: String,
    #[serde(default)]
    pub expected_result: String,
}

impl Step {
    /// Build a step, trimming both sides and defaulting an empty expected result.
    pub fn new(action: String, expected_result: String) -> Self {
        let expected_result = expected_result.trim();
        Self {
            action: action.trim().to_string(),
            expected_result: if expected_result.is_empty() {
                DEFAULT_EXPECTED_RESULT.to_string()
            } else {
                expected_result.to_string()
            },
        }
    }
}

/// Strip a leading `"{n}. "` ordinal. The dot must be followed by whitespace
/// or the end of the line so `"1.5 kg"` is left alone.
fn strip_ordinal(line: &str) -> &str {
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return line;
    }
    match line[digits..].strip_prefix('.') {
        Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => rest,
        _ => line,
    }
}

/// Parse human step lines into steps. Blank lines are skipped; the first `|`
/// separates action from expected result.
pub fn encode_lines<S: AsRef<str>>(lines: &[S]) -> Vec<Step> {
    lines
        .iter()
        .map(|line| line.as_ref().trim())
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let body = strip_ordinal(line).trim();
            let (action, expected) = match body.split_once('|') {
                Some((action, expected)) => (action, expected),
                None => (body, ""),
            };
            if action.trim().is_empty() && expected.trim().is_empty() {
                return None;
            }
            Some(Step::new(action.to_string(), expected.to_string()))
        })
        .collect()
}

/// Inverse of [`encode_lines`].
pub fn to_lines(steps: &[Step]) -> Vec<String> {
    steps
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {}|{}", i + 1, s.action, s.expected_result))
        .collect()
}

/// Render steps in the persisted snapshot format.
pub fn render_persisted(steps: &[Step]) -> Vec<String> {
    steps
        .iter()
        .enumerate()
        .map(|(i, s)| {
            format!(
                "Step {}: {}{}{}",
                i + 1,
                s.action,
                PERSISTED_EXPECTED_SEPARATOR,
                s.expected_result
            )
        })
        .collect()
}

/// Parse persisted step lines. The `" - Expected: ..."` suffix and the
/// `"Step {n}: "` prefix are both optional.
pub fn parse_persisted<S: AsRef<str>>(lines: &[S]) -> Vec<Step> {
    lines
        .iter()
        .map(|line| line.as_ref().trim())
        .filter(|line| !line.is_empty())
        .map(|line| {
            let body = line
                .strip_prefix("Step ")
                .and_then(|rest| {
                    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
                    (digits > 0)
                        .then(|| rest[digits..].strip_prefix(':'))
                        .flatten()
                })
                .unwrap_or(line);
            match body.split_once(PERSISTED_EXPECTED_SEPARATOR) {
                Some((action, expected)) => Step::new(action.to_string(), expected.to_string()),
                None => Step::new(body.to_string(), String::new()),
            }
        })
        .collect()
}
