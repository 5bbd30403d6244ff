//! Configuration validation.
//!
//! # Responsibilities
//! - Turn one raw endpoint record into a [`Rule`] or a skip decision
//! - Coerce unusable numeric fields to their defaults
//! - Report every non-fatal problem as a [`RuleWarning`]
//!
//! # Design Decisions
//! - Validation is a pure function: no filesystem access, no logging
//! - One bad endpoint never aborts the whole load
//! - Numbers are accepted as JSON integers or digit-only strings

use std::path::PathBuf;
use std::time::Duration;

use serde_json::Value;

use crate::config::schema::{RawEndpoint, Rule, DEFAULT_RESPONSE_CODE, DROP_SENTINEL};

/// A per-endpoint problem that does not abort the load.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleWarning {
    #[error("endpoint at position {position} is not an object, skipping")]
    NotAnObject { position: usize },

    #[error("missing '{field}' for endpoint at position {position}, skipping")]
    MissingField { position: usize, field: &'static str },

    #[error("response_code at position {position} {method} {path} is not a usable status code, will use 200 instead")]
    InvalidResponseCode {
        position: usize,
        method: String,
        path: String,
    },

    #[error("delay at position {position} {method} {path} is non-numeric, will use 0 instead")]
    InvalidDelay {
        position: usize,
        method: String,
        path: String,
    },
}

/// What became of one endpoint record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointOutcome {
    /// Record is valid (possibly after coercion) and joins the table.
    Accepted(Rule),
    /// `enabled` is false.
    Disabled,
    /// Record cannot become a rule; a warning says why.
    Skipped,
}

/// Validate the endpoint at `position`, appending any warnings.
pub fn validate_endpoint(
    position: usize,
    record: &Value,
    warnings: &mut Vec<RuleWarning>,
) -> EndpointOutcome {
    let raw: RawEndpoint = match record {
        Value::Object(_) => match serde_json::from_value(record.clone()) {
            Ok(raw) => raw,
            Err(_) => {
                warnings.push(RuleWarning::NotAnObject { position });
                return EndpointOutcome::Skipped;
            }
        },
        _ => {
            warnings.push(RuleWarning::NotAnObject { position });
            return EndpointOutcome::Skipped;
        }
    };

    if matches!(raw.enabled, Some(Value::Bool(false))) {
        return EndpointOutcome::Disabled;
    }

    let Some(method) = present(&raw.method).map(as_text) else {
        warnings.push(RuleWarning::MissingField { position, field: "method" });
        return EndpointOutcome::Skipped;
    };
    let Some(path) = present(&raw.path).map(as_text) else {
        warnings.push(RuleWarning::MissingField { position, field: "path" });
        return EndpointOutcome::Skipped;
    };

    let mut rule = Rule::new(method, path);
    rule.response_file = optional_path(&raw.response_file);
    rule.request_file_path = optional_path(&raw.request_file_path);

    if let Some(value) = present(&raw.response_code) {
        match parse_non_negative(value).and_then(status_code) {
            Some(code) => rule.response_code = code,
            None => {
                warnings.push(RuleWarning::InvalidResponseCode {
                    position,
                    method: rule.method.clone(),
                    path: rule.path.clone(),
                });
                rule.response_code = DEFAULT_RESPONSE_CODE;
            }
        }
    }

    if let Some(value) = present(&raw.delay) {
        match parse_non_negative(value) {
            Some(millis) => rule.delay = Duration::from_millis(millis),
            None => warnings.push(RuleWarning::InvalidDelay {
                position,
                method: rule.method.clone(),
                path: rule.path.clone(),
            }),
        }
    }

    EndpointOutcome::Accepted(rule)
}

/// Parse a non-negative integer given as a JSON number or a digit-only string.
pub fn parse_non_negative(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
            s.parse().ok()
        }
        _ => None,
    }
}

/// Final statuses only: a 1xx cannot end an exchange.
fn status_code(n: u64) -> Option<u16> {
    let code = u16::try_from(n).ok()?;
    (code == DROP_SENTINEL || (200..=999).contains(&code)).then_some(code)
}

/// `null` counts as absent.
fn present(value: &Option<Value>) -> Option<&Value> {
    value.as_ref().filter(|v| !v.is_null())
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn optional_path(value: &Option<Value>) -> Option<PathBuf> {
    let text = as_text(present(value)?);
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
}
