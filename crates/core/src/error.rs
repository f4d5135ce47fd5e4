use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised by a rule while transforming a single record.
///
/// Unrecoverable for that record only; batch processing isolates it from
/// sibling records.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("rule '{rule}' failed: {reason}")]
pub struct RuleExecutionError {
    pub rule: String,
    pub reason: String,
}

impl RuleExecutionError {
    pub fn new(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            reason: reason.into(),
        }
    }
}
