use thiserror::Error;

use transflow_core::RuleExecutionError;
use transflow_rules::RuleError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error("invalid pipeline config: {0}")]
    InvalidConfig(String),

    /// Every record of a non-empty batch failed.
    #[error("all {failed} records failed; first error: {first}")]
    BatchFailed {
        failed: usize,
        first: RuleExecutionError,
    },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
