//! Error taxonomy for rule configuration, versioning, and construction.

use std::path::Path;

/// Errors raised by the config store, version manager, and rule registry.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// No stored configuration exists under this rule name.
    #[error("rule '{0}' not found")]
    ConfigNotFound(String),

    /// The rule-type identifier has no registered factory.
    #[error("unknown rule type: '{0}'")]
    UnknownRuleType(String),

    /// A factory is already registered under this identifier.
    #[error("rule type '{0}' is already registered")]
    DuplicateRuleType(String),

    /// Rule name or rule parameters are malformed.
    #[error("invalid rule config: {0}")]
    InvalidConfig(String),

    #[error("version {version} not found for rule '{rule}'")]
    VersionNotFound { rule: String, version: u64 },

    /// A config or version document could not be read or written.
    #[error("persistence error at {path}: {source}")]
    Persistence {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse/serialization error.
    #[error("YAML error: {0}")]
    Parse(#[from] serde_yaml::Error),
}

impl RuleError {
    pub(crate) fn persistence(path: &Path, source: std::io::Error) -> Self {
        RuleError::Persistence {
            path: path.display().to_string(),
            source,
        }
    }

    /// Whether the error was caused by the caller's input rather than the backing store.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, RuleError::Persistence { .. } | RuleError::Parse(_))
    }
}

/// Result alias for rule operations.
pub type Result<T> = std::result::Result<T, RuleError>;
