//! Built-in rule implementations.
//!
//! Each variant deserializes explicit parameters from its config's `config`
//! map at construction time, so malformed parameters surface when the rule is
//! created rather than on the first record.

mod conversion;
mod mapping;
mod masking;
mod normalization;
mod timestamp;
mod validation;

use serde::de::DeserializeOwned;
use serde_json::Value;

use transflow_core::{Record, RuleExecutionError};

use crate::error::{Result, RuleError};
use crate::schema::RuleConfig;
use crate::stats::RuleStats;

pub use conversion::{DataTypeConversion, TargetType};
pub use mapping::FieldMapping;
pub use masking::{mask_value, DataMasking, MaskStyle};
pub use normalization::{DataNormalization, StringTransform};
pub use timestamp::TimestampEnrichment;
pub use validation::SchemaValidation;

/// Outcome of applying one rule to one record.
pub type ApplyResult = std::result::Result<Option<Record>, RuleExecutionError>;

/// A configured transformation applied to one record at a time.
///
/// `Ok(None)` drops the record on purpose (e.g. failed validation) and is
/// never counted as an error.
pub trait Transform: Send + Sync {
    fn apply(&self, record: Record, stats: &RuleStats) -> ApplyResult;

    /// Whether output depends only on (record, config revision).
    fn cacheable(&self) -> bool {
        true
    }
}

/// Deserialize typed parameters from a rule's `config` map.
pub(crate) fn parse_params<T: DeserializeOwned>(config: &RuleConfig) -> Result<T> {
    serde_json::from_value(Value::Object(config.config.clone())).map_err(|e| {
        RuleError::InvalidConfig(format!("rule '{}': {}", config.name, e))
    })
}
