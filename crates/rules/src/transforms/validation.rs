use serde::Deserialize;
use tracing::debug;

use transflow_core::Record;

use super::{parse_params, ApplyResult, Transform};
use crate::error::Result;
use crate::schema::RuleConfig;
use crate::stats::RuleStats;

#[derive(Debug, Deserialize)]
struct ValidationParams {
    #[serde(default)]
    required_fields: Vec<String>,
}

/// Drops records missing any required field; passes the rest through unchanged.
#[derive(Debug)]
pub struct SchemaValidation {
    name: String,
    required_fields: Vec<String>,
}

impl SchemaValidation {
    pub const ID: &'static str = "schema_validation";

    pub fn from_config(config: &RuleConfig) -> Result<Self> {
        let params: ValidationParams = parse_params(config)?;
        Ok(Self {
            name: config.name.clone(),
            required_fields: params.required_fields,
        })
    }
}

impl Transform for SchemaValidation {
    fn apply(&self, record: Record, _stats: &RuleStats) -> ApplyResult {
        if let Some(missing) = self.required_fields.iter().find(|f| !record.contains_key(*f)) {
            debug!(rule = %self.name, field = %missing, "record missing required field, dropping");
            return Ok(None);
        }
        Ok(Some(record))
    }
}
