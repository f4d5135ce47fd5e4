use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::Value;

use transflow_core::Record;

use super::{parse_params, ApplyResult, Transform};
use crate::error::Result;
use crate::schema::RuleConfig;
use crate::stats::RuleStats;

fn default_field() -> String {
    "processed_at".to_string()
}

#[derive(Debug, Deserialize)]
struct TimestampParams {
    #[serde(default = "default_field")]
    field: String,
}

/// Stamps each record with the current UTC processing time.
///
/// Output depends on the clock, so results are never cached.
#[derive(Debug)]
pub struct TimestampEnrichment {
    field: String,
}

impl TimestampEnrichment {
    pub const ID: &'static str = "timestamp_enrichment";

    pub fn from_config(config: &RuleConfig) -> Result<Self> {
        let params: TimestampParams = parse_params(config)?;
        Ok(Self { field: params.field })
    }
}

impl Transform for TimestampEnrichment {
    fn apply(&self, mut record: Record, _stats: &RuleStats) -> ApplyResult {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        record.insert(self.field.clone(), Value::String(now));
        Ok(Some(record))
    }

    fn cacheable(&self) -> bool {
        false
    }
}
