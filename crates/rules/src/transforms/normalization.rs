use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use transflow_core::Record;

use super::{parse_params, ApplyResult, Transform};
use crate::error::Result;
use crate::schema::RuleConfig;
use crate::stats::RuleStats;

/// String transform applied to a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringTransform {
    Lowercase,
    Uppercase,
    Trim,
    CollapseWhitespace,
}

impl StringTransform {
    pub fn apply(&self, input: &str) -> String {
        match self {
            StringTransform::Lowercase => input.to_lowercase(),
            StringTransform::Uppercase => input.to_uppercase(),
            StringTransform::Trim => input.trim().to_string(),
            StringTransform::CollapseWhitespace => {
                input.split_whitespace().collect::<Vec<_>>().join(" ")
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct NormalizationParams {
    #[serde(default)]
    normalizations: BTreeMap<String, StringTransform>,
}

/// Applies per-field string transforms. Non-string values are left alone.
#[derive(Debug)]
pub struct DataNormalization {
    normalizations: BTreeMap<String, StringTransform>,
}

impl DataNormalization {
    pub const ID: &'static str = "data_normalization";

    pub fn from_config(config: &RuleConfig) -> Result<Self> {
        let params: NormalizationParams = parse_params(config)?;
        Ok(Self {
            normalizations: params.normalizations,
        })
    }
}

impl Transform for DataNormalization {
    fn apply(&self, mut record: Record, _stats: &RuleStats) -> ApplyResult {
        for (field, transform) in &self.normalizations {
            if let Some(Value::String(s)) = record.get_mut(field) {
                *s = transform.apply(s);
            }
        }
        Ok(Some(record))
    }
}
