use std::collections::BTreeMap;

use serde::Deserialize;

use transflow_core::Record;

use super::{parse_params, ApplyResult, Transform};
use crate::error::Result;
use crate::schema::RuleConfig;
use crate::stats::RuleStats;

#[derive(Debug, Deserialize)]
struct MappingParams {
    #[serde(default)]
    mappings: BTreeMap<String, String>,
}

/// Renames record keys using an `old -> new` table.
///
/// Renames are applied in a single pass, so `a -> b` and `b -> c` never chain.
/// When a renamed key lands on an existing unmapped key, the renamed value wins.
#[derive(Debug)]
pub struct FieldMapping {
    mappings: BTreeMap<String, String>,
}

impl FieldMapping {
    pub const ID: &'static str = "field_mapping";

    pub fn from_config(config: &RuleConfig) -> Result<Self> {
        let params: MappingParams = parse_params(config)?;
        Ok(Self {
            mappings: params.mappings,
        })
    }
}

impl Transform for FieldMapping {
    fn apply(&self, record: Record, _stats: &RuleStats) -> ApplyResult {
        let mut out = Record::new();
        let mut renamed = Vec::new();

        for (key, value) in record {
            match self.mappings.get(&key) {
                Some(target) => renamed.push((target.clone(), value)),
                None => {
                    out.insert(key, value);
                }
            }
        }
        for (key, value) in renamed {
            out.insert(key, value);
        }
        Ok(Some(out))
    }
}
