use serde::Deserialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use transflow_core::Record;

use super::{parse_params, ApplyResult, Transform};
use crate::error::{Result, RuleError};
use crate::schema::RuleConfig;
use crate::stats::RuleStats;

const REDACTED: &str = "********";

/// How a masked field is rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskStyle {
    Email,
    Phone,
    Redact,
    Hash,
}

impl MaskStyle {
    /// Resolve a pattern name. Unrecognised names hash the value.
    pub fn from_pattern(pattern: &str) -> Self {
        match pattern.trim().to_ascii_lowercase().as_str() {
            "email" => MaskStyle::Email,
            "phone" => MaskStyle::Phone,
            "redact" => MaskStyle::Redact,
            _ => MaskStyle::Hash,
        }
    }
}

fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

fn mask_email(raw: &str) -> String {
    let Some((local, _domain)) = raw.split_once('@') else {
        return mask_hash(raw);
    };
    let first: String = local.chars().take(1).collect();
    format!("{}***{}", first, &sha256_hex(raw)[..12])
}

fn mask_phone(raw: &str) -> String {
    let total = raw.chars().filter(|c| c.is_ascii_digit()).count();
    let keep_from = total.saturating_sub(4);
    let mut seen = 0;
    raw.chars()
        .map(|c| {
            if c.is_ascii_digit() {
                seen += 1;
                if seen <= keep_from {
                    return '*';
                }
            }
            c
        })
        .collect()
}

fn mask_hash(raw: &str) -> String {
    format!("sha256:{}", &sha256_hex(raw)[..16])
}

/// Deterministically mask one value. `null` stays `null`.
pub fn mask_value(value: &Value, style: MaskStyle) -> Value {
    let raw = match value {
        Value::Null => return Value::Null,
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let masked = match style {
        MaskStyle::Email => mask_email(&raw),
        MaskStyle::Phone => mask_phone(&raw),
        MaskStyle::Redact => REDACTED.to_string(),
        MaskStyle::Hash => mask_hash(&raw),
    };
    Value::String(masked)
}

#[derive(Debug, Deserialize)]
struct MaskingParams {
    #[serde(default)]
    patterns: Map<String, Value>,
}

/// Masks configured fields in place.
#[derive(Debug)]
pub struct DataMasking {
    patterns: Vec<(String, MaskStyle)>,
}

impl DataMasking {
    pub const ID: &'static str = "data_masking";

    pub fn from_config(config: &RuleConfig) -> Result<Self> {
        let params: MaskingParams = parse_params(config)?;
        let patterns = params
            .patterns
            .into_iter()
            .map(|(field, pattern)| match pattern {
                Value::String(p) => Ok((field, MaskStyle::from_pattern(&p))),
                other => Err(RuleError::InvalidConfig(format!(
                    "rule '{}': pattern for field '{}' must be a string, got {}",
                    config.name, field, other
                ))),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }
}

impl Transform for DataMasking {
    fn apply(&self, mut record: Record, _stats: &RuleStats) -> ApplyResult {
        for (field, style) in &self.patterns {
            if let Some(value) = record.get_mut(field) {
                *value = mask_value(value, *style);
            }
        }
        Ok(Some(record))
    }
}
