use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use tracing::debug;

use transflow_core::{Record, RuleExecutionError};

use super::{parse_params, ApplyResult, Transform};
use crate::error::Result;
use crate::schema::RuleConfig;
use crate::stats::RuleStats;

/// Target type of a field conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    #[serde(alias = "str")]
    String,
    #[serde(alias = "int")]
    Integer,
    #[serde(alias = "double")]
    Float,
    #[serde(alias = "bool")]
    Boolean,
    #[serde(alias = "timestamp")]
    Datetime,
}

impl TargetType {
    /// Convert `value`, returning `None` when it cannot be represented.
    pub fn convert(&self, value: &Value) -> Option<Value> {
        match self {
            TargetType::String => to_string(value),
            TargetType::Integer => to_integer(value),
            TargetType::Float => to_float(value),
            TargetType::Boolean => to_boolean(value),
            TargetType::Datetime => to_datetime(value),
        }
    }
}

fn to_string(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(_) => Some(value.clone()),
        Value::Number(n) => Some(Value::String(n.to_string())),
        Value::Bool(b) => Some(Value::String(b.to_string())),
        other => serde_json::to_string(other).ok().map(Value::String),
    }
}

fn integral(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn to_integer(value: &Value) -> Option<Value> {
    let n = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral))?,
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))?
        }
        Value::Bool(b) => i64::from(*b),
        _ => return None,
    };
    Some(Value::Number(n.into()))
}

fn to_float(value: &Value) -> Option<Value> {
    let f = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => return None,
    };
    Number::from_f64(f).map(Value::Number)
}

fn to_boolean(value: &Value) -> Option<Value> {
    let b = match value {
        Value::Bool(b) => *b,
        Value::Number(n) => match n.as_i64() {
            Some(0) => false,
            Some(1) => true,
            _ => return None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "y" | "on" => true,
            "false" | "0" | "no" | "n" | "off" => false,
            _ => return None,
        },
        _ => return None,
    };
    Some(Value::Bool(b))
}

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

fn to_datetime(value: &Value) -> Option<Value> {
    let parsed: DateTime<Utc> = match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                dt.with_timezone(&Utc)
            } else if let Some(naive) = NAIVE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
            {
                naive.and_utc()
            } else {
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .ok()?
                    .and_hms_opt(0, 0, 0)?
                    .and_utc()
            }
        }
        // Numbers are unix epoch seconds.
        Value::Number(n) => DateTime::from_timestamp(n.as_i64()?, 0)?,
        _ => return None,
    };
    Some(Value::String(parsed.to_rfc3339_opts(SecondsFormat::AutoSi, true)))
}

#[derive(Debug, Deserialize)]
struct ConversionParams {
    #[serde(default)]
    conversions: BTreeMap<String, TargetType>,
    #[serde(default)]
    strict: bool,
}

/// Coerces configured fields to a target type.
///
/// A failed conversion keeps the original value and bumps the rule's error
/// counter. With `strict: true` it fails the record instead.
#[derive(Debug)]
pub struct DataTypeConversion {
    name: String,
    conversions: BTreeMap<String, TargetType>,
    strict: bool,
}

impl DataTypeConversion {
    pub const ID: &'static str = "data_type_conversion";

    pub fn from_config(config: &RuleConfig) -> Result<Self> {
        let params: ConversionParams = parse_params(config)?;
        Ok(Self {
            name: config.name.clone(),
            conversions: params.conversions,
            strict: params.strict,
        })
    }
}

impl Transform for DataTypeConversion {
    fn apply(&self, mut record: Record, stats: &RuleStats) -> ApplyResult {
        for (field, target) in &self.conversions {
            let Some(current) = record.get_mut(field) else {
                continue;
            };
            match target.convert(current) {
                Some(converted) => *current = converted,
                None if self.strict => {
                    return Err(RuleExecutionError::new(
                        &self.name,
                        format!("cannot convert field '{}' value {} to {:?}", field, current, target),
                    ));
                }
                None => {
                    debug!(rule = %self.name, field = %field, target = ?target, "conversion failed, keeping original value");
                    stats.record_error();
                }
            }
        }
        Ok(Some(record))
    }
}
