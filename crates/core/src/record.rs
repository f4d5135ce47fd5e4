use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One ingested unit: an open mapping of field name to JSON value.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// A bounded, ordered group of records processed together.
pub type Batch = Vec<Record>;

/// Coarse category of a transformation rule.
///
/// Used for metric labels and listings; rule construction is keyed by the
/// rule-type identifier, not by this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformationType {
    Enrich,
    Validate,
    Normalize,
}

impl TransformationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformationType::Enrich => "enrich",
            TransformationType::Validate => "validate",
            TransformationType::Normalize => "normalize",
        }
    }
}

impl fmt::Display for TransformationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransformationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "enrich" => Ok(TransformationType::Enrich),
            "validate" => Ok(TransformationType::Validate),
            "normalize" => Ok(TransformationType::Normalize),
            other => Err(format!("unknown transformation type: '{}'", other)),
        }
    }
}

/// Build a [`Record`] from a JSON value, returning `None` for non-objects.
pub fn record_from_value(value: serde_json::Value) -> Option<Record> {
    match value {
        serde_json::Value::Object(map) => Some(map),
        _ => None,
    }
}
