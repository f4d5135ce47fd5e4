//! Serde types for rule configuration documents and version snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use transflow_core::TransformationType;

use crate::error::{Result, RuleError};

fn default_true() -> bool {
    true
}

/// Persisted configuration of one transformation rule.
///
/// Serialized as one YAML document per rule in the config directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleConfig {
    /// Unique key; also the document's file stem.
    pub name: String,
    #[serde(rename = "type")]
    pub rule_type: TransformationType,
    /// Registry identifier of the rule implementation. Falls back to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub order: i64,
    /// Rule-specific parameters.
    #[serde(default)]
    pub config: Map<String, Value>,
    /// Write counter maintained by the store; keys cache fingerprints.
    #[serde(default)]
    pub revision: u64,
}

impl RuleConfig {
    pub fn new(name: impl Into<String>, rule_type: TransformationType, order: i64) -> Self {
        Self {
            name: name.into(),
            rule_type,
            kind: None,
            enabled: true,
            order,
            config: Map::new(),
            revision: 0,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Identifier used for registry lookup.
    pub fn rule_type_id(&self) -> &str {
        self.kind.as_deref().unwrap_or(&self.name)
    }
}

/// Sort configs by `(order, name)` ascending. Stable.
pub fn sort_configs(configs: &mut [RuleConfig]) {
    configs.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.name.cmp(&b.name)));
}

/// Reject names that are empty or unsafe as a file stem.
pub fn validate_rule_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(RuleError::InvalidConfig("rule name must not be empty".to_string()));
    }
    if name.starts_with('.') {
        return Err(RuleError::InvalidConfig(format!(
            "rule name '{}' must not start with '.'",
            name
        )));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(RuleError::InvalidConfig(format!(
            "rule name '{}' contains invalid character '{}'",
            name, c
        )));
    }
    Ok(())
}

/// Partial update of a [`RuleConfig`].
///
/// Absent fields are left untouched. `config` is merged key-by-key into the
/// existing parameters unless `replace_config` is set. An explicit
/// `kind: null` clears the kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RulePatch {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub rule_type: Option<TransformationType>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub replace_config: bool,
}

impl RulePatch {
    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Self::default()
        }
    }

    pub fn order(order: i64) -> Self {
        Self {
            order: Some(order),
            ..Self::default()
        }
    }

    pub fn config(config: Map<String, Value>) -> Self {
        Self {
            config: Some(config),
            ..Self::default()
        }
    }

    /// Patch that restores every user-facing field of a historical snapshot.
    pub fn restore(snapshot: &RuleConfig) -> Self {
        Self {
            rule_type: Some(snapshot.rule_type),
            kind: Some(snapshot.kind.clone()),
            enabled: Some(snapshot.enabled),
            order: Some(snapshot.order),
            config: Some(snapshot.config.clone()),
            replace_config: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rule_type.is_none()
            && self.kind.is_none()
            && self.enabled.is_none()
            && self.order.is_none()
            && self.config.is_none()
    }

    /// Apply the patch in place. The rule name and revision are never touched.
    pub fn apply_to(&self, target: &mut RuleConfig) {
        if let Some(rule_type) = self.rule_type {
            target.rule_type = rule_type;
        }
        if let Some(ref kind) = self.kind {
            target.kind = kind.clone();
        }
        if let Some(enabled) = self.enabled {
            target.enabled = enabled;
        }
        if let Some(order) = self.order {
            target.order = order;
        }
        if let Some(ref config) = self.config {
            if self.replace_config {
                target.config = config.clone();
            } else {
                for (key, value) in config {
                    target.config.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

/// Distinguishes a present `null` (`Some(None)`) from an absent field (`None`).
fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Immutable historical snapshot of a rule's configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleVersion {
    pub version: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub comment: String,
    pub config: RuleConfig,
}

impl RuleVersion {
    pub fn summary(&self) -> VersionSummary {
        VersionSummary {
            version: self.version,
            created_at: self.created_at,
            comment: self.comment.clone(),
        }
    }
}

/// Listing entry for a stored version, without the snapshot body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VersionSummary {
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub comment: String,
}
