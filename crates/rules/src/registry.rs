//! Maps rule-type identifiers to factories that build [`Transform`]s.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Result, RuleError};
use crate::schema::RuleConfig;
use crate::transforms::{
    DataMasking, DataNormalization, DataTypeConversion, FieldMapping, SchemaValidation,
    TimestampEnrichment, Transform,
};

/// Builds a rule instance from its stored configuration.
pub type RuleFactory = Arc<dyn Fn(&RuleConfig) -> Result<Box<dyn Transform>> + Send + Sync>;

/// Closed set of known rule types, extended explicitly via [`RuleRegistry::register`].
#[derive(Clone, Default)]
pub struct RuleRegistry {
    factories: BTreeMap<String, RuleFactory>,
}

impl RuleRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in rule variant.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.insert_builtin(TimestampEnrichment::ID, |c| {
            Ok(Box::new(TimestampEnrichment::from_config(c)?))
        });
        registry.insert_builtin(SchemaValidation::ID, |c| {
            Ok(Box::new(SchemaValidation::from_config(c)?))
        });
        registry.insert_builtin(DataNormalization::ID, |c| {
            Ok(Box::new(DataNormalization::from_config(c)?))
        });
        registry.insert_builtin(DataTypeConversion::ID, |c| {
            Ok(Box::new(DataTypeConversion::from_config(c)?))
        });
        registry.insert_builtin(FieldMapping::ID, |c| {
            Ok(Box::new(FieldMapping::from_config(c)?))
        });
        registry.insert_builtin(DataMasking::ID, |c| {
            Ok(Box::new(DataMasking::from_config(c)?))
        });
        registry
    }

    fn insert_builtin<F>(&mut self, id: &str, factory: F)
    where
        F: Fn(&RuleConfig) -> Result<Box<dyn Transform>> + Send + Sync + 'static,
    {
        self.factories.insert(id.to_string(), Arc::new(factory));
    }

    /// Register a new rule type. Identifiers are unique.
    pub fn register<F>(&mut self, id: impl Into<String>, factory: F) -> Result<()>
    where
        F: Fn(&RuleConfig) -> Result<Box<dyn Transform>> + Send + Sync + 'static,
    {
        let id = id.into();
        if self.factories.contains_key(&id) {
            return Err(RuleError::DuplicateRuleType(id));
        }
        debug!(rule_type = %id, "registered rule type");
        self.factories.insert(id, Arc::new(factory));
        Ok(())
    }

    /// Build the rule a config describes.
    pub fn create(&self, config: &RuleConfig) -> Result<Box<dyn Transform>> {
        let id = config.rule_type_id();
        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| RuleError::UnknownRuleType(id.to_string()))?;
        factory(config)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Registered identifiers in sorted order.
    pub fn identifiers(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("identifiers", &self.identifiers())
            .finish()
    }
}
