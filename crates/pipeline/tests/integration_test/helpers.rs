use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::TempDir;

use transflow_cache::ResultCache;
use transflow_core::config::CacheConfig;
use transflow_core::{Record, TransformationType};
use transflow_pipeline::{PipelineEngine, RuleAdmin};
use transflow_rules::{RuleConfig, RuleConfigStore, RuleRegistry, VersionManager};

/// A fully wired pipeline over a throwaway directory.
pub struct Harness {
    _dir: TempDir,
    pub store: Arc<RuleConfigStore>,
    pub versions: Arc<VersionManager>,
    pub cache: Arc<ResultCache>,
    pub engine: Arc<PipelineEngine>,
    pub admin: RuleAdmin,
}

impl Harness {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create tempdir");
        let store = Arc::new(RuleConfigStore::new(dir.path().join("transformations")));
        let versions = Arc::new(VersionManager::new(dir.path().join("versions")));
        let cache = Arc::new(ResultCache::in_memory(&CacheConfig::default()));
        let engine = Arc::new(
            PipelineEngine::new(Arc::clone(&store), Arc::new(RuleRegistry::with_builtins()))
                .with_cache(Arc::clone(&cache))
                .with_concurrency(4),
        );
        let admin = RuleAdmin::new(Arc::clone(&engine), Arc::clone(&versions));
        Self {
            _dir: dir,
            store,
            versions,
            cache,
            engine,
            admin,
        }
    }

    /// Harness with `configs` already created and active.
    pub async fn with_rules(configs: Vec<RuleConfig>) -> Self {
        let harness = Self::new();
        for config in configs {
            harness.admin.create_rule(config).await.expect("create rule");
        }
        harness
    }
}

pub fn record(value: Value) -> Record {
    value.as_object().cloned().expect("record must be a JSON object")
}

pub fn mask_pii() -> RuleConfig {
    RuleConfig::new("mask_pii", TransformationType::Normalize, 3)
        .with_kind("data_masking")
        .with_param("patterns", json!({"email": "email"}))
}

pub fn schema_validation(required: Value) -> RuleConfig {
    RuleConfig::new("schema_validation", TransformationType::Validate, 2)
        .with_param("required_fields", required)
}

pub fn field_mapping() -> RuleConfig {
    RuleConfig::new("field_mapping", TransformationType::Normalize, 1)
        .with_param("mappings", json!({"ts": "timestamp", "amt": "amount"}))
}

pub fn type_conversion(strict: bool) -> RuleConfig {
    RuleConfig::new("type_conversion", TransformationType::Normalize, 4)
        .with_kind("data_type_conversion")
        .with_param("conversions", json!({"amount": "float", "timestamp": "datetime"}))
        .with_param("strict", json!(strict))
}
