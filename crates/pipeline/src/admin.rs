//! Administrative operations over rule configs and their history.
//!
//! Each mutating call persists through the store and then reloads the engine,
//! so the engine never runs a config the store does not hold. Errors carry an
//! HTTP-style [`AdminError::status_code`] for an outer request layer.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use transflow_rules::{
    RuleConfig, RuleConfigStore, RuleError, RulePatch, RuleRegistry, RuleVersion, VersionManager,
    VersionSummary,
};

use crate::engine::PipelineEngine;
use crate::error::PipelineError;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error("rule '{0}' already exists")]
    RuleExists(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl AdminError {
    pub fn status_code(&self) -> u16 {
        match self {
            AdminError::Rule(RuleError::ConfigNotFound(_))
            | AdminError::Rule(RuleError::VersionNotFound { .. }) => 404,
            AdminError::RuleExists(_) => 409,
            AdminError::Rule(e) if e.is_client_error() => 400,
            AdminError::Pipeline(PipelineError::InvalidConfig(_)) => 400,
            _ => 500,
        }
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

pub type Result<T> = std::result::Result<T, AdminError>;

/// Per-rule outcome of [`RuleAdmin::batch_update`].
pub type BatchUpdateResult = BTreeMap<String, Result<RuleConfig>>;

/// Facade tying together the config store, version history, and engine.
pub struct RuleAdmin {
    store: Arc<RuleConfigStore>,
    versions: Arc<VersionManager>,
    registry: Arc<RuleRegistry>,
    engine: Arc<PipelineEngine>,
}

impl RuleAdmin {
    pub fn new(engine: Arc<PipelineEngine>, versions: Arc<VersionManager>) -> Self {
        Self {
            store: Arc::clone(engine.store()),
            registry: Arc::clone(engine.registry()),
            versions,
            engine,
        }
    }

    pub fn engine(&self) -> &Arc<PipelineEngine> {
        &self.engine
    }

    pub fn list_rules(&self) -> Result<Vec<RuleConfig>> {
        Ok(self.store.load_all()?)
    }

    pub fn get_rule(&self, name: &str) -> Result<RuleConfig> {
        Ok(self.store.get(name)?)
    }

    /// Persist a new rule after checking its type and parameters against the registry.
    pub async fn create_rule(&self, config: RuleConfig) -> Result<RuleConfig> {
        if self.store.contains(&config.name) {
            return Err(AdminError::RuleExists(config.name));
        }
        // Building the rule validates both the identifier and the parameters.
        self.registry.create(&config)?;

        let saved = self.store.save(&config)?;
        info!(rule = %saved.name, rule_type = %saved.rule_type_id(), "rule created");
        self.engine.reload().await?;
        Ok(saved)
    }

    /// Merge `patch` into an existing rule.
    pub async fn update_rule(&self, name: &str, patch: &RulePatch) -> Result<RuleConfig> {
        let updated = self.apply_patch(name, patch)?;
        self.engine.reload().await?;
        Ok(updated)
    }

    /// Remove a rule's config and cached results. Version history is kept.
    pub async fn delete_rule(&self, name: &str) -> Result<()> {
        self.store.delete(name)?;
        if let Some(cache) = self.engine.cache() {
            if let Err(e) = cache.invalidate(name).await {
                warn!(rule = %name, error = %e, "failed to purge cached results");
            }
        }
        self.engine.reload().await?;
        Ok(())
    }

    /// Flip `enabled` and return the new config.
    pub async fn toggle_rule(&self, name: &str) -> Result<RuleConfig> {
        let current = self.store.get(name)?;
        self.update_rule(name, &RulePatch::enabled(!current.enabled))
            .await
    }

    pub fn list_versions(&self, name: &str) -> Result<Vec<VersionSummary>> {
        self.store.get(name)?;
        Ok(self.versions.list_versions(name)?)
    }

    pub fn get_version(&self, name: &str, version: u64) -> Result<RuleVersion> {
        self.store.get(name)?;
        Ok(self.versions.get_version(name, version)?)
    }

    /// Snapshot the rule's current config as a new version.
    pub fn save_version(&self, name: &str, comment: &str) -> Result<RuleVersion> {
        let current = self.store.get(name)?;
        Ok(self.versions.save_version(name, &current, comment)?)
    }

    /// Restore the live config from a stored version.
    ///
    /// This is an ordinary update: it does not record a new version.
    pub async fn rollback(&self, name: &str, version: u64) -> Result<RuleConfig> {
        self.store.get(name)?;
        let snapshot = self.versions.rollback_to_version(name, version)?;
        let restored = self.apply_patch(name, &RulePatch::restore(&snapshot))?;
        info!(rule = %name, version, "rule rolled back");
        self.engine.reload().await?;
        Ok(restored)
    }

    /// Apply several patches, then reload once.
    ///
    /// One rule's failure does not stop the others. Empty patches leave the
    /// rule untouched and report its current config.
    pub async fn batch_update(&self, patches: BTreeMap<String, RulePatch>) -> Result<BatchUpdateResult> {
        let mut results = BatchUpdateResult::new();
        for (name, patch) in patches {
            let outcome = if patch.is_empty() {
                self.get_rule(&name)
            } else {
                self.apply_patch(&name, &patch)
            };
            if let Err(ref e) = outcome {
                warn!(rule = %name, error = %e, "batch update entry failed");
            }
            results.insert(name, outcome);
        }
        self.engine.reload().await?;
        Ok(results)
    }

    /// Keep the newest `keep` versions of a rule. Returns how many were removed.
    pub fn cleanup_versions(&self, name: &str, keep: usize) -> Result<usize> {
        Ok(self.versions.cleanup_old_versions(name, keep)?)
    }

    fn apply_patch(&self, name: &str, patch: &RulePatch) -> Result<RuleConfig> {
        // Validate the merged result before it reaches disk.
        let mut candidate = self.store.get(name)?;
        patch.apply_to(&mut candidate);
        if candidate.enabled {
            self.registry.create(&candidate)?;
        }
        Ok(self.store.update(name, patch)?)
    }
}
