//! Filesystem-backed rule configuration store.
//!
//! One YAML document per rule at `{config_dir}/{name}.yaml`. The store is the
//! single source of truth for rule configuration: mutations only touch disk,
//! and the pipeline picks them up through an explicit reload.
//!
//! `{config_dir}/.revisions/{name}` holds the last revision handed out for a
//! name. It survives deletes, so a recreated rule never reuses a revision.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{info, warn};

use crate::error::{Result, RuleError};
use crate::fs_atomic::{ensure_dir, is_yaml, write_atomic};
use crate::schema::{sort_configs, validate_rule_name, RuleConfig, RulePatch};


const REVISIONS_DIR: &str = ".revisions";

/// Durable CRUD for [`RuleConfig`] documents.
pub struct RuleConfigStore {
    config_dir: PathBuf,
    /// Serializes read-modify-write cycles so revisions never collide.
    write_lock: Mutex<()>,
}

impl RuleConfigStore {
    /// Create a store rooted at `config_dir`, creating the directory if needed.
    pub fn new(config_dir: PathBuf) -> Self {
        if !config_dir.exists() {
            if let Err(e) = fs::create_dir_all(&config_dir) {
                warn!(path = %config_dir.display(), error = %e, "failed to create rules directory");
            }
        }
        Self {
            config_dir,
            write_lock: Mutex::new(()),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Load every rule document, sorted by `(order, name)`.
    ///
    /// Dotfiles and non-YAML files are ignored. Documents that fail to parse
    /// are logged and skipped rather than failing the whole load.
    pub fn load_all(&self) -> Result<Vec<RuleConfig>> {
        let entries = fs::read_dir(&self.config_dir)
            .map_err(|e| RuleError::persistence(&self.config_dir, e))?;

        let mut configs = Vec::new();
        let mut seen = HashSet::new();

        for entry in entries {
            let entry = entry.map_err(|e| RuleError::persistence(&self.config_dir, e))?;
            let path = entry.path();

            if path.is_dir() || !is_yaml(&path) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if name.starts_with('.') {
                    continue;
                }
            }

            match Self::read_document(&path) {
                Ok(config) => {
                    if !seen.insert(config.name.clone()) {
                        warn!(rule = %config.name, path = %path.display(), "duplicate rule name, skipping document");
                        continue;
                    }
                    configs.push(config);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load rule config");
                }
            }
        }

        sort_configs(&mut configs);
        Ok(configs)
    }

    /// Get a single rule configuration by name.
    pub fn get(&self, name: &str) -> Result<RuleConfig> {
        validate_rule_name(name)?;
        match self.existing_path(name) {
            Some(path) => Self::read_document(&path),
            None => Err(RuleError::ConfigNotFound(name.to_string())),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        validate_rule_name(name).is_ok() && self.existing_path(name).is_some()
    }

    /// Create or overwrite a rule configuration.
    ///
    /// The stored revision is one past the last revision ever issued for this
    /// name, regardless of the revision on the input.
    pub fn save(&self, config: &RuleConfig) -> Result<RuleConfig> {
        validate_rule_name(&config.name)?;
        let _guard = self.write_lock.lock().expect("store lock poisoned");

        let previous = match self.existing_path(&config.name) {
            Some(path) => Self::read_document(&path).ok().map(|c| c.revision),
            None => None,
        };

        let mut stored = config.clone();
        stored.revision = self.next_revision(&config.name, previous.unwrap_or(0))?;
        self.write_document(&stored)?;

        info!(rule = %stored.name, revision = stored.revision, "saved rule config");
        Ok(stored)
    }

    /// Apply a partial update to an existing rule.
    pub fn update(&self, name: &str, patch: &RulePatch) -> Result<RuleConfig> {
        validate_rule_name(name)?;
        let _guard = self.write_lock.lock().expect("store lock poisoned");

        let path = self
            .existing_path(name)
            .ok_or_else(|| RuleError::ConfigNotFound(name.to_string()))?;
        let mut config = Self::read_document(&path)?;

        patch.apply_to(&mut config);
        config.revision = self.next_revision(name, config.revision)?;
        self.write_document(&config)?;

        info!(rule = %name, revision = config.revision, "updated rule config");
        Ok(config)
    }

    /// Remove a rule configuration document. Its revision counter is kept.
    pub fn delete(&self, name: &str) -> Result<()> {
        validate_rule_name(name)?;
        let _guard = self.write_lock.lock().expect("store lock poisoned");

        let path = self
            .existing_path(name)
            .ok_or_else(|| RuleError::ConfigNotFound(name.to_string()))?;
        fs::remove_file(&path).map_err(|e| RuleError::persistence(&path, e))?;

        info!(rule = %name, "deleted rule config");
        Ok(())
    }

    /// Path of the stored document for `name`, trying `.yaml` then `.yml`.
    fn existing_path(&self, name: &str) -> Option<PathBuf> {
        ["yaml", "yml"]
            .iter()
            .map(|ext| self.config_dir.join(format!("{}.{}", name, ext)))
            .find(|p| p.is_file())
    }

    /// Allocate the next revision for `name`, never below `current + 1`.
    ///
    /// Callers hold the write lock.
    fn next_revision(&self, name: &str, current: u64) -> Result<u64> {
        let dir = self.config_dir.join(REVISIONS_DIR);
        let path = dir.join(name);
        let last = match fs::read_to_string(&path) {
            Ok(raw) => raw.trim().parse::<u64>().map_err(|e| {
                RuleError::InvalidConfig(format!(
                    "corrupt revision counter at {}: {}",
                    path.display(),
                    e
                ))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(RuleError::persistence(&path, e)),
        };

        let next = last.max(current) + 1;
        ensure_dir(&dir)?;
        write_atomic(&dir, name, &next.to_string())?;
        Ok(next)
    }

    fn read_document(path: &Path) -> Result<RuleConfig> {
        let contents = fs::read_to_string(path).map_err(|e| RuleError::persistence(path, e))?;
        let config: RuleConfig = serde_yaml::from_str(&contents)?;
        validate_rule_name(&config.name)?;
        Ok(config)
    }

    fn write_document(&self, config: &RuleConfig) -> Result<()> {
        ensure_dir(&self.config_dir)?;
        let yaml = serde_yaml::to_string(config)?;
        write_atomic(&self.config_dir, &format!("{}.yaml", config.name), &yaml)?;

        // Keep exactly one document per rule.
        let legacy = self.config_dir.join(format!("{}.yml", config.name));
        if legacy.is_file() {
            let _ = fs::remove_file(&legacy);
        }
        Ok(())
    }
}
