//! Append-only version history per rule.
//!
//! Layout: `{version_dir}/{rule}/version_{n}.yaml` holds one snapshot, and
//! `{version_dir}/{rule}/.counter` holds the last allocated version number.
//! Numbers come from the counter, so pruning old documents never causes a
//! number to be handed out twice.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use tracing::{info, warn};

use crate::error::{Result, RuleError};
use crate::fs_atomic::{ensure_dir, is_yaml, write_atomic};
use crate::schema::{validate_rule_name, RuleConfig, RuleVersion, VersionSummary};

#[cfg(test)]
mod tests;

const COUNTER_FILE: &str = ".counter";

/// Durable version history for rule configurations.
pub struct VersionManager {
    version_dir: PathBuf,
    /// Serializes version allocation across all rules.
    save_lock: Mutex<()>,
}

impl VersionManager {
    pub fn new(version_dir: PathBuf) -> Self {
        if !version_dir.exists() {
            if let Err(e) = fs::create_dir_all(&version_dir) {
                warn!(path = %version_dir.display(), error = %e, "failed to create versions directory");
            }
        }
        Self {
            version_dir,
            save_lock: Mutex::new(()),
        }
    }

    pub fn version_dir(&self) -> &Path {
        &self.version_dir
    }

    /// Persist a new snapshot and return it with its allocated version number.
    pub fn save_version(
        &self,
        rule_name: &str,
        snapshot: &RuleConfig,
        comment: &str,
    ) -> Result<RuleVersion> {
        let rule_dir = self.rule_dir(rule_name)?;
        let _guard = self.save_lock.lock().expect("version lock poisoned");
        ensure_dir(&rule_dir)?;

        let next = self.last_allocated(&rule_dir)? + 1;
        let version = RuleVersion {
            version: next,
            created_at: Utc::now(),
            comment: comment.to_string(),
            config: snapshot.clone(),
        };

        let file_name = version_file_name(next);
        let yaml = serde_yaml::to_string(&version)?;
        let doc_path = write_atomic(&rule_dir, &file_name, &yaml)?;

        if let Err(e) = write_atomic(&rule_dir, COUNTER_FILE, &next.to_string()) {
            // Without the counter the number could be reissued; roll the document back.
            let _ = fs::remove_file(&doc_path);
            return Err(e);
        }

        info!(rule = %rule_name, version = next, "saved rule version");
        Ok(version)
    }

    /// Fetch one stored version.
    pub fn get_version(&self, rule_name: &str, version: u64) -> Result<RuleVersion> {
        let path = self.rule_dir(rule_name)?.join(version_file_name(version));
        if !path.is_file() {
            return Err(RuleError::VersionNotFound {
                rule: rule_name.to_string(),
                version,
            });
        }
        read_version(&path)
    }

    /// List stored versions in ascending version order.
    pub fn list_versions(&self, rule_name: &str) -> Result<Vec<VersionSummary>> {
        let mut versions: Vec<VersionSummary> = self
            .read_all(rule_name)?
            .iter()
            .map(RuleVersion::summary)
            .collect();
        versions.sort_by_key(|v| v.version);
        Ok(versions)
    }

    /// Highest stored version number, if any version document exists.
    pub fn latest_version(&self, rule_name: &str) -> Result<Option<u64>> {
        Ok(self.list_versions(rule_name)?.last().map(|v| v.version))
    }

    /// Return the snapshot stored under `version`.
    ///
    /// This never touches the live configuration; callers apply the snapshot
    /// through the config store themselves.
    pub fn rollback_to_version(&self, rule_name: &str, version: u64) -> Result<RuleConfig> {
        Ok(self.get_version(rule_name, version)?.config)
    }

    /// Keep the newest `keep` versions and delete the rest.
    ///
    /// Returns the number of deleted version documents.
    pub fn cleanup_old_versions(&self, rule_name: &str, keep: usize) -> Result<usize> {
        let rule_dir = self.rule_dir(rule_name)?;
        let _guard = self.save_lock.lock().expect("version lock poisoned");

        let mut numbers: Vec<u64> = self.read_all(rule_name)?.iter().map(|v| v.version).collect();
        numbers.sort_unstable();
        let excess = numbers.len().saturating_sub(keep);

        for version in &numbers[..excess] {
            let path = rule_dir.join(version_file_name(*version));
            fs::remove_file(&path).map_err(|e| RuleError::persistence(&path, e))?;
        }

        if excess > 0 {
            info!(rule = %rule_name, removed = excess, kept = numbers.len() - excess, "pruned rule versions");
        }
        Ok(excess)
    }

    /// Delete every stored version document for a rule.
    ///
    /// The allocation counter is kept, so a recreated rule continues numbering
    /// where the deleted history stopped.
    pub fn delete_rule_versions(&self, rule_name: &str) -> Result<usize> {
        let rule_dir = self.rule_dir(rule_name)?;
        let _guard = self.save_lock.lock().expect("version lock poisoned");

        let mut removed = 0;
        for path in version_documents(&rule_dir)? {
            fs::remove_file(&path).map_err(|e| RuleError::persistence(&path, e))?;
            removed += 1;
        }

        info!(rule = %rule_name, removed, "deleted rule version history");
        Ok(removed)
    }

    fn rule_dir(&self, rule_name: &str) -> Result<PathBuf> {
        validate_rule_name(rule_name)?;
        Ok(self.version_dir.join(rule_name))
    }

    /// Last allocated number: the counter, or the highest stored document when
    /// the counter is missing (histories written before counters existed).
    fn last_allocated(&self, rule_dir: &Path) -> Result<u64> {
        let counter_path = rule_dir.join(COUNTER_FILE);
        if counter_path.is_file() {
            let raw = fs::read_to_string(&counter_path)
                .map_err(|e| RuleError::persistence(&counter_path, e))?;
            return raw.trim().parse::<u64>().map_err(|e| {
                RuleError::InvalidConfig(format!(
                    "corrupt version counter at {}: {}",
                    counter_path.display(),
                    e
                ))
            });
        }

        let mut highest = 0;
        for path in version_documents(rule_dir)? {
            match read_version(&path) {
                Ok(v) => highest = highest.max(v.version),
                Err(e) => warn!(path = %path.display(), error = %e, "unreadable version document"),
            }
        }
        Ok(highest)
    }

    fn read_all(&self, rule_name: &str) -> Result<Vec<RuleVersion>> {
        let rule_dir = self.rule_dir(rule_name)?;
        let mut versions = Vec::new();
        for path in version_documents(&rule_dir)? {
            match read_version(&path) {
                Ok(v) => versions.push(v),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable version document"),
            }
        }
        Ok(versions)
    }
}

fn version_file_name(version: u64) -> String {
    format!("version_{}.yaml", version)
}

/// Version documents in a rule directory; a missing directory has none.
fn version_documents(rule_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(rule_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(RuleError::persistence(rule_dir, e)),
    };

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| RuleError::persistence(rule_dir, e))?.path();
        let is_version = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("version_"))
            .unwrap_or(false);
        if is_version && is_yaml(&path) {
            paths.push(path);
        }
    }
    Ok(paths)
}

fn read_version(path: &Path) -> Result<RuleVersion> {
    let contents = fs::read_to_string(path).map_err(|e| RuleError::persistence(path, e))?;
    Ok(serde_yaml::from_str(&contents)?)
}
