use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_parse<T: std::str::FromStr>(profile: &str, key: &str, default: T) -> T {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `TRANSFLOW_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("TRANSFLOW_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            storage: StorageConfig::from_env_profiled(p),
            cache: CacheConfig::from_env_profiled(p),
            pipeline: PipelineConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  storage:   rules_dir={}, versions_dir={}",
            self.storage.rules_dir.display(),
            self.storage.versions_dir.display()
        );
        tracing::info!(
            "  cache:     namespace={}, ttl={}s, max_bytes={}",
            self.cache.namespace,
            self.cache.ttl_secs,
            self.cache.max_bytes
        );
        tracing::info!(
            "  pipeline:  batch_size={}, concurrency={}, keep_versions={}",
            self.pipeline.batch_size,
            self.pipeline.concurrency,
            self.pipeline.keep_versions
        );
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile: String::new(),
            storage: StorageConfig::default(),
            cache: CacheConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

// ── Storage ───────────────────────────────────────────────────

/// Where rule configurations and their version history live on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub rules_dir: PathBuf,
    pub versions_dir: PathBuf,
}

const DEFAULT_RULES_DIR: &str = "config/transformations";

impl StorageConfig {
    fn from_env_profiled(p: &str) -> Self {
        let rules_dir = PathBuf::from(profiled_env_or(p, "RULES_DIR", DEFAULT_RULES_DIR));
        let versions_dir = profiled_env_opt(p, "VERSIONS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| rules_dir.join("versions"));
        Self {
            rules_dir,
            versions_dir,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let rules_dir = PathBuf::from(DEFAULT_RULES_DIR);
        Self {
            versions_dir: rules_dir.join("versions"),
            rules_dir,
        }
    }
}

// ── Result cache ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Key prefix shared by every cache entry.
    pub namespace: String,
    pub ttl_secs: u64,
    /// Aggregate value-size budget before oldest entries are evicted.
    pub max_bytes: usize,
}

impl CacheConfig {
    fn from_env_profiled(p: &str) -> Self {
        let defaults = Self::default();
        Self {
            namespace: profiled_env_or(p, "CACHE_NAMESPACE", &defaults.namespace),
            ttl_secs: profiled_env_parse(p, "CACHE_TTL_SECS", defaults.ttl_secs),
            max_bytes: profiled_env_parse(p, "CACHE_MAX_BYTES", defaults.max_bytes),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: "transform".to_string(),
            ttl_secs: 300,
            max_bytes: 64 * 1024 * 1024,
        }
    }
}

// ── Pipeline ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Window size used by `process_batches`.
    pub batch_size: usize,
    /// Maximum records in flight within one batch.
    pub concurrency: usize,
    /// Versions retained per rule by version cleanup.
    pub keep_versions: usize,
}

impl PipelineConfig {
    fn from_env_profiled(p: &str) -> Self {
        let defaults = Self::default();
        Self {
            batch_size: profiled_env_parse(p, "BATCH_SIZE", defaults.batch_size).max(1),
            concurrency: profiled_env_parse(p, "BATCH_CONCURRENCY", defaults.concurrency).max(1),
            keep_versions: profiled_env_parse(p, "KEEP_VERSIONS", defaults.keep_versions),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            concurrency: 8,
            keep_versions: 10,
        }
    }
}
