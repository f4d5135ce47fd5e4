//! Storage seam for cached results.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("invalid key pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("cached value is corrupt: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Aggregate size of a backend's live entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendUsage {
    pub entries: usize,
    pub bytes: usize,
}

/// Key/value store with per-entry TTL.
///
/// Keys are plain strings; pattern operations take globs over whole keys.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Fetch a live (unexpired) value.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store `value` under `key`, replacing any previous entry.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    /// Remove one key. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Remove every key matching `pattern`. Returns the number removed.
    async fn delete_pattern(&self, pattern: &str) -> Result<usize, CacheError>;

    /// Remove entries stored more than `max_age` ago, plus anything expired.
    async fn sweep(&self, max_age: Duration) -> Result<usize, CacheError>;

    async fn usage(&self) -> Result<BackendUsage, CacheError>;
}
