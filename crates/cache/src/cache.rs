//! Get-or-compute cache over a [`CacheBackend`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use transflow_core::config::CacheConfig;

use crate::backend::{CacheBackend, CacheError};
use crate::fingerprint::Fingerprint;
use crate::memory::MemoryBackend;

/// Counters and backend usage at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub backend_errors: u64,
    pub entries: usize,
    pub bytes: usize,
}

/// Caches per-rule results keyed by [`Fingerprint`].
///
/// Backend failures never fail a caller: they are logged and the value is
/// computed without the cache.
pub struct ResultCache {
    backend: Arc<dyn CacheBackend>,
    namespace: String,
    ttl: Duration,
    /// One async gate per key currently being computed.
    in_flight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    backend_errors: AtomicU64,
}

impl ResultCache {
    pub fn new(backend: Arc<dyn CacheBackend>, namespace: impl Into<String>, ttl: Duration) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
            ttl,
            in_flight: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            backend_errors: AtomicU64::new(0),
        }
    }

    /// Cache over a fresh [`MemoryBackend`] sized from config.
    pub fn in_memory(config: &CacheConfig) -> Self {
        Self::new(
            Arc::new(MemoryBackend::new(config.max_bytes)),
            config.namespace.clone(),
            Duration::from_secs(config.ttl_secs),
        )
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached value for `fingerprint`, or run `compute` and store it.
    ///
    /// Concurrent callers with the same fingerprint wait for the first one
    /// and then read its stored result. Every `Ok` value is cached, including
    /// `None`; errors are returned to the caller and not cached.
    pub async fn get_or_compute<T, F, E>(&self, fingerprint: &Fingerprint, compute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T, E>,
    {
        let key = fingerprint.key(&self.namespace);
        if let Some(cached) = self.lookup(&key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(cached);
        }

        // Released on drop, so a caller cancelled while waiting cleans up too.
        let gate = GateGuard::acquire(self, key);
        let _permit = gate.lock().await;
        // Another caller may have filled the key while we waited.
        if let Some(cached) = self.lookup(&gate.key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(cached);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let value = compute()?;
        self.store(&gate.key, &value).await;
        Ok(value)
    }

    /// Drop every entry produced by `rule_name`.
    pub async fn invalidate(&self, rule_name: &str) -> Result<usize, CacheError> {
        let pattern = format!("{}:{}:*", self.namespace, rule_name);
        let removed = self.backend.delete_pattern(&pattern).await?;
        debug!(rule = %rule_name, removed, "invalidated cached results");
        Ok(removed)
    }

    /// Drop entries whose key matches `glob`, relative to this cache's namespace.
    ///
    /// `invalidate_pattern("mask_*:*")` removes the results of every rule whose
    /// name starts with `mask_`.
    pub async fn invalidate_pattern(&self, glob: &str) -> Result<usize, CacheError> {
        let pattern = format!("{}:{}", self.namespace, glob);
        self.backend.delete_pattern(&pattern).await
    }

    /// Remove entries older than `max_age`, whatever their TTL.
    pub async fn cleanup(&self, max_age: Duration) -> Result<usize, CacheError> {
        let removed = self.backend.sweep(max_age).await?;
        if removed > 0 {
            debug!(removed, max_age_secs = max_age.as_secs(), "cache cleanup");
        }
        Ok(removed)
    }

    pub async fn stats(&self) -> CacheStats {
        let usage = match self.backend.usage().await {
            Ok(usage) => usage,
            Err(e) => {
                self.note_backend_error("usage", &e);
                Default::default()
            }
        };
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            backend_errors: self.backend_errors.load(Ordering::Relaxed),
            entries: usage.entries,
            bytes: usage.bytes,
        }
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = match self.backend.get(key).await {
            Ok(bytes) => bytes?,
            Err(e) => {
                self.note_backend_error("get", &e);
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                self.note_backend_error("decode", &CacheError::from(e));
                let _ = self.backend.delete(key).await;
                None
            }
        }
    }

    async fn store<T: Serialize>(&self, key: &str, value: &T) {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.note_backend_error("encode", &CacheError::from(e));
                return;
            }
        };
        if let Err(e) = self.backend.set(key, bytes, self.ttl).await {
            self.note_backend_error("set", &e);
        }
    }

    fn note_backend_error(&self, op: &str, error: &CacheError) {
        self.backend_errors.fetch_add(1, Ordering::Relaxed);
        warn!(op, error = %error, "cache backend error, continuing uncached");
    }
}

/// Per-key single-flight gate, removed from the map once its last user is gone.
struct GateGuard<'a> {
    cache: &'a ResultCache,
    key: String,
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl<'a> GateGuard<'a> {
    fn acquire(cache: &'a ResultCache, key: String) -> Self {
        let gate = {
            let mut gates = cache.in_flight.lock().expect("cache gate lock poisoned");
            Arc::clone(
                gates
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
            )
        };
        Self { cache, key, gate }
    }
}

impl std::ops::Deref for GateGuard<'_> {
    type Target = tokio::sync::Mutex<()>;

    fn deref(&self) -> &Self::Target {
        &self.gate
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        let mut gates = self.cache.in_flight.lock().expect("cache gate lock poisoned");
        let current = gates.get(&self.key).is_some_and(|g| Arc::ptr_eq(g, &self.gate));
        // The map holds one reference and we hold the other; anyone else is still waiting.
        if current && Arc::strong_count(&self.gate) <= 2 {
            gates.remove(&self.key);
        }
    }
}
