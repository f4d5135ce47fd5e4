use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use globset::{GlobBuilder, GlobMatcher};
use indexmap::IndexMap;
use tracing::debug;

use crate::backend::{BackendUsage, CacheBackend, CacheError};

struct Entry {
    value: Vec<u8>,
    stored_at: Instant,
    /// `None` when the TTL is too large to represent; such entries never expire.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

#[derive(Default)]
struct Inner {
    entries: IndexMap<String, Entry>,
    bytes: usize,
}

impl Inner {
    fn remove(&mut self, key: &str) -> bool {
        match self.entries.shift_remove(key) {
            Some(entry) => {
                self.bytes -= entry.value.len();
                true
            }
            None => false,
        }
    }

    fn retain(&mut self, mut keep: impl FnMut(&str, &Entry) -> bool) -> usize {
        let before = self.entries.len();
        let mut freed = 0;
        self.entries.retain(|key, entry| {
            let kept = keep(key, entry);
            if !kept {
                freed += entry.value.len();
            }
            kept
        });
        self.bytes -= freed;
        before - self.entries.len()
    }
}

/// In-process backend bounded by total value bytes.
///
/// Entries keep insertion order; when the budget is exceeded the oldest
/// inserted entries are evicted first. Expired entries are dropped lazily on
/// read and on [`CacheBackend::sweep`].
pub struct MemoryBackend {
    max_bytes: usize,
    inner: Mutex<Inner>,
}

impl MemoryBackend {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }
}

fn compile(pattern: &str) -> Result<GlobMatcher, CacheError> {
    GlobBuilder::new(pattern)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|e| CacheError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut inner = self.inner.lock().expect("memory cache lock poisoned");
        match inner.entries.get(key) {
            None => return Ok(None),
            Some(entry) if !entry.is_expired(Instant::now()) => {
                return Ok(Some(entry.value.clone()))
            }
            Some(_) => {}
        }
        inner.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let mut inner = self.inner.lock().expect("memory cache lock poisoned");
        // Re-inserting moves the key to the back of the eviction order.
        inner.remove(key);

        if value.len() > self.max_bytes {
            debug!(key, size = value.len(), max_bytes = self.max_bytes, "value exceeds cache budget, not stored");
            return Ok(());
        }

        let now = Instant::now();
        inner.bytes += value.len();
        inner.entries.insert(
            key.to_string(),
            Entry {
                value,
                stored_at: now,
                expires_at: now.checked_add(ttl),
            },
        );

        let mut evicted = 0;
        while inner.bytes > self.max_bytes {
            let Some((_, entry)) = inner.entries.shift_remove_index(0) else {
                break;
            };
            inner.bytes -= entry.value.len();
            evicted += 1;
        }
        if evicted > 0 {
            debug!(evicted, bytes = inner.bytes, "evicted oldest cache entries");
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut inner = self.inner.lock().expect("memory cache lock poisoned");
        Ok(inner.remove(key))
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<usize, CacheError> {
        let matcher = compile(pattern)?;
        let mut inner = self.inner.lock().expect("memory cache lock poisoned");
        Ok(inner.retain(|key, _| !matcher.is_match(key)))
    }

    async fn sweep(&self, max_age: Duration) -> Result<usize, CacheError> {
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("memory cache lock poisoned");
        Ok(inner.retain(|_, entry| {
            !entry.is_expired(now) && now.duration_since(entry.stored_at) <= max_age
        }))
    }

    async fn usage(&self) -> Result<BackendUsage, CacheError> {
        let inner = self.inner.lock().expect("memory cache lock poisoned");
        Ok(BackendUsage {
            entries: inner.entries.len(),
            bytes: inner.bytes,
        })
    }
}
