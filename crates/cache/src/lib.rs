//! Fingerprint-keyed cache of per-rule transformation results.
//!
//! - [`Fingerprint`]: content hash of (rule, revision, record)
//! - [`ResultCache`]: get-or-compute with single-flight per key
//! - [`CacheBackend`]: async storage seam, with [`MemoryBackend`] in-process

pub mod backend;
pub mod cache;
pub mod fingerprint;
pub mod memory;

pub use backend::{BackendUsage, CacheBackend, CacheError};
pub use cache::{CacheStats, ResultCache};
pub use fingerprint::Fingerprint;
pub use memory::MemoryBackend;
