//! Per-rule execution counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Lock-free counters shared between a rule and the engine running it.
#[derive(Debug, Default)]
pub struct RuleStats {
    processed: AtomicU64,
    errors: AtomicU64,
    processing_nanos: AtomicU64,
}

/// Point-in-time copy of [`RuleStats`].
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct RuleStatsSnapshot {
    pub processed: u64,
    pub errors: u64,
    pub processing_time_ms: f64,
}

impl RuleStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one invocation and its wall-clock time.
    pub fn record_run(&self, elapsed: Duration) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.processing_nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.add_errors(1);
    }

    pub fn add_errors(&self, count: u64) {
        if count > 0 {
            self.errors.fetch_add(count, Ordering::Relaxed);
        }
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn processing_time(&self) -> Duration {
        Duration::from_nanos(self.processing_nanos.load(Ordering::Relaxed))
    }

    pub fn snapshot(&self) -> RuleStatsSnapshot {
        RuleStatsSnapshot {
            processed: self.processed(),
            errors: self.errors(),
            processing_time_ms: self.processing_time().as_secs_f64() * 1000.0,
        }
    }
}
