//! Ordered execution of transformation rules over records and batches.
//!
//! [`PipelineEngine`] holds an atomically swapped snapshot of the enabled
//! rules; [`RuleAdmin`] is the administrative facade that persists changes
//! and reloads the engine.

pub mod admin;
pub mod batch;
pub mod engine;
pub mod error;
pub mod metrics;

pub use admin::{AdminError, BatchUpdateResult, RuleAdmin};
pub use batch::{BatchError, BatchResult, BatchSummary, RecordOutcome};
pub use engine::{ActiveRule, PipelineEngine, PipelineSnapshot, ReloadSummary};
pub use error::{PipelineError, Result};
pub use metrics::{MetricsSink, RuleSample, SampleOutcome, TracingMetricsSink};
