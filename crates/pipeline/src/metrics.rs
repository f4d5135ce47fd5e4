//! Per-rule execution samples.

use std::time::Duration;

use tracing::debug;

use transflow_core::TransformationType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    Passed,
    Dropped,
    Failed,
}

impl SampleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleOutcome::Passed => "passed",
            SampleOutcome::Dropped => "dropped",
            SampleOutcome::Failed => "failed",
        }
    }
}

/// One rule applied to one record.
#[derive(Debug, Clone, Copy)]
pub struct RuleSample<'a> {
    pub rule: &'a str,
    pub rule_type: TransformationType,
    pub outcome: SampleOutcome,
    pub duration: Duration,
}

/// Receives a sample for every rule invocation. Must not block.
pub trait MetricsSink: Send + Sync {
    fn record(&self, sample: &RuleSample<'_>);
}

/// Default sink: emits each sample as a `debug` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMetricsSink;

impl MetricsSink for TracingMetricsSink {
    fn record(&self, sample: &RuleSample<'_>) {
        debug!(
            rule = %sample.rule,
            rule_type = %sample.rule_type,
            outcome = sample.outcome.as_str(),
            duration_us = sample.duration.as_micros() as u64,
            "rule applied"
        );
    }
}
