//! Index-aligned results of batch processing.

use serde::Serialize;

use transflow_core::{Record, RuleExecutionError};

/// What happened to the record at one input index.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordOutcome {
    Transformed { record: Record },
    /// A rule returned no record on purpose.
    Dropped { rule: String },
    Failed { error: RuleExecutionError },
    /// Never started because the batch was cancelled.
    Cancelled,
}

impl RecordOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, RecordOutcome::Failed { .. })
    }

    pub fn record(&self) -> Option<&Record> {
        match self {
            RecordOutcome::Transformed { record } => Some(record),
            _ => None,
        }
    }
}

/// A failed record and where it sat in the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchError {
    pub index: usize,
    pub rule: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub transformed: usize,
    pub dropped: usize,
    pub failed: usize,
    pub cancelled: usize,
}

/// One outcome per input record, in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResult {
    pub outcomes: Vec<RecordOutcome>,
}

impl BatchResult {
    pub fn new(outcomes: Vec<RecordOutcome>) -> Self {
        Self { outcomes }
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Transformed records in input order.
    pub fn succeeded(&self) -> Vec<&Record> {
        self.outcomes.iter().filter_map(RecordOutcome::record).collect()
    }

    pub fn into_succeeded(self) -> Vec<Record> {
        self.outcomes
            .into_iter()
            .filter_map(|o| match o {
                RecordOutcome::Transformed { record } => Some(record),
                _ => None,
            })
            .collect()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }

    pub fn dropped_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, RecordOutcome::Dropped { .. }))
            .count()
    }

    pub fn cancelled_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, RecordOutcome::Cancelled))
            .count()
    }

    pub fn errors(&self) -> Vec<BatchError> {
        self.outcomes
            .iter()
            .enumerate()
            .filter_map(|(index, o)| match o {
                RecordOutcome::Failed { error } => Some(BatchError {
                    index,
                    rule: error.rule.clone(),
                    reason: error.reason.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    /// True when the batch is non-empty and no record escaped failure.
    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(RecordOutcome::is_failed)
    }

    pub fn summary(&self) -> BatchSummary {
        let failed = self.failed_count();
        let dropped = self.dropped_count();
        let cancelled = self.cancelled_count();
        BatchSummary {
            total: self.len(),
            transformed: self.len() - failed - dropped - cancelled,
            dropped,
            failed,
            cancelled,
        }
    }

    pub(crate) fn extend(&mut self, other: BatchResult) {
        self.outcomes.extend(other.outcomes);
    }
}
