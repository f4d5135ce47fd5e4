//! The rule execution engine.
//!
//! The engine never reads the config store on the hot path. [`PipelineEngine::reload`]
//! builds a fresh [`PipelineSnapshot`] from the store and swaps it in as one
//! `Arc`; every record or batch runs against the snapshot it started with.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use transflow_cache::{Fingerprint, ResultCache};
use transflow_core::{Batch, Record, RuleExecutionError};
use transflow_rules::transforms::ApplyResult;
use transflow_rules::{RuleConfig, RuleConfigStore, RuleRegistry, RuleStats, RuleStatsSnapshot, Transform};

use crate::batch::{BatchResult, RecordOutcome};
use crate::error::{PipelineError, Result};
use crate::metrics::{MetricsSink, RuleSample, SampleOutcome, TracingMetricsSink};

const DEFAULT_CONCURRENCY: usize = 8;

/// A cached rule result plus the soft errors counted while computing it.
#[derive(Serialize, Deserialize)]
struct CachedApply {
    record: Option<Record>,
    errors: u64,
}

/// A built rule together with the config it was built from.
pub struct ActiveRule {
    pub config: RuleConfig,
    rule: Box<dyn Transform>,
    stats: Arc<RuleStats>,
}

/// Immutable view of the pipeline between two reloads.
pub struct PipelineSnapshot {
    /// Enabled rules in execution order.
    rules: Vec<ActiveRule>,
    /// Revision of every stored config at load time, enabled or not.
    revisions: BTreeMap<String, u64>,
    pub loaded_at: DateTime<Utc>,
}

impl PipelineSnapshot {
    fn empty() -> Self {
        Self {
            rules: Vec::new(),
            revisions: BTreeMap::new(),
            loaded_at: Utc::now(),
        }
    }

    pub fn rules(&self) -> impl Iterator<Item = &RuleConfig> {
        self.rules.iter().map(|r| &r.config)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Result of one [`PipelineEngine::reload`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReloadSummary {
    /// Enabled rules now active.
    pub active: usize,
    pub disabled: usize,
    /// Enabled rules that failed to build and were left out.
    pub skipped: usize,
    /// Cached entries removed for changed or deleted rules.
    pub invalidated: usize,
}

/// Executes the enabled rules of the current snapshot over records.
pub struct PipelineEngine {
    store: Arc<RuleConfigStore>,
    registry: Arc<RuleRegistry>,
    cache: Option<Arc<ResultCache>>,
    metrics: Arc<dyn MetricsSink>,
    concurrency: usize,
    active: RwLock<Arc<PipelineSnapshot>>,
    /// Serializes reloads.
    reload_lock: tokio::sync::Mutex<()>,
    /// Counters by rule name; they outlive snapshots.
    stats: Mutex<HashMap<String, Arc<RuleStats>>>,
}

impl PipelineEngine {
    /// Engine with an empty snapshot. Call [`reload`](Self::reload) to activate rules.
    pub fn new(store: Arc<RuleConfigStore>, registry: Arc<RuleRegistry>) -> Self {
        Self {
            store,
            registry,
            cache: None,
            metrics: Arc::new(TracingMetricsSink),
            concurrency: DEFAULT_CONCURRENCY,
            active: RwLock::new(Arc::new(PipelineSnapshot::empty())),
            reload_lock: tokio::sync::Mutex::new(()),
            stats: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Maximum records in flight within one batch (at least 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn store(&self) -> &Arc<RuleConfigStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<RuleRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> Option<&Arc<ResultCache>> {
        self.cache.as_ref()
    }

    /// The snapshot new work will run against.
    pub fn snapshot(&self) -> Arc<PipelineSnapshot> {
        Arc::clone(&self.active.read().expect("pipeline snapshot lock poisoned"))
    }

    /// Configs of the active rules, in execution order.
    pub fn active_rules(&self) -> Vec<RuleConfig> {
        self.snapshot().rules().cloned().collect()
    }

    /// Counters of every rule that has been active since startup.
    pub fn rule_stats(&self) -> BTreeMap<String, RuleStatsSnapshot> {
        let stats = self.stats.lock().expect("rule stats lock poisoned");
        stats
            .iter()
            .map(|(name, s)| (name.clone(), s.snapshot()))
            .collect()
    }

    fn stats_for(&self, rule_name: &str) -> Arc<RuleStats> {
        let mut stats = self.stats.lock().expect("rule stats lock poisoned");
        Arc::clone(stats.entry(rule_name.to_string()).or_default())
    }

    /// Rebuild the active rules from the store and swap them in.
    ///
    /// Rules that fail to build are logged and left out; the rest load. If the
    /// store cannot be read the previous snapshot stays active.
    pub async fn reload(&self) -> Result<ReloadSummary> {
        let _guard = self.reload_lock.lock().await;
        let configs = self.store.load_all()?;
        let previous = self.snapshot();

        let mut summary = ReloadSummary::default();
        let mut rules = Vec::new();
        let mut revisions = BTreeMap::new();
        for config in configs {
            revisions.insert(config.name.clone(), config.revision);
            if !config.enabled {
                summary.disabled += 1;
                continue;
            }
            match self.registry.create(&config) {
                Ok(rule) => rules.push(ActiveRule {
                    stats: self.stats_for(&config.name),
                    config,
                    rule,
                }),
                Err(e) => {
                    warn!(rule = %config.name, error = %e, "failed to build rule, skipping");
                    summary.skipped += 1;
                }
            }
        }
        summary.active = rules.len();

        let stale: Vec<String> = previous
            .revisions
            .iter()
            .filter(|(name, revision)| revisions.get(*name) != Some(*revision))
            .map(|(name, _)| name.clone())
            .collect();

        let next = Arc::new(PipelineSnapshot {
            rules,
            revisions,
            loaded_at: Utc::now(),
        });
        *self.active.write().expect("pipeline snapshot lock poisoned") = next;

        if let Some(cache) = &self.cache {
            for name in &stale {
                match cache.invalidate(name).await {
                    Ok(removed) => summary.invalidated += removed,
                    Err(e) => warn!(rule = %name, error = %e, "failed to invalidate cached results"),
                }
            }
        }

        info!(
            active = summary.active,
            disabled = summary.disabled,
            skipped = summary.skipped,
            changed = stale.len(),
            invalidated = summary.invalidated,
            "pipeline reloaded"
        );
        Ok(summary)
    }

    /// Run one record through every active rule in order.
    ///
    /// `Ok(None)` means a rule dropped the record. A rule error fails this
    /// record only.
    pub async fn apply_rules(&self, record: Record) -> std::result::Result<Option<Record>, RuleExecutionError> {
        let snapshot = self.snapshot();
        match self.run_record(&snapshot, record).await {
            RecordOutcome::Transformed { record } => Ok(Some(record)),
            RecordOutcome::Dropped { .. } | RecordOutcome::Cancelled => Ok(None),
            RecordOutcome::Failed { error } => Err(error),
        }
    }

    /// Process records concurrently, reporting one outcome per input index.
    ///
    /// Fails only when the batch is non-empty and every record failed.
    pub async fn process_batch(&self, records: Batch) -> Result<BatchResult> {
        self.process_batch_with_cancel(records, &CancellationToken::new())
            .await
    }

    /// Like [`process_batch`](Self::process_batch), but stops starting new
    /// records once `cancel` fires. Records already started run to completion;
    /// the rest are reported as [`RecordOutcome::Cancelled`].
    pub async fn process_batch_with_cancel(
        &self,
        records: Batch,
        cancel: &CancellationToken,
    ) -> Result<BatchResult> {
        let snapshot = self.snapshot();
        let result = self.run_batch(&snapshot, records, cancel).await;
        check_batch(result)
    }

    /// Split `records` into windows of `batch_size` and process them in turn.
    ///
    /// Outcomes are concatenated, so indices refer to the full input.
    pub async fn process_batches(&self, records: Batch, batch_size: usize) -> Result<BatchResult> {
        self.process_batches_with_cancel(records, batch_size, &CancellationToken::new())
            .await
    }

    pub async fn process_batches_with_cancel(
        &self,
        records: Batch,
        batch_size: usize,
        cancel: &CancellationToken,
    ) -> Result<BatchResult> {
        if batch_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "batch_size must be greater than zero".to_string(),
            ));
        }

        let mut combined = BatchResult::new(Vec::with_capacity(records.len()));
        let mut remaining = records.into_iter();
        let mut window_index = 0;
        loop {
            let window: Batch = remaining.by_ref().take(batch_size).collect();
            if window.is_empty() {
                break;
            }
            // Each window picks up the latest snapshot.
            let snapshot = self.snapshot();
            let result = self.run_batch(&snapshot, window, cancel).await;
            debug!(window = window_index, summary = ?result.summary(), "processed window");
            combined.extend(result);
            window_index += 1;
        }
        check_batch(combined)
    }

    async fn run_batch(
        &self,
        snapshot: &PipelineSnapshot,
        records: Batch,
        cancel: &CancellationToken,
    ) -> BatchResult {
        let outcomes: Vec<RecordOutcome> = stream::iter(records)
            .map(|record| async move {
                if cancel.is_cancelled() {
                    return RecordOutcome::Cancelled;
                }
                self.run_record(snapshot, record).await
            })
            .buffered(self.concurrency)
            .collect()
            .await;
        BatchResult::new(outcomes)
    }

    async fn run_record(&self, snapshot: &PipelineSnapshot, mut record: Record) -> RecordOutcome {
        for active in &snapshot.rules {
            let started = Instant::now();
            let result = self.apply_one(active, record).await;
            let duration = started.elapsed();
            active.stats.record_run(duration);

            let outcome = match &result {
                Ok(Some(_)) => SampleOutcome::Passed,
                Ok(None) => SampleOutcome::Dropped,
                Err(_) => SampleOutcome::Failed,
            };
            self.metrics.record(&RuleSample {
                rule: &active.config.name,
                rule_type: active.config.rule_type,
                outcome,
                duration,
            });

            match result {
                Ok(Some(next)) => record = next,
                Ok(None) => {
                    return RecordOutcome::Dropped {
                        rule: active.config.name.clone(),
                    }
                }
                Err(error) => {
                    active.stats.record_error();
                    debug!(rule = %active.config.name, reason = %error.reason, "rule failed for record");
                    return RecordOutcome::Failed { error };
                }
            }
        }
        RecordOutcome::Transformed { record }
    }

    async fn apply_one(&self, active: &ActiveRule, record: Record) -> ApplyResult {
        match &self.cache {
            Some(cache) if active.rule.cacheable() => {
                let fingerprint =
                    Fingerprint::new(&active.config.name, active.config.revision, &record);
                let cached: CachedApply = cache
                    .get_or_compute(&fingerprint, || -> std::result::Result<_, RuleExecutionError> {
                        let scratch = RuleStats::new();
                        let record = active.rule.apply(record, &scratch)?;
                        Ok(CachedApply {
                            record,
                            errors: scratch.errors(),
                        })
                    })
                    .await?;
                // Replayed on hits too.
                active.stats.add_errors(cached.errors);
                Ok(cached.record)
            }
            _ => active.rule.apply(record, &active.stats),
        }
    }
}

fn check_batch(result: BatchResult) -> Result<BatchResult> {
    if !result.all_failed() {
        return Ok(result);
    }
    let failed = result.len();
    let first = result
        .outcomes
        .into_iter()
        .find_map(|o| match o {
            RecordOutcome::Failed { error } => Some(error),
            _ => None,
        })
        .unwrap_or_else(|| RuleExecutionError::new("pipeline", "batch failed"));
    warn!(failed, first_error = %first, "every record in batch failed");
    Err(PipelineError::BatchFailed { failed, first })
}
