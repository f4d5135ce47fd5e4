use serde_json::json;
use tokio_util::sync::CancellationToken;

use transflow_pipeline::{PipelineError, RecordOutcome};

use crate::helpers::{record, schema_validation, type_conversion, Harness};

fn numbered(n: usize) -> Vec<transflow_core::Record> {
    (0..n)
        .map(|i| {
            if i % 3 == 1 {
                // Missing event_type: dropped by validation.
                record(json!({ "i": i }))
            } else if i % 3 == 2 {
                record(json!({ "i": i, "event_type": "e", "amount": "bad" }))
            } else {
                record(json!({ "i": i, "event_type": "e", "amount": i.to_string() }))
            }
        })
        .collect()
}

#[tokio::test]
async fn outcomes_stay_index_aligned_across_windows() {
    let harness =
        Harness::with_rules(vec![schema_validation(json!(["event_type"])), type_conversion(true)])
            .await;

    let result = harness.engine.process_batches(numbered(10), 3).await.unwrap();
    assert_eq!(result.len(), 10);

    for (i, outcome) in result.outcomes.iter().enumerate() {
        match i % 3 {
            0 => {
                let out = outcome.record().expect("transformed");
                assert_eq!(out["i"], json!(i));
                assert_eq!(out["amount"], json!(i as f64));
            }
            1 => assert!(matches!(outcome, RecordOutcome::Dropped { rule } if rule == "schema_validation")),
            _ => assert!(outcome.is_failed()),
        }
    }

    let failed: Vec<usize> = result.errors().iter().map(|e| e.index).collect();
    assert_eq!(failed, vec![2, 5, 8]);
    let summary = result.summary();
    assert_eq!((summary.transformed, summary.dropped, summary.failed), (4, 3, 3));
}

#[tokio::test]
async fn windowed_and_single_batch_results_agree() {
    let harness =
        Harness::with_rules(vec![schema_validation(json!(["event_type"])), type_conversion(true)])
            .await;

    let single = harness.engine.process_batch(numbered(7)).await.unwrap();
    let windowed = harness.engine.process_batches(numbered(7), 2).await.unwrap();
    assert_eq!(single, windowed);
}

#[tokio::test]
async fn whole_batch_failure_is_an_error() {
    let harness = Harness::with_rules(vec![type_conversion(true)]).await;
    let records = vec![record(json!({"amount": "x"})), record(json!({"amount": "y"}))];

    let err = harness.engine.process_batches(records, 1).await.unwrap_err();
    match err {
        PipelineError::BatchFailed { failed, first } => {
            assert_eq!(failed, 2);
            assert_eq!(first.rule, "type_conversion");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn partial_failure_across_windows_is_not_an_error() {
    let harness = Harness::with_rules(vec![type_conversion(true)]).await;
    // The first window fails entirely; the second succeeds.
    let records = vec![
        record(json!({"amount": "x"})),
        record(json!({"amount": "y"})),
        record(json!({"amount": "1"})),
    ];

    let result = harness.engine.process_batches(records, 2).await.unwrap();
    assert_eq!(result.failed_count(), 2);
    assert_eq!(result.succeeded().len(), 1);
}

#[tokio::test]
async fn cancellation_reports_every_unstarted_record() {
    let harness = Harness::with_rules(vec![schema_validation(json!(["event_type"]))]).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = harness
        .engine
        .process_batches_with_cancel(numbered(5), 2, &cancel)
        .await
        .unwrap();
    assert_eq!(result.cancelled_count(), 5);
    assert_eq!(harness.engine.rule_stats()["schema_validation"].processed, 0);
}
