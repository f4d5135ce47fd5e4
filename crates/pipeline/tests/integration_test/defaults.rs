use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;

use transflow_pipeline::PipelineEngine;
use transflow_rules::{RuleConfigStore, RuleRegistry};

use crate::helpers::record;

fn shipped_engine() -> PipelineEngine {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../config/transformations");
    PipelineEngine::new(
        Arc::new(RuleConfigStore::new(dir)),
        Arc::new(RuleRegistry::with_builtins()),
    )
}

#[tokio::test]
async fn shipped_rules_stamp_and_lowercase() {
    let engine = shipped_engine();
    let summary = engine.reload().await.unwrap();
    assert_eq!(summary.active, 4);
    assert_eq!(summary.disabled, 1);

    let out = engine
        .apply_rules(record(json!({
            "event_type": "TEST_EVENT",
            "timestamp": "2024-01-01T00:00:00",
            "source": "TEST_SOURCE",
            "email": "jane@example.com"
        })))
        .await
        .unwrap()
        .unwrap();

    assert!(out.contains_key("processed_at"));
    assert_eq!(out["event_type"], "test_event");
    assert_eq!(out["source"], "test_source");
    assert_ne!(out["email"], "jane@example.com");
    // Conversion ships disabled.
    assert_eq!(out["timestamp"], "2024-01-01T00:00:00");
}

#[tokio::test]
async fn shipped_rules_drop_incomplete_records() {
    let engine = shipped_engine();
    engine.reload().await.unwrap();

    let out = engine
        .apply_rules(record(json!({"event_type": "login"})))
        .await
        .unwrap();
    assert!(out.is_none());

    let stats = engine.rule_stats();
    assert_eq!(stats["schema_validation"].processed, 1);
    assert_eq!(stats["data_normalization"].processed, 0);
    assert!(!stats.contains_key("type_conversion"));
}
