use serde_json::json;

use transflow_core::TransformationType;
use transflow_rules::RuleConfig;

use crate::helpers::{field_mapping, mask_pii, record, schema_validation, type_conversion, Harness};

#[tokio::test]
async fn mask_pii_changes_email_and_is_stable() {
    let harness = Harness::with_rules(vec![mask_pii()]).await;

    let first = harness
        .engine
        .apply_rules(record(json!({"email": "a@b.com"})))
        .await
        .unwrap()
        .unwrap();
    let second = harness
        .engine
        .apply_rules(record(json!({"email": "a@b.com"})))
        .await
        .unwrap()
        .unwrap();

    assert_ne!(first["email"], json!("a@b.com"));
    assert!(!first["email"].as_str().unwrap().contains('@'));
    assert_eq!(first, second);
}

#[tokio::test]
async fn validation_drop_counts_processed_not_errors() {
    let harness =
        Harness::with_rules(vec![schema_validation(json!(["event_type", "timestamp"]))]).await;

    let out = harness
        .engine
        .apply_rules(record(json!({"event_type": "x"})))
        .await
        .unwrap();
    assert!(out.is_none());

    let stats = harness.engine.rule_stats();
    assert_eq!(stats["schema_validation"].processed, 1);
    assert_eq!(stats["schema_validation"].errors, 0);
}

#[tokio::test]
async fn mapping_runs_before_conversion() {
    let harness = Harness::with_rules(vec![type_conversion(false), field_mapping()]).await;

    let out = harness
        .engine
        .apply_rules(record(json!({"ts": "2024-01-01T00:00:00", "amt": "10.5", "id": 7})))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        out,
        record(json!({"timestamp": "2024-01-01T00:00:00Z", "amount": 10.5, "id": 7}))
    );
}

#[tokio::test]
async fn lenient_conversion_keeps_value_and_counts_error() {
    let harness = Harness::with_rules(vec![type_conversion(false)]).await;

    let out = harness
        .engine
        .apply_rules(record(json!({"amount": "invalid"})))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(out["amount"], json!("invalid"));
    assert_eq!(harness.engine.rule_stats()["type_conversion"].errors, 1);
}

#[tokio::test]
async fn strict_conversion_fails_the_record() {
    let harness = Harness::with_rules(vec![type_conversion(true)]).await;

    let err = harness
        .engine
        .apply_rules(record(json!({"amount": "invalid"})))
        .await
        .unwrap_err();

    assert_eq!(err.rule, "type_conversion");
    assert_eq!(harness.engine.rule_stats()["type_conversion"].errors, 1);
}

#[tokio::test]
async fn timestamp_enrichment_is_never_cached() {
    let enrich = RuleConfig::new("timestamp_enrichment", TransformationType::Enrich, 0);
    let harness = Harness::with_rules(vec![enrich]).await;

    let out = harness
        .engine
        .apply_rules(record(json!({"event_type": "login"})))
        .await
        .unwrap()
        .unwrap();

    assert!(out["processed_at"].as_str().unwrap().ends_with('Z'));
    assert_eq!(harness.cache.stats().await.entries, 0);
}

#[tokio::test]
async fn equal_order_breaks_ties_by_name() {
    let a = RuleConfig::new("b_rule", TransformationType::Enrich, 5).with_kind("timestamp_enrichment");
    let b = RuleConfig::new("a_rule", TransformationType::Enrich, 5).with_kind("timestamp_enrichment");
    let harness = Harness::with_rules(vec![a, b]).await;

    let names: Vec<String> = harness
        .engine
        .active_rules()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["a_rule", "b_rule"]);
}
