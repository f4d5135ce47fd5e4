use std::collections::BTreeMap;

use serde_json::json;

use transflow_rules::RulePatch;

use crate::helpers::{field_mapping, mask_pii, record, type_conversion, Harness};

#[tokio::test]
async fn repeated_records_hit_the_cache() {
    let harness = Harness::with_rules(vec![mask_pii()]).await;

    for _ in 0..3 {
        harness
            .engine
            .apply_rules(record(json!({"email": "a@b.com"})))
            .await
            .unwrap();
    }

    let stats = harness.cache.stats().await;
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.entries, 1);
    // Cache hits still count as invocations.
    assert_eq!(harness.engine.rule_stats()["mask_pii"].processed, 3);
}

#[tokio::test]
async fn key_order_does_not_defeat_the_cache() {
    let harness = Harness::with_rules(vec![field_mapping()]).await;

    let mut a = transflow_core::Record::new();
    a.insert("amt".into(), json!(1));
    a.insert("ts".into(), json!("x"));
    let mut b = transflow_core::Record::new();
    b.insert("ts".into(), json!("x"));
    b.insert("amt".into(), json!(1));

    harness.engine.apply_rules(a).await.unwrap();
    harness.engine.apply_rules(b).await.unwrap();
    assert_eq!(harness.cache.stats().await.hits, 1);
}

#[tokio::test]
async fn config_change_invalidates_the_rule() {
    let harness = Harness::with_rules(vec![mask_pii(), field_mapping()]).await;
    let input = record(json!({"email": "a@b.com", "amt": 1}));
    harness.engine.apply_rules(input.clone()).await.unwrap();
    assert_eq!(harness.cache.stats().await.entries, 2);

    let patch = RulePatch::config(
        json!({"patterns": {"email": "redact"}})
            .as_object()
            .cloned()
            .unwrap(),
    );
    harness.admin.update_rule("mask_pii", &patch).await.unwrap();
    // Only mask_pii entries are gone.
    assert_eq!(harness.cache.stats().await.entries, 1);

    let out = harness.engine.apply_rules(input).await.unwrap().unwrap();
    assert_eq!(out["email"], json!("********"));
}

#[tokio::test]
async fn delete_purges_cached_results() {
    let harness = Harness::with_rules(vec![mask_pii()]).await;
    harness
        .engine
        .apply_rules(record(json!({"email": "a@b.com"})))
        .await
        .unwrap();

    harness.admin.delete_rule("mask_pii").await.unwrap();
    assert_eq!(harness.cache.stats().await.entries, 0);
    assert!(harness.engine.active_rules().is_empty());
}

#[tokio::test]
async fn reload_without_changes_keeps_entries() {
    let harness = Harness::with_rules(vec![mask_pii(), field_mapping()]).await;

    let mut patches = BTreeMap::new();
    patches.insert("field_mapping".to_string(), RulePatch::order(9));
    harness.admin.batch_update(patches).await.unwrap();

    harness
        .engine
        .apply_rules(record(json!({"email": "a@b.com"})))
        .await
        .unwrap();

    let summary = harness.engine.reload().await.unwrap();
    assert_eq!(summary.invalidated, 0);
    assert_eq!(harness.cache.stats().await.entries, 2);
}

#[tokio::test]
async fn recreated_rule_does_not_serve_old_results() {
    let harness = Harness::new();
    let first = field_mapping().with_param("mappings", json!({"a": "b"}));
    harness.store.save(&first).unwrap();
    harness.engine.reload().await.unwrap();
    let out = harness.engine.apply_rules(record(json!({"a": 1}))).await.unwrap();
    assert_eq!(out, Some(record(json!({"b": 1}))));

    // Store-level delete and recreate, picked up by a single reload.
    harness.store.delete("field_mapping").unwrap();
    let second = field_mapping().with_param("mappings", json!({"a": "z"}));
    let saved = harness.store.save(&second).unwrap();
    assert!(saved.revision > 1);
    harness.engine.reload().await.unwrap();

    let out = harness.engine.apply_rules(record(json!({"a": 1}))).await.unwrap();
    assert_eq!(out, Some(record(json!({"z": 1}))));
}

#[tokio::test]
async fn lenient_conversion_errors_count_on_cache_hits() {
    let harness = Harness::with_rules(vec![type_conversion(false)]).await;

    for _ in 0..3 {
        let out = harness
            .engine
            .apply_rules(record(json!({"amount": "invalid"})))
            .await
            .unwrap();
        assert_eq!(out, Some(record(json!({"amount": "invalid"}))));
    }

    let stats = harness.engine.rule_stats();
    assert_eq!(stats["type_conversion"].processed, 3);
    assert_eq!(stats["type_conversion"].errors, 3);
    assert_eq!(harness.cache.stats().await.hits, 2);
}
