use serde_json::json;

use transflow_rules::RulePatch;

use crate::helpers::{mask_pii, record, schema_validation, Harness};

#[tokio::test]
async fn rollback_restores_snapshot_without_new_version() {
    let harness = Harness::with_rules(vec![schema_validation(json!(["event_type"]))]).await;
    let admin = &harness.admin;

    admin.save_version("schema_validation", "v1").unwrap();
    for fields in [json!(["event_type", "timestamp"]), json!(["event_type", "source"])] {
        let patch = RulePatch::config(json!({ "required_fields": fields }).as_object().cloned().unwrap());
        admin.update_rule("schema_validation", &patch).await.unwrap();
        admin.save_version("schema_validation", "").unwrap();
    }

    let v2 = admin.get_version("schema_validation", 2).unwrap();
    assert_eq!(
        harness
            .versions
            .rollback_to_version("schema_validation", 2)
            .unwrap(),
        v2.config
    );

    let restored = admin.rollback("schema_validation", 2).await.unwrap();
    assert_eq!(restored.config, v2.config.config);
    assert_eq!(admin.list_versions("schema_validation").unwrap().len(), 3);

    // The restored requirement is live.
    let out = harness
        .engine
        .apply_rules(record(json!({"event_type": "x", "source": "s"})))
        .await
        .unwrap();
    assert!(out.is_none());
}

#[tokio::test]
async fn rollback_to_unknown_version_is_not_found() {
    let harness = Harness::with_rules(vec![mask_pii()]).await;
    let err = harness.admin.rollback("mask_pii", 4).await.unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn disabling_keeps_config_and_history() {
    let harness = Harness::with_rules(vec![mask_pii()]).await;
    harness.admin.save_version("mask_pii", "before disable").unwrap();

    let toggled = harness.admin.toggle_rule("mask_pii").await.unwrap();
    assert!(!toggled.enabled);
    assert!(harness.engine.active_rules().is_empty());
    assert!(harness.store.contains("mask_pii"));
    assert_eq!(harness.admin.list_versions("mask_pii").unwrap().len(), 1);

    let input = record(json!({"email": "a@b.com"}));
    let out = harness.engine.apply_rules(input.clone()).await.unwrap();
    assert_eq!(out, Some(input));

    assert!(harness.admin.toggle_rule("mask_pii").await.unwrap().enabled);
    assert_eq!(harness.engine.active_rules().len(), 1);
}

#[tokio::test]
async fn delete_keeps_version_history_and_numbering() {
    let harness = Harness::with_rules(vec![mask_pii()]).await;
    harness.admin.save_version("mask_pii", "").unwrap();
    harness.admin.save_version("mask_pii", "").unwrap();

    harness.admin.delete_rule("mask_pii").await.unwrap();
    assert_eq!(harness.versions.list_versions("mask_pii").unwrap().len(), 2);

    harness.admin.create_rule(mask_pii()).await.unwrap();
    let next = harness.admin.save_version("mask_pii", "recreated").unwrap();
    assert_eq!(next.version, 3);
}

#[tokio::test]
async fn cleanup_keeps_newest_versions() {
    let harness = Harness::with_rules(vec![mask_pii()]).await;
    for _ in 0..5 {
        harness.admin.save_version("mask_pii", "").unwrap();
    }

    assert_eq!(harness.admin.cleanup_versions("mask_pii", 2).unwrap(), 3);
    let remaining: Vec<u64> = harness
        .admin
        .list_versions("mask_pii")
        .unwrap()
        .iter()
        .map(|v| v.version)
        .collect();
    assert_eq!(remaining, vec![4, 5]);
}
