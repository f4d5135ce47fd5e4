//! Tests for the version manager.

use std::fs;

use serde_json::json;
use tempfile::TempDir;
use transflow_core::TransformationType;

use super::*;

fn temp_manager() -> (TempDir, VersionManager) {
    let dir = TempDir::new().expect("create tempdir");
    let manager = VersionManager::new(dir.path().join("versions"));
    (dir, manager)
}

fn snapshot(order: i64) -> RuleConfig {
    RuleConfig::new("schema_validation", TransformationType::Validate, order)
        .with_param("required_fields", json!(["event_type"]))
}

#[test]
fn versions_start_at_one_and_increase() {
    let (_dir, manager) = temp_manager();
    for expected in 1..=4 {
        let v = manager
            .save_version("schema_validation", &snapshot(expected as i64), "")
            .unwrap();
        assert_eq!(v.version, expected);
    }

    let listed: Vec<u64> = manager
        .list_versions("schema_validation")
        .unwrap()
        .iter()
        .map(|v| v.version)
        .collect();
    assert_eq!(listed, vec![1, 2, 3, 4]);
}

#[test]
fn listing_is_numeric_not_lexicographic() {
    let (_dir, manager) = temp_manager();
    for i in 0..11 {
        manager.save_version("schema_validation", &snapshot(i), "").unwrap();
    }
    let listed: Vec<u64> = manager
        .list_versions("schema_validation")
        .unwrap()
        .iter()
        .map(|v| v.version)
        .collect();
    assert_eq!(listed, (1..=11).collect::<Vec<_>>());
}

#[test]
fn get_version_returns_snapshot_and_comment() {
    let (_dir, manager) = temp_manager();
    manager.save_version("schema_validation", &snapshot(1), "initial").unwrap();

    let v = manager.get_version("schema_validation", 1).unwrap();
    assert_eq!(v.comment, "initial");
    assert_eq!(v.config, snapshot(1));
}

#[test]
fn missing_version_is_reported() {
    let (_dir, manager) = temp_manager();
    let err = manager.get_version("schema_validation", 3).unwrap_err();
    assert!(matches!(
        err,
        RuleError::VersionNotFound { version: 3, .. }
    ));
    assert!(manager.list_versions("schema_validation").unwrap().is_empty());
    assert_eq!(manager.latest_version("schema_validation").unwrap(), None);
}

#[test]
fn rollback_returns_historical_snapshot_unchanged() {
    let (_dir, manager) = temp_manager();
    for order in 1..=3 {
        manager.save_version("schema_validation", &snapshot(order), "").unwrap();
    }

    let restored = manager.rollback_to_version("schema_validation", 2).unwrap();
    assert_eq!(restored, snapshot(2));
    // Rollback itself records nothing.
    assert_eq!(manager.latest_version("schema_validation").unwrap(), Some(3));
}

#[test]
fn cleanup_keeps_newest_and_numbers_are_never_reused() {
    let (_dir, manager) = temp_manager();
    for order in 1..=5 {
        manager.save_version("schema_validation", &snapshot(order), "").unwrap();
    }

    let removed = manager.cleanup_old_versions("schema_validation", 2).unwrap();
    assert_eq!(removed, 3);
    let listed: Vec<u64> = manager
        .list_versions("schema_validation")
        .unwrap()
        .iter()
        .map(|v| v.version)
        .collect();
    assert_eq!(listed, vec![4, 5]);

    let next = manager.save_version("schema_validation", &snapshot(6), "").unwrap();
    assert_eq!(next.version, 6);

    assert_eq!(manager.cleanup_old_versions("schema_validation", 10).unwrap(), 0);
}

#[test]
fn delete_wipes_history_but_keeps_numbering() {
    let (_dir, manager) = temp_manager();
    manager.save_version("schema_validation", &snapshot(1), "").unwrap();
    manager.save_version("schema_validation", &snapshot(2), "").unwrap();

    assert_eq!(manager.delete_rule_versions("schema_validation").unwrap(), 2);
    assert!(manager.list_versions("schema_validation").unwrap().is_empty());

    let v = manager.save_version("schema_validation", &snapshot(3), "").unwrap();
    assert_eq!(v.version, 3);
}

#[test]
fn histories_are_independent_per_rule() {
    let (_dir, manager) = temp_manager();
    manager.save_version("schema_validation", &snapshot(1), "").unwrap();
    manager.save_version("schema_validation", &snapshot(2), "").unwrap();
    let other = manager.save_version("field_mapping", &snapshot(1), "").unwrap();
    assert_eq!(other.version, 1);
}

#[test]
fn missing_counter_falls_back_to_highest_document() {
    let (_dir, manager) = temp_manager();
    manager.save_version("schema_validation", &snapshot(1), "").unwrap();
    manager.save_version("schema_validation", &snapshot(2), "").unwrap();
    fs::remove_file(manager.version_dir().join("schema_validation").join(".counter")).unwrap();

    let v = manager.save_version("schema_validation", &snapshot(3), "").unwrap();
    assert_eq!(v.version, 3);
}

#[test]
fn documents_use_the_documented_layout() {
    let (_dir, manager) = temp_manager();
    manager.save_version("schema_validation", &snapshot(1), "first").unwrap();

    let path = manager
        .version_dir()
        .join("schema_validation")
        .join("version_1.yaml");
    let raw: serde_yaml::Value = serde_yaml::from_str(&fs::read_to_string(path).unwrap()).unwrap();
    for key in ["version", "created_at", "comment", "config"] {
        assert!(raw.get(key).is_some(), "missing key {key}");
    }
}
