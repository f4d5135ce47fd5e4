//! Transformation rule configuration and rule implementations.
//!
//! This crate provides:
//! - YAML-backed rule configuration store with atomic writes
//! - Append-only version history per rule, with rollback snapshots
//! - A registry mapping rule-type identifiers to rule factories
//! - The built-in rule variants and their per-rule counters

mod fs_atomic;

pub mod error;
pub mod registry;
pub mod schema;
pub mod stats;
pub mod store;
pub mod transforms;
pub mod versions;

pub use error::{Result, RuleError};
pub use registry::RuleRegistry;
pub use schema::{RuleConfig, RulePatch, RuleVersion, VersionSummary};
pub use stats::{RuleStats, RuleStatsSnapshot};
pub use store::RuleConfigStore;
pub use transforms::Transform;
pub use versions::VersionManager;
