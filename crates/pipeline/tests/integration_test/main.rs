//! Integration tests for transflow-pipeline.
//!
//! Every test wires a real store, version history, in-memory cache, and
//! engine over a temporary directory.

mod admin_flow;
mod batches;
mod caching;
mod defaults;
mod helpers;
mod rules;
