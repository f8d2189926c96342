//! gauge-core
//!
//! Core library for heuristic repository quality analysis.
//!
//! This crate defines the report model, the file corpus loader, the rule engine
//! and its per-variant rule tables, the score/recommendation aggregator, the
//! report store, and the background job scheduler that ties them together.
//!
//! The goal is to keep all substantive logic here so it is fully testable and
//! reusable from multiple frontends (CLI, an HTTP layer, etc.).

pub mod corpus;
pub mod db;
pub mod model;
pub mod rules;
pub mod scheduler;
pub mod services;

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
