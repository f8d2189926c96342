//! Workspace layout/config and the report store.
//!
//! - `WorkspaceLayout` / `WorkspaceConfig` / `WorkspaceContext`: where a
//!   workspace lives on disk and how it is configured.
//! - `ReportStore`: the key-value store the scheduler writes finished reports,
//!   dedup reservations, and job snapshots to.
//! - `SqliteReportStore`: the on-disk implementation (schema v4).
//! - `MemoryReportStore`: an in-process implementation for tests and embedding.

pub mod config;
pub mod context;
pub mod layout;
pub mod memory;
pub mod report_db;
pub mod store;
pub mod util;

pub use config::*;
pub use context::*;
pub use layout::*;
pub use memory::*;
pub use report_db::*;
pub use store::*;
pub use util::*;
