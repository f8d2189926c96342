use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;

use crate::db::{
    load_rule_registry, open_report_store, SqliteReportStore, WorkspaceConfig, WorkspaceLayout,
};
use crate::rules::RuleRegistry;

/// Convenience wrapper bundling layout, config, db path, and an open store.
#[derive(Debug)]
pub struct WorkspaceContext {
    pub layout: WorkspaceLayout,
    pub config: WorkspaceConfig,
    pub db_path: PathBuf,
    pub store: Arc<SqliteReportStore>,
}

impl WorkspaceContext {
    /// Load the workspace config and open the database for a given root.
    pub fn from_root(root: impl AsRef<Path>) -> Result<Self> {
        let layout = WorkspaceLayout::new(root);
        let (config, db_path, store) = open_report_store(&layout)?;
        Ok(Self { layout, config, db_path, store: Arc::new(store) })
    }

    /// Rule registry for this workspace, honoring `rules_dir`.
    pub fn rule_registry(&self) -> Result<RuleRegistry> {
        load_rule_registry(&self.layout, &self.config)
    }
}
