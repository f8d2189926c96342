use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::debug;

use crate::db::{SqliteReportStore, WorkspaceConfig, WorkspaceLayout};
use crate::rules::RuleRegistry;

/// Load the workspace config JSON from disk for a given layout.
pub fn load_workspace_config(layout: &WorkspaceLayout) -> Result<WorkspaceConfig> {
    let config_json = std::fs::read_to_string(&layout.config_path).with_context(|| {
        format!("Failed to read workspace config at {}", layout.config_path.display())
    })?;
    let config: WorkspaceConfig =
        serde_json::from_str(&config_json).context("Failed to parse workspace config JSON")?;
    Ok(config)
}

/// Resolve the DB path (respecting relative/absolute config) and open the report store.
pub fn open_report_store(
    layout: &WorkspaceLayout,
) -> Result<(WorkspaceConfig, PathBuf, SqliteReportStore)> {
    let config = load_workspace_config(layout)?;
    let db_path = layout.resolve(&config.db.path);
    let store = SqliteReportStore::open(&db_path)
        .with_context(|| format!("Failed to open report database at {}", db_path.display()))?;
    debug!(db = %db_path.display(), "opened report store");
    Ok((config, db_path, store))
}

/// Built-in rule tables plus the configured rules directory, if any.
pub fn load_rule_registry(
    layout: &WorkspaceLayout,
    config: &WorkspaceConfig,
) -> Result<RuleRegistry> {
    match &config.rules_dir {
        Some(dir) => {
            let dir = layout.resolve(dir);
            RuleRegistry::with_overrides(&dir)
                .with_context(|| format!("Failed to load rule tables from {}", dir.display()))
        }
        None => RuleRegistry::builtin().context("Failed to compile built-in rule tables"),
    }
}
