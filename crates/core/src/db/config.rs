use serde::{Deserialize, Serialize};

use crate::scheduler::SchedulerConfig;

/// Location of the report database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    /// Path to the database file (typically relative to the workspace root).
    pub path: String,
}

impl DbConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self::new(".gauge/reports.db")
    }
}

/// Serializable workspace configuration, stored at `.gauge/config.json`.
///
/// Every field except `name` has a default so older files keep loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Human-friendly workspace name.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Config format version.
    #[serde(default = "default_config_version")]
    pub config_version: String,
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Directory of extra rule tables, relative to the root unless absolute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_dir: Option<String>,
}

fn default_config_version() -> String {
    "0.1.0".to_string()
}

impl WorkspaceConfig {
    /// Create a new workspace configuration using the given name and db path.
    pub fn new(name: impl Into<String>, db_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            config_version: default_config_version(),
            db: DbConfig::new(db_path),
            scheduler: SchedulerConfig::default(),
            rules_dir: None,
        }
    }
}
