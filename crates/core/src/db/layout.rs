use std::path::{Path, PathBuf};

/// Logical layout of a gauge workspace on disk.
///
/// This is derived from a chosen root path. It does *not* perform any IO itself.
/// The CLI or other frontends are responsible for actually creating directories
/// and files based on this layout.
#[derive(Debug, Clone)]
pub struct WorkspaceLayout {
    /// Root directory of the workspace.
    pub root: PathBuf,
    /// Directory for internal metadata (.gauge).
    pub meta_dir: PathBuf,
    /// Path to the workspace config file (JSON).
    pub config_path: PathBuf,
    /// Path to the report database file.
    pub db_path: PathBuf,
    /// Conventional location for user rule tables.
    pub rules_dir: PathBuf,
}

impl WorkspaceLayout {
    /// Compute the default layout for a workspace rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let meta_dir = root.join(".gauge");
        let config_path = meta_dir.join("config.json");
        let db_path = meta_dir.join("reports.db");
        let rules_dir = meta_dir.join("rules");
        Self { root, meta_dir, config_path, db_path, rules_dir }
    }

    /// Database path relative to `root` when possible, for storing in the config.
    pub fn db_path_relative_string(&self) -> String {
        relative_string(&self.root, &self.db_path)
    }

    /// Rules directory relative to `root` when possible.
    pub fn rules_dir_relative_string(&self) -> String {
        relative_string(&self.root, &self.rules_dir)
    }

    /// Resolve a config-relative path against the workspace root.
    pub fn resolve(&self, configured: &str) -> PathBuf {
        let path = Path::new(configured);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

fn relative_string(root: &Path, path: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
        Err(_) => path.to_string_lossy().to_string(),
    }
}
