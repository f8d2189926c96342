//! Registry of compiled variant tables.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::model::{Category, VariantTag};
use crate::rules::table::TableSpec;
use crate::rules::{RuleError, VariantTable};

/// Built-in tables embedded at compile time, as `(source name, YAML text)`.
const BUILTIN_TABLES: &[(&str, &str)] = &[
    ("default.yaml", include_str!("../../rules/default.yaml")),
    ("flutter.yaml", include_str!("../../rules/flutter.yaml")),
    ("react-native.yaml", include_str!("../../rules/react-native.yaml")),
    ("xamarin.yaml", include_str!("../../rules/xamarin.yaml")),
    ("android.yaml", include_str!("../../rules/android.yaml")),
    ("ios.yaml", include_str!("../../rules/ios.yaml")),
];

/// Variant tag to table lookup. Always holds a `default` table covering every category.
#[derive(Debug, Clone)]
pub struct RuleRegistry {
    tables: BTreeMap<String, Arc<VariantTable>>,
    aliases: BTreeMap<String, String>,
    default: Arc<VariantTable>,
}

impl RuleRegistry {
    /// Compile the embedded tables.
    pub fn builtin() -> Result<Self, RuleError> {
        let mut tables = Vec::with_capacity(BUILTIN_TABLES.len());
        for (name, text) in BUILTIN_TABLES {
            tables.push(TableSpec::from_yaml(name, text)?.compile()?);
        }
        Self::from_tables(tables)
    }

    /// Built-in tables, then every `*.yaml`, `*.yml`, or `*.json` table in `dir`
    /// (sorted by file name), each replacing any earlier table with the same tag.
    pub fn with_overrides(dir: &Path) -> Result<Self, RuleError> {
        let mut registry = Self::builtin()?;
        let mut paths = Vec::new();
        let entries = std::fs::read_dir(dir)
            .map_err(|source| RuleError::Io { path: dir.to_path_buf(), source })?;
        for entry in entries {
            let entry = entry.map_err(|source| RuleError::Io { path: dir.to_path_buf(), source })?;
            let path = entry.path();
            let ext = path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase());
            if path.is_file() && matches!(ext.as_deref(), Some("yaml" | "yml" | "json")) {
                paths.push(path);
            }
        }
        paths.sort();

        for path in paths {
            let text = std::fs::read_to_string(&path)
                .map_err(|source| RuleError::Io { path: path.clone(), source })?;
            let source_name = path.display().to_string();
            let spec = if path.extension().and_then(|e| e.to_str()) == Some("json") {
                TableSpec::from_json(&source_name, &text)?
            } else {
                TableSpec::from_yaml(&source_name, &text)?
            };
            let table = spec.compile()?;
            info!(
                tag = %table.tag,
                rule_count = table.rules.len(),
                path = %path.display(),
                "Loaded rule table override"
            );
            registry.insert(table)?;
        }
        Ok(registry)
    }

    /// Build a registry from already compiled tables. One of them must be `default`.
    pub fn from_tables(tables: Vec<VariantTable>) -> Result<Self, RuleError> {
        let mut map = BTreeMap::new();
        for table in tables {
            map.insert(table.tag.clone(), Arc::new(table));
        }
        let default = map.get(VariantTag::DEFAULT).cloned().ok_or_else(|| {
            RuleError::InvalidTable {
                tag: VariantTag::DEFAULT.to_string(),
                message: "no default table registered".into(),
            }
        })?;
        check_default(&default)?;

        let mut registry = Self { tables: map, aliases: BTreeMap::new(), default };
        registry.rebuild_aliases();
        debug!(tables = registry.tables.len(), "Rule registry ready");
        Ok(registry)
    }

    /// Add or replace a table by tag.
    pub fn insert(&mut self, table: VariantTable) -> Result<(), RuleError> {
        let table = Arc::new(table);
        if table.tag == VariantTag::DEFAULT {
            check_default(&table)?;
            self.default = Arc::clone(&table);
        }
        if self.tables.insert(table.tag.clone(), table).is_some() {
            debug!("Replaced existing rule table");
        }
        self.rebuild_aliases();
        Ok(())
    }

    /// Table for a tag; unknown tags resolve to the default table.
    pub fn resolve(&self, tag: &VariantTag) -> Arc<VariantTable> {
        let key = tag.as_str();
        if let Some(table) = self.tables.get(key) {
            return Arc::clone(table);
        }
        if let Some(table) = self.aliases.get(key).and_then(|t| self.tables.get(t)) {
            return Arc::clone(table);
        }
        if !tag.is_unknown() && key != VariantTag::DEFAULT {
            warn!(variant = %tag, "No rule table for variant; using default table");
        }
        Arc::clone(&self.default)
    }

    pub fn get(&self, tag: &str) -> Option<Arc<VariantTable>> {
        self.tables.get(tag).cloned()
    }

    pub fn default_table(&self) -> Arc<VariantTable> {
        Arc::clone(&self.default)
    }

    /// Registered tags in sorted order.
    pub fn tags(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    pub fn tables(&self) -> impl Iterator<Item = &Arc<VariantTable>> {
        self.tables.values()
    }

    fn rebuild_aliases(&mut self) {
        self.aliases = self
            .tables
            .values()
            .flat_map(|t| t.aliases.iter().map(move |a| (a.clone(), t.tag.clone())))
            .collect();
    }
}

fn check_default(table: &VariantTable) -> Result<(), RuleError> {
    let covered = table.covered_categories();
    let missing: Vec<&str> =
        Category::ALL.iter().filter(|c| !covered.contains(c)).map(|c| c.as_str()).collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(RuleError::InvalidTable {
            tag: table.tag.clone(),
            message: format!("default table has no rules for: {}", missing.join(", ")),
        })
    }
}
