use std::path::Path;

use anyhow::{anyhow, Result};
use gauge_core::db::{load_rule_registry, load_workspace_config, WorkspaceLayout};
use gauge_core::model::{Category, VariantTag};
use gauge_core::rules::{RuleRegistry, VariantTable};
use serde::Serialize;

use crate::canonicalize_or_current;

#[derive(Serialize)]
pub struct RuleInfo {
    pub id: String,
    pub category: Category,
    pub weight: u32,
    pub message: String,
}

#[derive(Serialize)]
pub struct TableInfo {
    pub tag: String,
    pub name: String,
    pub aliases: Vec<String>,
    pub extensions: Vec<String>,
    pub rules: Vec<RuleInfo>,
}

impl From<&VariantTable> for TableInfo {
    fn from(table: &VariantTable) -> Self {
        Self {
            tag: table.tag.clone(),
            name: table.name.clone(),
            aliases: table.aliases.clone(),
            extensions: table.extensions.clone(),
            rules: table
                .rules
                .iter()
                .map(|r| RuleInfo {
                    id: r.id.clone(),
                    category: r.category,
                    weight: r.weight,
                    message: r.message.clone(),
                })
                .collect(),
        }
    }
}

/// Workspace tables (with overrides) when `root` is initialized, built-ins otherwise.
fn registry_for(root: &Path) -> Result<RuleRegistry> {
    let layout = WorkspaceLayout::new(root);
    if layout.config_path.is_file() {
        let config = load_workspace_config(&layout)?;
        load_rule_registry(&layout, &config)
    } else {
        Ok(RuleRegistry::builtin()?)
    }
}

/// List rule tables, or the rules of the table a variant resolves to.
pub fn rules_command(root: &str, variant: Option<&str>, json: bool) -> Result<()> {
    let root_path = canonicalize_or_current(root)?;
    let registry = registry_for(&root_path)?;

    let tables: Vec<TableInfo> = match variant {
        Some(tag) => vec![TableInfo::from(registry.resolve(&VariantTag::new(tag)).as_ref())],
        None => registry.tables().map(|t| TableInfo::from(t.as_ref())).collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&tables)?);
        return Ok(());
    }

    if variant.is_none() {
        println!("Rule tables:");
        for t in &tables {
            let aliases = if t.aliases.is_empty() {
                String::new()
            } else {
                format!(" (aliases: {})", t.aliases.join(", "))
            };
            println!("- {}: {} rule(s), {}{}", t.tag, t.rules.len(), t.name, aliases);
        }
        return Ok(());
    }

    let table = tables.first().ok_or_else(|| anyhow!("No rule table resolved"))?;
    println!("Table: {} ({})", table.tag, table.name);
    println!("Extensions: {}", table.extensions.join(", "));
    println!("Rules:");
    for r in &table.rules {
        println!("- [{}] {} (weight {}): {}", r.category, r.id, r.weight, r.message);
    }
    Ok(())
}
