use std::fs;

use anyhow::{Context, Result};
use gauge_core::db::{
    ReportStore, SqliteReportStore, WorkspaceConfig, WorkspaceContext, WorkspaceLayout,
};
use serde::Serialize;

use crate::commands::print_dir_status;
use crate::{canonicalize_or_current, infer_workspace_name};

#[derive(Serialize)]
pub struct WorkspaceInfoSnapshot {
    pub name: String,
    pub root: String,
    pub config_file: String,
    pub config_version: String,
    pub db_path: String,
    pub rules_dir: Option<String>,
    pub report_count: usize,
    pub scheduler: gauge_core::scheduler::SchedulerConfig,
    pub variants: Vec<String>,
}

/// Initialize a new workspace at `root`.
pub fn init_workspace_command(root: &str, name: Option<String>) -> Result<()> {
    let root_path = canonicalize_or_current(root)?;
    let layout = WorkspaceLayout::new(&root_path);

    let workspace_name = match name {
        Some(n) => n,
        None => infer_workspace_name(&root_path),
    };

    fs::create_dir_all(&layout.meta_dir)
        .with_context(|| format!("Failed to create meta dir: {}", layout.meta_dir.display()))?;

    let config = WorkspaceConfig::new(&workspace_name, layout.db_path_relative_string());
    let json = serde_json::to_string_pretty(&config)?;
    fs::write(&layout.config_path, json).with_context(|| {
        format!("Failed to write workspace config: {}", layout.config_path.display())
    })?;

    // Create the database now so later commands can rely on it.
    SqliteReportStore::open(&layout.db_path).with_context(|| {
        format!("Failed to initialize report database at {}", layout.db_path.display())
    })?;

    println!("Initialized repo-gauge workspace:");
    println!("  Name: {}", workspace_name);
    println!("  Root: {}", layout.root.display());
    println!("  Config: {}", layout.config_path.display());
    println!("  DB path (relative): {}", config.db.path);

    Ok(())
}

/// Show configuration and storage details of an existing workspace.
pub fn workspace_info_command(root: &str, json: bool) -> Result<()> {
    let root_path = canonicalize_or_current(root)?;
    let ctx = WorkspaceContext::from_root(&root_path)?;
    let registry = ctx.rule_registry()?;
    let report_count = ctx.store.list_reports(None).context("Failed to list reports")?.len();

    let snapshot = WorkspaceInfoSnapshot {
        name: ctx.config.name.clone(),
        root: ctx.layout.root.display().to_string(),
        config_file: ctx.layout.config_path.display().to_string(),
        config_version: ctx.config.config_version.clone(),
        db_path: ctx.db_path.display().to_string(),
        rules_dir: ctx.config.rules_dir.clone(),
        report_count,
        scheduler: ctx.config.scheduler.clone(),
        variants: registry.tags(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!("repo-gauge Workspace Info");
    println!("=========================");
    println!("Name: {}", snapshot.name);
    println!("Root: {}", snapshot.root);
    println!("Config file: {}", snapshot.config_file);
    println!("Config version: {}", snapshot.config_version);
    println!("DB path: {}", snapshot.db_path);
    println!("Reports: {}", snapshot.report_count);
    println!("Variants: {}", snapshot.variants.join(", "));
    println!();
    println!("Scheduler:");
    println!("  Workers: {}", snapshot.scheduler.workers);
    println!("  Max attempts: {}", snapshot.scheduler.max_attempts);
    println!("  Backoff base: {} ms", snapshot.scheduler.backoff_base_ms);
    println!("  Dedup window: {} h", snapshot.scheduler.dedup_window_hours);
    println!("  Rule concurrency: {}", snapshot.scheduler.rule_concurrency);
    println!();
    println!("Directories:");
    print_dir_status("Meta dir (.gauge)", &ctx.layout.meta_dir);
    if let Some(dir) = &ctx.config.rules_dir {
        print_dir_status("Rules dir", &ctx.layout.resolve(dir));
    }

    Ok(())
}
