use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use gauge_core::db::{ReportStore, WorkspaceContext};
use serde::Serialize;

use crate::canonicalize_or_current;
use crate::commands::{describe_age, print_stored_report};

#[derive(Serialize)]
pub struct ReportSummary {
    pub result_ref: String,
    pub repo_ref: String,
    pub requester_id: String,
    pub variant: String,
    pub score: u8,
    pub created_at: String,
    #[serde(skip)]
    pub age: String,
}

/// List stored reports, newest first, optionally for one requester.
pub fn list_reports_command(root: &str, user: Option<&str>, json: bool) -> Result<()> {
    let root_path = canonicalize_or_current(root)?;
    let ctx = WorkspaceContext::from_root(&root_path)?;
    let reports = ctx.store.list_reports(user).context("Failed to list reports")?;
    let now = Utc::now();
    let summaries: Vec<ReportSummary> = reports
        .iter()
        .map(|r| ReportSummary {
            result_ref: r.result_ref.clone(),
            repo_ref: r.repo_ref.clone(),
            requester_id: r.requester_id.clone(),
            variant: r.variant.to_string(),
            score: r.result.score,
            created_at: r.created_at.to_rfc3339(),
            age: describe_age(r.created_at, now),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if summaries.is_empty() {
        println!("No reports found.");
        return Ok(());
    }
    println!("Reports:");
    for s in &summaries {
        println!(
            "- {} [{}] score {:>3}  {} (requested by {}, {} ago)",
            s.result_ref, s.variant, s.score, s.repo_ref, s.requester_id, s.age
        );
    }
    Ok(())
}

pub fn show_report_command(root: &str, result_ref: &str, json: bool) -> Result<()> {
    let root_path = canonicalize_or_current(root)?;
    let ctx = WorkspaceContext::from_root(&root_path)?;
    let report = ctx
        .store
        .get(result_ref)
        .context("Failed to read report")?
        .ok_or_else(|| anyhow!("Report '{result_ref}' not found"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_stored_report(&report);
    }
    Ok(())
}

/// Delete a report and any dedup reservation pointing at it.
pub fn delete_report_command(root: &str, result_ref: &str, json: bool) -> Result<()> {
    let root_path = canonicalize_or_current(root)?;
    let ctx = WorkspaceContext::from_root(&root_path)?;
    let deleted = ctx.store.delete_report(result_ref).context("Failed to delete report")?;

    if json {
        let payload = serde_json::json!({ "result_ref": result_ref, "deleted": deleted });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }
    if deleted {
        println!("Deleted report {result_ref}");
    } else {
        println!("Report {result_ref} not found");
    }
    Ok(())
}
