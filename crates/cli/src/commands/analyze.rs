use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use gauge_core::db::{ReportStore, WorkspaceContext};
use gauge_core::model::{JobState, VariantTag};
use gauge_core::rules::RuleRegistry;
use gauge_core::scheduler::{JobScheduler, JobStatus, SchedulerDeps, Submission};
use gauge_core::services::{Analyzer, AnalyzerOptions, FileTreeClassifier, VariantClassifier};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::canonicalize_or_current;
use crate::commands::{print_analysis_result, print_stored_report};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Submit a repository through the job scheduler and wait for its report.
pub async fn analyze_command(
    root: &str,
    repo: &str,
    user: &str,
    timeout_secs: u64,
    json: bool,
) -> Result<()> {
    let root_path = canonicalize_or_current(root)?;
    let ctx = WorkspaceContext::from_root(&root_path)?;
    debug!(root = %root_path.display(), db = %ctx.db_path.display(), "workspace opened");
    let registry = Arc::new(ctx.rule_registry()?);
    let store: Arc<dyn ReportStore> = ctx.store.clone();
    let deps = SchedulerDeps::standard(store, registry, &ctx.config.scheduler)
        .context("Failed to set up analysis pipeline")?;

    let scheduler = JobScheduler::start(ctx.config.scheduler.clone(), deps);
    let submission = scheduler.submit(repo, user).await?;

    let job_id = match &submission {
        Submission::Redirect { result_ref, job_id: None } => {
            eprintln!("Recent analysis found; reusing report {result_ref}");
            scheduler.shutdown().await;
            return show_report(&ctx, result_ref, json);
        }
        Submission::Redirect { result_ref, job_id: Some(job_id) } => {
            eprintln!(
                "Analysis already running as job {job_id} (report {result_ref}); following it"
            );
            *job_id
        }
        Submission::Queued { job_id, result_ref } => {
            eprintln!("Queued job {job_id} (report {result_ref})");
            *job_id
        }
    };

    let status = follow_progress(&scheduler, job_id, Duration::from_secs(timeout_secs)).await;
    let job = status.job().cloned().ok_or_else(|| anyhow!("Job {job_id} disappeared"))?;
    if !job.state.is_terminal() {
        // Shutting down would wait for the job; leave it and report where it stood.
        bail!(
            "Timed out after {timeout_secs}s waiting for job {job_id} ({} at {}%); \
             check it later with `repo-gauge status {job_id}`",
            job.state,
            job.progress
        );
    }
    scheduler.shutdown().await;

    match job.state {
        JobState::Failed => {
            bail!("Analysis failed: {}", job.failure_reason.as_deref().unwrap_or("unknown error"))
        }
        _ => show_report(&ctx, &job.result_ref, json),
    }
}

/// Poll the scheduler, echoing progress changes to stderr.
async fn follow_progress(scheduler: &JobScheduler, job_id: Uuid, timeout: Duration) -> JobStatus {
    let deadline = tokio::time::Instant::now() + timeout;
    let mut last = None;
    loop {
        let status = scheduler.status(job_id);
        if let Some(job) = status.job() {
            let seen = (job.state, job.progress);
            if last != Some(seen) {
                eprintln!("[{:>3}%] {}", job.progress, job.state);
                last = Some(seen);
            }
        }
        if status.is_terminal() || tokio::time::Instant::now() >= deadline {
            return status;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

fn show_report(ctx: &WorkspaceContext, result_ref: &str, json: bool) -> Result<()> {
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

#[derive(Serialize)]
struct ScanSnapshot {
    path: String,
    detected_variant: String,
    table: String,
    files_loaded: usize,
    result: gauge_core::model::AnalysisResult,
}

/// Analyze a local directory in-process, without a workspace or scheduler.
pub fn scan_command(path: &str, variant: Option<&str>, json: bool) -> Result<()> {
    let root = canonicalize_or_current(path)?;
    if !root.is_dir() {
        bail!("Not a directory: {}", root.display());
    }

    let detected = match variant {
        Some(tag) => VariantTag::new(tag),
        None => FileTreeClassifier::default().classify(&root),
    };
    let registry = Arc::new(RuleRegistry::builtin()?);
    let analyzer = Analyzer::new(registry, AnalyzerOptions::default())?;
    debug!(root = %root.display(), variant = %detected, "scanning directory");
    let outcome = analyzer.run(&root, &detected);

    let snapshot = ScanSnapshot {
        path: root.display().to_string(),
        detected_variant: detected.to_string(),
        table: outcome.variant.to_string(),
        files_loaded: outcome.files_loaded,
        result: outcome.result,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!("Scan of {}", snapshot.path);
    println!("  Variant: {} (table: {})", snapshot.detected_variant, snapshot.table);
    println!("  Files loaded: {}", snapshot.files_loaded);
    println!();
    print_analysis_result(&snapshot.result);
    Ok(())
}

/// Look up a job persisted in the workspace database.
pub fn job_status_command(root: &str, job_id: &str, json: bool) -> Result<()> {
    let id = Uuid::parse_str(job_id.trim()).with_context(|| format!("Invalid job id: {job_id}"))?;
    let root_path = canonicalize_or_current(root)?;
    let ctx = WorkspaceContext::from_root(&root_path)?;
    let status = match ctx.store.load_job(id).context("Failed to read job")? {
        Some(job) => JobStatus::Found(job),
        None => JobStatus::NotFound,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    match status.job() {
        None => println!("Job {id}: not found"),
        Some(job) => {
            println!("Job {}", job.id);
            println!("  State: {}", job.state);
            println!("  Progress: {}%", job.progress);
            println!("  Attempts: {}", job.attempts);
            println!("  Repository: {}", job.repo_ref);
            println!("  Requester: {}", job.requester_id);
            println!("  Report: {}", job.result_ref);
            if let Some(reason) = &job.failure_reason {
                println!("  Failure: {reason}");
            }
        }
    }
    Ok(())
}
