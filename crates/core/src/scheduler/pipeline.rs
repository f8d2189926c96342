use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info};

use crate::db::DbError;
use crate::model::{Job, StoredReport};
use crate::scheduler::job::progress;
use crate::scheduler::{store_call, SchedulerDeps};
use crate::services::aggregate::aggregate;
use crate::services::{FetchError, RepoRef};

/// A failed pipeline attempt.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid repository reference: {0}")]
    InvalidRef(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("report store error: {0}")]
    Store(#[from] DbError),

    #[error("analysis task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl PipelineError {
    /// Errors that another attempt cannot fix.
    pub fn is_permanent(&self) -> bool {
        match self {
            PipelineError::InvalidRef(_) => true,
            PipelineError::Fetch(err) => err.is_permanent(),
            PipelineError::Store(DbError::UnsupportedSchemaVersion { .. }) => true,
            PipelineError::Store(_) | PipelineError::Task(_) => false,
        }
    }
}

/// fetch, classify, load, evaluate, aggregate, persist.
///
/// `report` is called with each milestone as it is reached.
pub(crate) async fn execute<F, Fut>(
    deps: &SchedulerDeps,
    job: &Job,
    report: F,
) -> Result<StoredReport, PipelineError>
where
    F: Fn(u8) -> Fut,
    Fut: Future<Output = ()>,
{
    let repo = RepoRef::parse(&job.repo_ref).map_err(PipelineError::InvalidRef)?;
    let checkout = deps.fetcher.fetch(&repo).await?;
    report(progress::FETCHED).await;

    let root = checkout.path().to_path_buf();
    let classifier = Arc::clone(&deps.classifier);
    let variant = {
        let root = root.clone();
        tokio::task::spawn_blocking(move || classifier.classify(&root)).await?
    };
    debug!(job_id = %job.id, variant = %variant, "classified");
    report(progress::CLASSIFIED).await;

    let analyzer = Arc::clone(&deps.analyzer);
    let (analyzer, corpus, fingerprint) = {
        let tag = variant.clone();
        tokio::task::spawn_blocking(move || {
            let corpus = analyzer.load(&root, &tag);
            let fingerprint = corpus.fingerprint();
            (analyzer, corpus, fingerprint)
        })
        .await?
    };
    debug!(job_id = %job.id, files = corpus.files.len(), "corpus loaded");
    report(progress::LOADED).await;

    let findings = {
        let tag = variant.clone();
        tokio::task::spawn_blocking(move || analyzer.analyze(&corpus, &tag)).await?
    };
    report(progress::EVALUATED).await;

    let stored = StoredReport {
        result_ref: job.result_ref.clone(),
        repo_ref: job.repo_ref.clone(),
        requester_id: job.requester_id.clone(),
        variant,
        created_at: Utc::now(),
        result: aggregate(&findings),
        fingerprint: Some(fingerprint),
    };
    let record = stored.clone();
    store_call(&deps.store, move |store| store.put(&record)).await?;
    drop(checkout);

    info!(
        job_id = %job.id,
        result_ref = %stored.result_ref,
        score = stored.result.score,
        "report stored"
    );
    Ok(stored)
}
