//! Background analysis jobs.
//!
//! [`JobScheduler`] accepts `(repo_ref, requester_id)` requests, deduplicates
//! them against the report store, and runs the fetch/classify/analyze pipeline
//! on a bounded pool of tokio tasks with retry and exponential backoff.
//! Callers poll [`JobScheduler::status`]; they only ever see a [`JobStatus`],
//! never a raw error.

mod job;
mod pipeline;
mod retry;

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::corpus::{LoadOptions, DEFAULT_MAX_FILE_BYTES};
use crate::db::{new_result_ref, Claim, DbError, DbResult, ReportStore, Reservation};
use crate::model::{DedupKey, Job};
use crate::rules::RuleRegistry;
use crate::services::{
    AnalysisError, Analyzer, AnalyzerOptions, FileTreeClassifier, RepoRef, RoutingFetcher,
    SourceFetcher, VariantClassifier,
};

pub use job::progress;
pub use pipeline::PipelineError;
pub use retry::RetryPolicy;

/// Scheduler tuning, stored under `scheduler` in the workspace config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Jobs running at once.
    pub workers: usize,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub dedup_window_hours: u64,
    /// Rules evaluated at once within a job.
    pub rule_concurrency: usize,
    pub max_file_bytes: u64,
    pub fetch_timeout_secs: Option<u64>,
    pub queue_capacity: usize,
    /// How long a dedup claim survives without a heartbeat from its job.
    pub lease_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            max_attempts: 3,
            backoff_base_ms: 5000,
            dedup_window_hours: 24,
            rule_concurrency: 4,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            fetch_timeout_secs: Some(300),
            queue_capacity: 256,
            lease_secs: 60,
        }
    }
}

impl SchedulerConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.backoff_base_ms),
        }
    }

    /// Dedup window, capped at roughly a century.
    pub fn dedup_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.dedup_window_hours.min(876_000) as i64)
    }

    pub fn claim_lease(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.lease_secs.clamp(1, 86_400) as i64)
    }

    /// Claims are renewed three times per lease.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.lease_secs.clamp(1, 86_400)) / 3
    }

    pub fn analyzer_options(&self) -> AnalyzerOptions {
        AnalyzerOptions {
            rule_concurrency: self.rule_concurrency.max(1),
            load: LoadOptions { max_file_bytes: self.max_file_bytes, ..LoadOptions::default() },
        }
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_secs.map(Duration::from_secs)
    }
}

/// Collaborators injected into a scheduler.
#[derive(Clone)]
pub struct SchedulerDeps {
    pub store: Arc<dyn ReportStore>,
    pub fetcher: Arc<dyn SourceFetcher>,
    pub classifier: Arc<dyn VariantClassifier>,
    pub analyzer: Arc<Analyzer>,
}

impl SchedulerDeps {
    /// Git/local fetching, marker-file classification, and an analyzer over `registry`.
    pub fn standard(
        store: Arc<dyn ReportStore>,
        registry: Arc<RuleRegistry>,
        config: &SchedulerConfig,
    ) -> Result<Self, AnalysisError> {
        Ok(Self {
            store,
            fetcher: Arc::new(RoutingFetcher::standard(config.fetch_timeout())),
            classifier: Arc::new(FileTreeClassifier::default()),
            analyzer: Arc::new(Analyzer::new(registry, config.analyzer_options())?),
        })
    }
}

/// Result of a successful [`JobScheduler::submit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Submission {
    /// A new job was created; its report will be stored under `result_ref`.
    Queued { job_id: Uuid, result_ref: String },
    /// The same repository and requester were analyzed (or are being analyzed)
    /// within the dedup window. `job_id` names the job still producing the
    /// report, if there is one.
    Redirect {
        result_ref: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        job_id: Option<Uuid>,
    },
}

impl Submission {
    pub fn result_ref(&self) -> &str {
        match self {
            Submission::Queued { result_ref, .. } | Submission::Redirect { result_ref, .. } => {
                result_ref
            }
        }
    }

    /// The job to follow for this submission's report.
    pub fn job_id(&self) -> Option<Uuid> {
        match self {
            Submission::Queued { job_id, .. } => Some(*job_id),
            Submission::Redirect { job_id, .. } => *job_id,
        }
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, Submission::Queued { .. })
    }
}

/// Synchronous rejection of a submit call.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("report store error: {0}")]
    Store(#[from] DbError),

    #[error("scheduler is shut down")]
    Closed,
}

/// What a poller sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "job", rename_all = "snake_case")]
pub enum JobStatus {
    NotFound,
    Found(Job),
}

impl JobStatus {
    pub fn job(&self) -> Option<&Job> {
        match self {
            JobStatus::Found(job) => Some(job),
            JobStatus::NotFound => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.job().is_some_and(|job| job.state.is_terminal())
    }
}

/// Run a store call on the blocking pool.
pub(crate) async fn store_call<T, F>(store: &Arc<dyn ReportStore>, f: F) -> DbResult<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn ReportStore) -> DbResult<T> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || f(store.as_ref())).await?
}

struct Shared {
    board: job::JobBoard,
    deps: SchedulerDeps,
    config: SchedulerConfig,
    created: AtomicUsize,
}

impl Shared {
    /// Write a snapshot through to the store. Returns whether it was saved.
    async fn persist(&self, job: Option<Job>) -> bool {
        let Some(job) = job else {
            return false;
        };
        let job_id = job.id;
        match store_call(&self.deps.store, move |store| store.save_job(&job)).await {
            Ok(()) => true,
            Err(err) => {
                warn!(job_id = %job_id, error = %err, "failed to persist job snapshot");
                false
            }
        }
    }

    /// Persist a terminal snapshot and drop the job from the live board.
    ///
    /// A job whose snapshot could not be saved stays on the board so pollers can still see it.
    async fn retire(&self, job: Option<Job>) {
        let Some(job) = job else {
            return;
        };
        let job_id = job.id;
        if self.persist(Some(job)).await {
            self.board.remove(job_id);
        }
    }

    async fn release(&self, key: DedupKey, result_ref: String, job_id: Uuid) {
        let released = store_call(&self.deps.store, move |store| store.release(&key, &result_ref));
        if let Err(err) = released.await {
            warn!(job_id = %job_id, error = %err, "failed to release reservation");
        }
    }
}

/// Explicitly constructed job scheduler. Must be started inside a tokio runtime.
///
/// Dropping the handle without [`JobScheduler::shutdown`] abandons running jobs;
/// their dedup claims lapse once the lease runs out.
pub struct JobScheduler {
    shared: Arc<Shared>,
    queue: mpsc::Sender<Uuid>,
    permits: Arc<Semaphore>,
    dispatcher: JoinHandle<()>,
    heartbeat: JoinHandle<()>,
}

impl JobScheduler {
    /// Spawn the dispatcher and return a handle.
    pub fn start(config: SchedulerConfig, deps: SchedulerDeps) -> Self {
        let workers = config.workers.max(1);
        let (queue, rx) = mpsc::channel(config.queue_capacity.max(1));
        let permits = Arc::new(Semaphore::new(workers));
        let shared = Arc::new(Shared {
            board: job::JobBoard::default(),
            deps,
            config,
            created: AtomicUsize::new(0),
        });
        let dispatcher = tokio::spawn(dispatch(Arc::clone(&shared), rx, Arc::clone(&permits)));
        let heartbeat = tokio::spawn(renew_claims(Arc::clone(&shared)));
        info!(workers, "job scheduler started");
        Self { shared, queue, permits, dispatcher, heartbeat }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    /// Validate, deduplicate, and enqueue an analysis request.
    pub async fn submit(
        &self,
        repo_ref: &str,
        requester_id: &str,
    ) -> Result<Submission, SubmitError> {
        let repo_ref = repo_ref.trim();
        let requester_id = requester_id.trim();
        if repo_ref.is_empty() {
            return Err(SubmitError::InvalidRequest("repository reference is empty".into()));
        }
        if requester_id.is_empty() {
            return Err(SubmitError::InvalidRequest("requester id is empty".into()));
        }
        RepoRef::parse(repo_ref).map_err(SubmitError::InvalidRequest)?;

        let key = DedupKey::new(repo_ref, requester_id);
        let job = Job::new(repo_ref, requester_id, new_result_ref());
        let job_id = job.id;
        let result_ref = job.result_ref.clone();
        let claim = Claim {
            result_ref: result_ref.clone(),
            job_id,
            window: self.shared.config.dedup_window(),
            lease: self.shared.config.claim_lease(),
        };
        let reservation = {
            let key = key.clone();
            store_call(&self.shared.deps.store, move |store| store.reserve(&key, &claim)).await?
        };
        match reservation {
            Reservation::Acquired => {}
            Reservation::Reported { result_ref } => {
                info!(
                    repo_ref,
                    requester = requester_id,
                    result_ref = %result_ref,
                    "duplicate request redirected to stored report"
                );
                return Ok(Submission::Redirect { result_ref, job_id: None });
            }
            Reservation::InFlight { result_ref, job_id } => {
                info!(
                    repo_ref,
                    requester = requester_id,
                    result_ref = %result_ref,
                    job_id = %job_id,
                    "duplicate request redirected to running job"
                );
                return Ok(Submission::Redirect { result_ref, job_id: Some(job_id) });
            }
        }

        self.shared.board.insert(job.clone());
        self.shared.created.fetch_add(1, Ordering::Relaxed);
        self.shared.persist(Some(job)).await;

        if self.queue.send(job_id).await.is_err() {
            let failed = self.shared.board.fail(job_id, "scheduler is shut down".into());
            self.shared.retire(failed).await;
            self.shared.release(key, result_ref, job_id).await;
            return Err(SubmitError::Closed);
        }
        info!(job_id = %job_id, repo_ref, requester = requester_id, "job queued");
        Ok(Submission::Queued { job_id, result_ref })
    }

    /// Current view of a job: the live board first, then persisted snapshots.
    pub fn status(&self, job_id: Uuid) -> JobStatus {
        if let Some(job) = self.shared.board.get(job_id) {
            return JobStatus::Found(job);
        }
        match self.shared.deps.store.load_job(job_id) {
            Ok(Some(job)) => JobStatus::Found(job),
            Ok(None) => JobStatus::NotFound,
            Err(err) => {
                warn!(job_id = %job_id, error = %err, "failed to load job snapshot");
                JobStatus::NotFound
            }
        }
    }

    /// Poll until the job is terminal or `timeout` elapses; returns the last status seen.
    pub async fn wait_for(
        &self,
        job_id: Uuid,
        poll_interval: Duration,
        timeout: Duration,
    ) -> JobStatus {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let status = self.status(job_id);
            if status.is_terminal() || matches!(status, JobStatus::NotFound) {
                return status;
            }
            if tokio::time::Instant::now() >= deadline {
                return status;
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Jobs created by this scheduler instance.
    pub fn job_count(&self) -> usize {
        self.shared.created.load(Ordering::Relaxed)
    }

    /// Jobs not yet finished (queued or running).
    pub fn live_job_count(&self) -> usize {
        self.shared.board.len()
    }

    /// Stop accepting work and wait for queued and running jobs to finish.
    pub async fn shutdown(self) {
        let Self { shared, queue, permits, dispatcher, heartbeat } = self;
        drop(queue);
        if let Err(err) = dispatcher.await {
            error!(error = %err, "job dispatcher panicked");
        }
        let workers = shared.config.workers.max(1) as u32;
        if permits.acquire_many(workers).await.is_err() {
            warn!("worker semaphore closed during shutdown");
        }
        heartbeat.abort();
        info!("job scheduler stopped");
    }
}

async fn dispatch(shared: Arc<Shared>, mut rx: mpsc::Receiver<Uuid>, permits: Arc<Semaphore>) {
    while let Some(job_id) = rx.recv().await {
        let permit = match Arc::clone(&permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        let shared = Arc::clone(&shared);
        tokio::spawn(async move {
            run_job(&shared, job_id).await;
            drop(permit);
        });
    }
    debug!("job queue closed");
}

/// Keep the dedup claims of every unfinished job alive.
async fn renew_claims(shared: Arc<Shared>) {
    let mut ticks = tokio::time::interval(shared.config.heartbeat_interval());
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticks.tick().await;
        for (job_id, key, result_ref) in shared.board.live_claims() {
            let renewed =
                store_call(&shared.deps.store, move |store| store.renew(&key, &result_ref)).await;
            match renewed {
                Ok(true) => {}
                Ok(false) => warn!(job_id = %job_id, "dedup claim no longer held by this job"),
                Err(err) => warn!(job_id = %job_id, error = %err, "failed to renew dedup claim"),
            }
        }
    }
}

async fn run_job(shared: &Arc<Shared>, job_id: Uuid) {
    let policy = shared.config.retry_policy();
    loop {
        let Some(job) = shared.board.begin_attempt(job_id) else {
            warn!(job_id = %job_id, "job vanished before it could run");
            return;
        };
        let attempt = job.attempts;
        shared.persist(Some(job.clone())).await;
        info!(job_id = %job_id, attempt, "job attempt started");

        let report = |milestone| milestone_reached(shared, job_id, milestone);
        match pipeline::execute(&shared.deps, &job, report).await {
            Ok(_) => {
                shared.retire(shared.board.complete(job_id)).await;
                info!(job_id = %job_id, attempt, "job completed");
                return;
            }
            Err(err) if policy.should_retry(attempt, err.is_permanent()) => {
                let delay = policy.delay_after(attempt);
                warn!(
                    job_id = %job_id,
                    attempt,
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "job attempt failed; retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                error!(
                    job_id = %job_id,
                    attempt,
                    error = %err,
                    permanent = err.is_permanent(),
                    "job failed"
                );
                shared.retire(shared.board.fail(job_id, err.to_string())).await;
                let key = DedupKey::new(job.repo_ref.clone(), job.requester_id.clone());
                shared.release(key, job.result_ref.clone(), job_id).await;
                return;
            }
        }
    }
}

fn milestone_reached(
    shared: &Arc<Shared>,
    job_id: Uuid,
    milestone: u8,
) -> impl Future<Output = ()> {
    let shared = Arc::clone(shared);
    async move {
        shared.persist(shared.board.advance(job_id, milestone)).await;
    }
}
