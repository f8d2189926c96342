use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::model::{DedupKey, Job, StoredReport};

/// Error type for report store operations.
#[derive(Debug, Error)]
pub enum DbError {
    /// Underlying SQLite error.
    #[error("SQLite error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// The database was created with a newer schema version than we support.
    #[error(
        "Unsupported schema version {found}; supported range is {min_supported}..={max_supported}"
    )]
    UnsupportedSchemaVersion { found: i32, min_supported: i32, max_supported: i32 },

    /// A stored row could not be decoded.
    #[error("Corrupt {what} record: {message}")]
    Corrupt { what: &'static str, message: String },

    /// A store call handed to the blocking pool did not run to completion.
    #[error("Store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Corrupt { what: "report", message: err.to_string() }
    }
}

/// Convenience result type for store operations.
pub type DbResult<T> = Result<T, DbError>;

/// A job asking to own a dedup key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    /// Where the job will store its report.
    pub result_ref: String,
    pub job_id: Uuid,
    /// Reports and claims older than this are ignored.
    pub window: Duration,
    /// A claim whose heartbeat is older than this belongs to a dead job and is taken over.
    pub lease: Duration,
}

/// Outcome of [`ReportStore::reserve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reservation {
    /// The caller now owns the key.
    Acquired,
    /// A report for the key was stored inside the window.
    Reported { result_ref: String },
    /// A live job owns the key and will store its report under `result_ref`.
    InFlight { result_ref: String, job_id: Uuid },
}

impl Reservation {
    /// The ref a duplicate request should be sent to, if any.
    pub fn existing_ref(&self) -> Option<&str> {
        match self {
            Reservation::Acquired => None,
            Reservation::Reported { result_ref } | Reservation::InFlight { result_ref, .. } => {
                Some(result_ref)
            }
        }
    }
}

/// Key-value store for finished reports, dedup reservations, and job snapshots.
///
/// `reserve` must be atomic: two concurrent calls for the same key never both
/// return [`Reservation::Acquired`] while the first claim is live.
pub trait ReportStore: Send + Sync {
    fn put(&self, report: &StoredReport) -> DbResult<()>;

    fn get(&self, result_ref: &str) -> DbResult<Option<StoredReport>>;

    /// Most recent report for `key` created within `window` of now.
    fn find_recent(&self, key: &DedupKey, window: Duration) -> DbResult<Option<String>>;

    /// Check-then-create a dedup claim for `key`.
    ///
    /// A recent report wins over everything; a claim with a fresh heartbeat
    /// redirects; a claim past its lease is replaced.
    fn reserve(&self, key: &DedupKey, claim: &Claim) -> DbResult<Reservation>;

    /// Refresh the heartbeat of the claim on `key` held by `result_ref`.
    /// Returns `false` when that claim no longer exists.
    fn renew(&self, key: &DedupKey, result_ref: &str) -> DbResult<bool>;

    /// Drop the claim for `key` if it still points at `result_ref`.
    fn release(&self, key: &DedupKey, result_ref: &str) -> DbResult<()>;

    /// Reports newest first, optionally only those of one requester.
    fn list_reports(&self, requester_id: Option<&str>) -> DbResult<Vec<StoredReport>>;

    /// Remove a report and any reservation pointing at it. Returns whether it existed.
    fn delete_report(&self, result_ref: &str) -> DbResult<bool>;

    fn save_job(&self, job: &Job) -> DbResult<()>;

    fn load_job(&self, id: Uuid) -> DbResult<Option<Job>>;
}

/// Oldest timestamp still inside `window`.
pub(crate) fn window_start(window: Duration) -> DateTime<Utc> {
    Utc::now() - window
}

/// Allocate a fresh result reference.
pub fn new_result_ref() -> String {
    format!("rpt-{}", Uuid::new_v4().simple())
}
