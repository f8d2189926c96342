use std::path::Path;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::debug;
use uuid::Uuid;

use crate::db::store::{window_start, Claim, DbError, DbResult, Reservation, ReportStore};
use crate::model::{DedupKey, Job, JobState, StoredReport, VariantTag};

/// Minimum schema version we know how to handle.
///
/// `0` means "no schema yet" (fresh DB).
const MIN_SUPPORTED_SCHEMA_VERSION: i32 = 0;

/// Latest schema version this crate knows about.
pub const CURRENT_SCHEMA_VERSION: i32 = 4;

/// SQLite-backed report store.
///
/// The connection sits behind a mutex so the store can be shared across worker
/// tasks; `reserve` additionally runs inside an `IMMEDIATE` transaction so two
/// processes sharing the file cannot both claim the same key.
#[derive(Debug)]
pub struct SqliteReportStore {
    conn: Mutex<Connection>,
}

impl SqliteReportStore {
    /// Open (or create) a store at the given path and ensure the schema exists.
    pub fn open(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        apply_migrations(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Fresh store backed by a private in-memory database.
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        apply_migrations(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Schema version currently recorded in the database.
    pub fn schema_version(&self) -> DbResult<i32> {
        current_schema_version(&self.conn.lock())
    }

    /// Number of stored reports.
    pub fn report_count(&self) -> DbResult<usize> {
        let count: i64 =
            self.conn.lock().query_row("SELECT COUNT(*) FROM reports", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl ReportStore for SqliteReportStore {
    fn put(&self, report: &StoredReport) -> DbResult<()> {
        let result_json = serde_json::to_string(&report.result)?;
        self.conn.lock().execute(
            r#"
            INSERT OR REPLACE INTO reports (
                result_ref, repo_ref, requester_id, variant, created_at, result_json, fingerprint
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                report.result_ref,
                report.repo_ref,
                report.requester_id,
                report.variant.as_str(),
                timestamp(&report.created_at),
                result_json,
                report.fingerprint
            ],
        )?;
        Ok(())
    }

    fn get(&self, result_ref: &str) -> DbResult<Option<StoredReport>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                r#"
                SELECT result_ref, repo_ref, requester_id, variant, created_at,
                       result_json, fingerprint
                FROM reports
                WHERE result_ref = ?1
                "#,
                params![result_ref],
                ReportRow::from_row,
            )
            .optional()?;
        row.map(ReportRow::into_report).transpose()
    }

    fn find_recent(&self, key: &DedupKey, window: Duration) -> DbResult<Option<String>> {
        let conn = self.conn.lock();
        recent_report(&conn, key, &timestamp(&window_start(window)))
    }

    fn reserve(&self, key: &DedupKey, claim: &Claim) -> DbResult<Reservation> {
        let now = Utc::now();
        let since = timestamp(&(now - claim.window));
        let fresh = timestamp(&(now - claim.lease));
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute("DELETE FROM reservations WHERE created_at < ?1", params![since])?;
        if let Some(result_ref) = recent_report(&tx, key, &since)? {
            tx.commit()?;
            return Ok(Reservation::Reported { result_ref });
        }

        let held: Option<(String, Option<String>, Option<String>)> = tx
            .query_row(
                r#"
                SELECT result_ref, job_id, heartbeat_at FROM reservations
                WHERE repo_ref = ?1 AND requester_id = ?2
                "#,
                params![key.repo_ref, key.requester_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        if let Some((result_ref, job_id, heartbeat_at)) = held {
            // Claims written before heartbeats existed have neither column and count as stale.
            if let (Some(job_id), Some(heartbeat_at)) = (job_id, heartbeat_at) {
                if heartbeat_at >= fresh {
                    let job_id = Uuid::parse_str(&job_id).map_err(|e| DbError::Corrupt {
                        what: "reservation",
                        message: e.to_string(),
                    })?;
                    tx.commit()?;
                    return Ok(Reservation::InFlight { result_ref, job_id });
                }
            }
            debug!(result_ref = %result_ref, "taking over abandoned claim");
        }

        let now = timestamp(&now);
        tx.execute(
            r#"
            INSERT OR REPLACE INTO reservations (
                repo_ref, requester_id, result_ref, created_at, job_id, heartbeat_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?4)
            "#,
            params![
                key.repo_ref,
                key.requester_id,
                claim.result_ref,
                now,
                claim.job_id.to_string()
            ],
        )?;
        tx.commit()?;
        debug!(
            repo_ref = %key.repo_ref,
            requester = %key.requester_id,
            result_ref = %claim.result_ref,
            "reserved dedup key"
        );
        Ok(Reservation::Acquired)
    }

    fn renew(&self, key: &DedupKey, result_ref: &str) -> DbResult<bool> {
        let updated = self.conn.lock().execute(
            r#"
            UPDATE reservations SET heartbeat_at = ?4
            WHERE repo_ref = ?1 AND requester_id = ?2 AND result_ref = ?3
            "#,
            params![key.repo_ref, key.requester_id, result_ref, timestamp(&Utc::now())],
        )?;
        Ok(updated > 0)
    }

    fn release(&self, key: &DedupKey, result_ref: &str) -> DbResult<()> {
        self.conn.lock().execute(
            r#"
            DELETE FROM reservations
            WHERE repo_ref = ?1 AND requester_id = ?2 AND result_ref = ?3
            "#,
            params![key.repo_ref, key.requester_id, result_ref],
        )?;
        Ok(())
    }

    fn list_reports(&self, requester_id: Option<&str>) -> DbResult<Vec<StoredReport>> {
        let conn = self.conn.lock();
        let mut stmt = if requester_id.is_some() {
            conn.prepare(
                r#"
                SELECT result_ref, repo_ref, requester_id, variant, created_at,
                       result_json, fingerprint
                FROM reports
                WHERE requester_id = ?1
                ORDER BY created_at DESC, result_ref
                "#,
            )?
        } else {
            conn.prepare(
                r#"
                SELECT result_ref, repo_ref, requester_id, variant, created_at,
                       result_json, fingerprint
                FROM reports
                ORDER BY created_at DESC, result_ref
                "#,
            )?
        };

        let rows = if let Some(requester) = requester_id {
            stmt.query_map(params![requester], ReportRow::from_row)?
        } else {
            stmt.query_map([], ReportRow::from_row)?
        };

        let mut out = Vec::new();
        for row in rows {
            out.push(row?.into_report()?);
        }
        Ok(out)
    }

    fn delete_report(&self, result_ref: &str) -> DbResult<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let removed = tx.execute("DELETE FROM reports WHERE result_ref = ?1", params![result_ref])?;
        tx.execute("DELETE FROM reservations WHERE result_ref = ?1", params![result_ref])?;
        tx.commit()?;
        Ok(removed > 0)
    }

    fn save_job(&self, job: &Job) -> DbResult<()> {
        self.conn.lock().execute(
            r#"
            INSERT OR REPLACE INTO jobs (
                id, repo_ref, requester_id, state, progress, attempts,
                created_at, started_at, finished_at, failure_reason, result_ref
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                job.id.to_string(),
                job.repo_ref,
                job.requester_id,
                job.state.as_str(),
                job.progress as i64,
                job.attempts as i64,
                timestamp(&job.created_at),
                job.started_at.as_ref().map(timestamp),
                job.finished_at.as_ref().map(timestamp),
                job.failure_reason,
                job.result_ref
            ],
        )?;
        Ok(())
    }

    fn load_job(&self, id: Uuid) -> DbResult<Option<Job>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                r#"
                SELECT id, repo_ref, requester_id, state, progress, attempts,
                       created_at, started_at, finished_at, failure_reason, result_ref
                FROM jobs
                WHERE id = ?1
                "#,
                params![id.to_string()],
                JobRow::from_row,
            )
            .optional()?;
        row.map(JobRow::into_job).transpose()
    }
}

fn recent_report(conn: &Connection, key: &DedupKey, since: &str) -> DbResult<Option<String>> {
    let found = conn
        .query_row(
            r#"
            SELECT result_ref FROM reports
            WHERE repo_ref = ?1 AND requester_id = ?2 AND created_at >= ?3
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            params![key.repo_ref, key.requester_id, since],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found)
}

/// Fixed-width UTC timestamps so text comparison matches time order.
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(what: &'static str, raw: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|err| DbError::Corrupt { what, message: format!("bad timestamp '{raw}': {err}") })
}

struct ReportRow {
    result_ref: String,
    repo_ref: String,
    requester_id: String,
    variant: String,
    created_at: String,
    result_json: String,
    fingerprint: Option<String>,
}

impl ReportRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            result_ref: row.get(0)?,
            repo_ref: row.get(1)?,
            requester_id: row.get(2)?,
            variant: row.get(3)?,
            created_at: row.get(4)?,
            result_json: row.get(5)?,
            fingerprint: row.get(6)?,
        })
    }

    fn into_report(self) -> DbResult<StoredReport> {
        Ok(StoredReport {
            created_at: parse_timestamp("report", &self.created_at)?,
            result: serde_json::from_str(&self.result_json)?,
            result_ref: self.result_ref,
            repo_ref: self.repo_ref,
            requester_id: self.requester_id,
            variant: VariantTag::new(self.variant),
            fingerprint: self.fingerprint,
        })
    }
}

struct JobRow {
    id: String,
    repo_ref: String,
    requester_id: String,
    state: String,
    progress: i64,
    attempts: i64,
    created_at: String,
    started_at: Option<String>,
    finished_at: Option<String>,
    failure_reason: Option<String>,
    result_ref: String,
}

impl JobRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            repo_ref: row.get(1)?,
            requester_id: row.get(2)?,
            state: row.get(3)?,
            progress: row.get(4)?,
            attempts: row.get(5)?,
            created_at: row.get(6)?,
            started_at: row.get(7)?,
            finished_at: row.get(8)?,
            failure_reason: row.get(9)?,
            result_ref: row.get(10)?,
        })
    }

    fn into_job(self) -> DbResult<Job> {
        let corrupt = |message: String| DbError::Corrupt { what: "job", message };
        Ok(Job {
            id: Uuid::parse_str(&self.id).map_err(|e| corrupt(e.to_string()))?,
            state: self.state.parse::<JobState>().map_err(corrupt)?,
            progress: self.progress.clamp(0, 100) as u8,
            attempts: self.attempts.max(0) as u32,
            created_at: parse_timestamp("job", &self.created_at)?,
            started_at: self.started_at.as_deref().map(|s| parse_timestamp("job", s)).transpose()?,
            finished_at: self
                .finished_at
                .as_deref()
                .map(|s| parse_timestamp("job", s))
                .transpose()?,
            repo_ref: self.repo_ref,
            requester_id: self.requester_id,
            failure_reason: self.failure_reason,
            result_ref: self.result_ref,
        })
    }
}

/// Apply schema migrations to bring the database to the latest version.
///
/// We use `PRAGMA user_version` as the schema version indicator.
///
/// Version map:
/// - 0: no schema
/// - 1: reports
/// - 2: dedup reservations
/// - 3: job snapshots
/// - 4: claim owners and heartbeats, report fingerprints
fn apply_migrations(conn: &Connection) -> DbResult<()> {
    let current_version = current_schema_version(conn)?;

    if current_version > CURRENT_SCHEMA_VERSION {
        return Err(DbError::UnsupportedSchemaVersion {
            found: current_version,
            min_supported: MIN_SUPPORTED_SCHEMA_VERSION,
            max_supported: CURRENT_SCHEMA_VERSION,
        });
    }

    if current_version < 1 {
        conn.execute_batch(
            r#"
            BEGIN;
            CREATE TABLE IF NOT EXISTS reports (
                result_ref   TEXT PRIMARY KEY,
                repo_ref     TEXT NOT NULL,
                requester_id TEXT NOT NULL,
                variant      TEXT NOT NULL,
                created_at   TEXT NOT NULL,
                result_json  TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS reports_by_key
                ON reports (repo_ref, requester_id, created_at);

            PRAGMA user_version = 1;
            COMMIT;
            "#,
        )?;
    }

    if current_version < 2 {
        conn.execute_batch(
            r#"
            BEGIN;
            CREATE TABLE IF NOT EXISTS reservations (
                repo_ref     TEXT NOT NULL,
                requester_id TEXT NOT NULL,
                result_ref   TEXT NOT NULL,
                created_at   TEXT NOT NULL,
                PRIMARY KEY (repo_ref, requester_id)
            );

            PRAGMA user_version = 2;
            COMMIT;
            "#,
        )?;
    }

    if current_version < 3 {
        conn.execute_batch(
            r#"
            BEGIN;
            CREATE TABLE IF NOT EXISTS jobs (
                id             TEXT PRIMARY KEY,
                repo_ref       TEXT NOT NULL,
                requester_id   TEXT NOT NULL,
                state          TEXT NOT NULL,
                progress       INTEGER NOT NULL,
                attempts       INTEGER NOT NULL,
                created_at     TEXT NOT NULL,
                started_at     TEXT,
                finished_at    TEXT,
                failure_reason TEXT,
                result_ref     TEXT NOT NULL
            );

            PRAGMA user_version = 3;
            COMMIT;
            "#,
        )?;
    }

    if current_version < 4 {
        conn.execute_batch(
            r#"
            BEGIN;
            ALTER TABLE reservations ADD COLUMN job_id TEXT;
            ALTER TABLE reservations ADD COLUMN heartbeat_at TEXT;
            ALTER TABLE reports ADD COLUMN fingerprint TEXT;

            PRAGMA user_version = 4;
            COMMIT;
            "#,
        )?;
    }

    Ok(())
}

/// Read the SQLite schema version from `PRAGMA user_version`.
fn current_schema_version(conn: &Connection) -> DbResult<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    Ok(version)
}
