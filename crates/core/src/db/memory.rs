use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::db::store::{window_start, Claim, DbResult, Reservation, ReportStore};
use crate::model::{DedupKey, Job, StoredReport};

/// In-process report store. One mutex guards everything, which makes
/// `reserve` trivially atomic.
#[derive(Debug, Default)]
pub struct MemoryReportStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    reports: HashMap<String, StoredReport>,
    reservations: HashMap<DedupKey, HeldClaim>,
    jobs: HashMap<Uuid, Job>,
}

#[derive(Debug)]
struct HeldClaim {
    result_ref: String,
    job_id: Uuid,
    created_at: DateTime<Utc>,
    heartbeat_at: DateTime<Utc>,
}

impl MemoryState {
    fn recent_report(&self, key: &DedupKey, since: DateTime<Utc>) -> Option<String> {
        self.reports
            .values()
            .filter(|r| r.repo_ref == key.repo_ref && r.requester_id == key.requester_id)
            .filter(|r| r.created_at >= since)
            .max_by_key(|r| r.created_at)
            .map(|r| r.result_ref.clone())
    }
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report_count(&self) -> usize {
        self.state.lock().reports.len()
    }

    pub fn job_count(&self) -> usize {
        self.state.lock().jobs.len()
    }
}

impl ReportStore for MemoryReportStore {
    fn put(&self, report: &StoredReport) -> DbResult<()> {
        self.state.lock().reports.insert(report.result_ref.clone(), report.clone());
        Ok(())
    }

    fn get(&self, result_ref: &str) -> DbResult<Option<StoredReport>> {
        Ok(self.state.lock().reports.get(result_ref).cloned())
    }

    fn find_recent(&self, key: &DedupKey, window: Duration) -> DbResult<Option<String>> {
        Ok(self.state.lock().recent_report(key, window_start(window)))
    }

    fn reserve(&self, key: &DedupKey, claim: &Claim) -> DbResult<Reservation> {
        let now = Utc::now();
        let since = now - claim.window;
        let mut state = self.state.lock();
        state.reservations.retain(|_, held| held.created_at >= since);

        if let Some(result_ref) = state.recent_report(key, since) {
            return Ok(Reservation::Reported { result_ref });
        }
        if let Some(held) = state.reservations.get(key) {
            if held.heartbeat_at >= now - claim.lease {
                return Ok(Reservation::InFlight {
                    result_ref: held.result_ref.clone(),
                    job_id: held.job_id,
                });
            }
            debug!(
                job_id = %held.job_id,
                result_ref = %held.result_ref,
                "taking over abandoned claim"
            );
        }
        state.reservations.insert(
            key.clone(),
            HeldClaim {
                result_ref: claim.result_ref.clone(),
                job_id: claim.job_id,
                created_at: now,
                heartbeat_at: now,
            },
        );
        Ok(Reservation::Acquired)
    }

    fn renew(&self, key: &DedupKey, result_ref: &str) -> DbResult<bool> {
        let mut state = self.state.lock();
        match state.reservations.get_mut(key) {
            Some(held) if held.result_ref == result_ref => {
                held.heartbeat_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn release(&self, key: &DedupKey, result_ref: &str) -> DbResult<()> {
        let mut state = self.state.lock();
        if state.reservations.get(key).is_some_and(|held| held.result_ref == result_ref) {
            state.reservations.remove(key);
        }
        Ok(())
    }

    fn list_reports(&self, requester_id: Option<&str>) -> DbResult<Vec<StoredReport>> {
        let state = self.state.lock();
        let mut out: Vec<StoredReport> = state
            .reports
            .values()
            .filter(|r| requester_id.map_or(true, |id| r.requester_id == id))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            b.created_at.cmp(&a.created_at).then_with(|| a.result_ref.cmp(&b.result_ref))
        });
        Ok(out)
    }

    fn delete_report(&self, result_ref: &str) -> DbResult<bool> {
        let mut state = self.state.lock();
        state.reservations.retain(|_, held| held.result_ref != result_ref);
        Ok(state.reports.remove(result_ref).is_some())
    }

    fn save_job(&self, job: &Job) -> DbResult<()> {
        self.state.lock().jobs.insert(job.id, job.clone());
        Ok(())
    }

    fn load_job(&self, id: Uuid) -> DbResult<Option<Job>> {
        Ok(self.state.lock().jobs.get(&id).cloned())
    }
}
