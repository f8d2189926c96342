use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::model::{DedupKey, Job, JobState};

/// Progress milestones reported by the pipeline.
pub mod progress {
    pub const STARTED: u8 = 10;
    pub const FETCHED: u8 = 20;
    pub const CLASSIFIED: u8 = 30;
    pub const LOADED: u8 = 50;
    pub const EVALUATED: u8 = 90;
    pub const DONE: u8 = 100;
}

/// Live jobs of one scheduler.
///
/// Each job is mutated only by the task that owns it; pollers take read locks.
/// Every mutator returns the updated job so the caller can persist it.
#[derive(Debug, Default)]
pub(crate) struct JobBoard {
    jobs: RwLock<HashMap<Uuid, Job>>,
}

impl JobBoard {
    pub(crate) fn insert(&self, job: Job) {
        self.jobs.write().insert(job.id, job);
    }

    pub(crate) fn get(&self, id: Uuid) -> Option<Job> {
        self.jobs.read().get(&id).cloned()
    }

    pub(crate) fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub(crate) fn remove(&self, id: Uuid) -> Option<Job> {
        self.jobs.write().remove(&id)
    }

    /// Dedup key and result ref of every unfinished job.
    pub(crate) fn live_claims(&self) -> Vec<(Uuid, DedupKey, String)> {
        self.jobs
            .read()
            .values()
            .filter(|job| !job.state.is_terminal())
            .map(|job| {
                let key = DedupKey::new(job.repo_ref.clone(), job.requester_id.clone());
                (job.id, key, job.result_ref.clone())
            })
            .collect()
    }

    fn update(&self, id: Uuid, f: impl FnOnce(&mut Job)) -> Option<Job> {
        let mut jobs = self.jobs.write();
        let job = jobs.get_mut(&id)?;
        if job.state.is_terminal() {
            return None;
        }
        f(job);
        Some(job.clone())
    }

    /// Enter `active` for a new attempt. Progress never moves backwards.
    pub(crate) fn begin_attempt(&self, id: Uuid) -> Option<Job> {
        self.update(id, |job| {
            job.state = JobState::Active;
            job.attempts += 1;
            job.started_at.get_or_insert_with(Utc::now);
            job.progress = job.progress.max(progress::STARTED);
        })
    }

    pub(crate) fn advance(&self, id: Uuid, to: u8) -> Option<Job> {
        self.update(id, |job| job.progress = job.progress.max(to.min(progress::DONE)))
    }

    pub(crate) fn complete(&self, id: Uuid) -> Option<Job> {
        self.update(id, |job| {
            job.state = JobState::Completed;
            job.progress = progress::DONE;
            job.finished_at = Some(Utc::now());
            job.failure_reason = None;
        })
    }

    pub(crate) fn fail(&self, id: Uuid, reason: String) -> Option<Job> {
        self.update(id, |job| {
            job.state = JobState::Failed;
            job.finished_at = Some(Utc::now());
            job.failure_reason = Some(reason);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_monotonic_and_terminal_states_stick() {
        let board = JobBoard::default();
        let job = Job::new("https://example.com/r.git", "u1", "rpt-1");
        let id = job.id;
        board.insert(job);

        board.begin_attempt(id);
        board.advance(id, progress::LOADED);
        board.advance(id, progress::FETCHED);
        assert_eq!(board.get(id).map(|j| j.progress), Some(progress::LOADED));

        let again = board.begin_attempt(id).map(|j| (j.attempts, j.progress));
        assert_eq!(again, Some((2, progress::LOADED)));

        board.complete(id);
        assert!(board.fail(id, "late".into()).is_none());
        let done = board.get(id).map(|j| (j.state, j.progress));
        assert_eq!(done, Some((JobState::Completed, 100)));
    }

    #[test]
    fn only_unfinished_jobs_hold_claims() {
        let board = JobBoard::default();
        let running = Job::new("https://example.com/a.git", "u1", "rpt-a");
        let finished = Job::new("https://example.com/b.git", "u1", "rpt-b");
        let (running_id, finished_id) = (running.id, finished.id);
        board.insert(running);
        board.insert(finished);
        board.begin_attempt(running_id);
        board.complete(finished_id);

        let claims = board.live_claims();
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].0, running_id);
        assert_eq!(claims[0].1, DedupKey::new("https://example.com/a.git", "u1"));
        assert_eq!(claims[0].2, "rpt-a");

        assert!(board.remove(finished_id).is_some());
        assert_eq!(board.len(), 1);
    }
}
