//! In-memory job store shared by workers and status readers.
//!
//! The whole map sits behind one `Mutex`. Every job is written only by the
//! worker that owns it, readers poll for snapshots, and snapshots are small,
//! so a single lock is enough. Callers never see a reference into the map:
//! `get` and `list` hand out clones.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use log::debug;

use crate::domain::{Job, JobId, JobStatus};

/// Tracks the lifecycle of every submitted job for the process lifetime
#[derive(Default)]
pub struct JobStore {
    jobs: Mutex<HashMap<JobId, Job>>,
}

impl std::fmt::Debug for JobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobStore").field("jobs", &self.len()).finish()
    }
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh id and insert a `Pending` job for it.
    pub fn create(&self) -> JobId {
        let mut jobs = self.lock();
        let mut id = JobId::new();
        while jobs.contains_key(&id) {
            id = JobId::new();
        }
        jobs.insert(id.clone(), Job::new(id.clone()));
        debug!("Created job {}", id);
        id
    }

    /// Replace status, result and error of a job.
    ///
    /// Unknown ids are ignored.
    pub fn update(&self, id: &JobId, status: JobStatus, result: Option<serde_json::Value>, error: Option<String>) {
        let mut jobs = self.lock();
        match jobs.get_mut(id) {
            Some(job) => {
                job.status = status;
                job.result = result;
                job.error = error;
                job.touch();
                debug!("Job {} -> {}", id, status);
            }
            None => debug!("Ignoring update for unknown job {}", id),
        }
    }

    /// Snapshot of a job, or `None` if the id is unknown.
    pub fn get(&self, id: &JobId) -> Option<Job> {
        self.lock().get(id).cloned()
    }

    /// Snapshots of all jobs, oldest first.
    pub fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.lock().values().cloned().collect();
        jobs.sort_by_key(|j| j.created_at);
        jobs
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the lock cannot leave a Job half-written (every
    // write is a plain field assignment), so the poisoned state is usable.
    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, Job>> {
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
