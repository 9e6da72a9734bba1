//! In-memory ledger.
//!
//! Uses `IndexMap` to keep insertion order (oldest first) while allowing
//! O(1) lookup by run ID, the same layout the ingestion job store uses.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Duration;
use indexmap::IndexMap;

use sentinel_core::{JobMetrics, JobRun, JobStatus, RunId, SharedClock};

use crate::error::LedgerError;
use crate::ledger::JobRunLedger;

pub struct InMemoryJobRunLedger {
    runs: RwLock<IndexMap<RunId, JobRun>>,
    clock: SharedClock,
}

impl InMemoryJobRunLedger {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            runs: RwLock::new(IndexMap::new()),
            clock,
        }
    }

    /// Insert a run as-is, bypassing the state machine. Used to seed history.
    pub fn insert(&self, run: JobRun) {
        self.write().insert(run.id, run);
    }

    pub fn all(&self) -> Vec<JobRun> {
        self.read().values().cloned().collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, IndexMap<RunId, JobRun>> {
        self.runs.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, IndexMap<RunId, JobRun>> {
        self.runs.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl JobRunLedger for InMemoryJobRunLedger {
    async fn begin(&self, job_name: &str) -> Result<JobRun, LedgerError> {
        let run = JobRun::started(job_name, self.clock.now());
        self.write().insert(run.id, run.clone());
        Ok(run)
    }

    async fn complete(&self, run_id: RunId, metrics: JobMetrics) -> Result<bool, LedgerError> {
        let now = self.clock.now();
        Ok(self
            .write()
            .get_mut(&run_id)
            .map(|run| run.mark_success(metrics, now))
            .unwrap_or(false))
    }

    async fn fail(&self, run_id: RunId, error_message: &str) -> Result<bool, LedgerError> {
        let now = self.clock.now();
        Ok(self
            .write()
            .get_mut(&run_id)
            .map(|run| run.mark_failed(error_message, now))
            .unwrap_or(false))
    }

    async fn find_running_older_than(
        &self,
        job_name: Option<&str>,
        threshold: Duration,
    ) -> Result<Vec<JobRun>, LedgerError> {
        let cutoff = self.clock.now() - threshold;
        let mut runs: Vec<JobRun> = self
            .read()
            .values()
            .filter(|r| r.status == JobStatus::Running && r.started_at < cutoff)
            .filter(|r| job_name.map_or(true, |name| r.job_name == name))
            .cloned()
            .collect();
        runs.sort_by_key(|r| r.started_at);
        Ok(runs)
    }

    async fn find_last_success(&self, job_name: &str) -> Result<Option<JobRun>, LedgerError> {
        Ok(self
            .read()
            .values()
            .filter(|r| r.job_name == job_name && r.status == JobStatus::Success)
            .max_by_key(|r| r.finished_at())
            .cloned())
    }

    async fn recent_runs(&self, job_name: &str, limit: usize) -> Result<Vec<JobRun>, LedgerError> {
        let mut runs: Vec<JobRun> = self
            .read()
            .values()
            .filter(|r| r.job_name == job_name)
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs.truncate(limit);
        Ok(runs)
    }

    async fn get(&self, run_id: RunId) -> Result<Option<JobRun>, LedgerError> {
        Ok(self.read().get(&run_id).cloned())
    }
}
