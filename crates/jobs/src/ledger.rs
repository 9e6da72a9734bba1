//! The job-run ledger contract.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;

use sentinel_core::{JobMetrics, JobRun, RunId};

use crate::error::LedgerError;

/// Durable, append-mostly record of every job execution.
///
/// Rows are created in `running` by [`begin`](JobRunLedger::begin) and move
/// to a terminal state at most once. Both terminal transitions are
/// conditional on the row still being `running`, so a run finished by its
/// own invocation can never be overwritten by the reaper or vice versa.
#[async_trait]
pub trait JobRunLedger: Send + Sync {
    /// Create and persist a new `running` run. Never refuses, even if other
    /// runs of the same job are still `running`.
    async fn begin(&self, job_name: &str) -> Result<JobRun, LedgerError>;

    /// Mark a run `success`. Returns `false` if the run does not exist or is
    /// no longer `running`.
    async fn complete(&self, run_id: RunId, metrics: JobMetrics) -> Result<bool, LedgerError>;

    /// Mark a run `failed`. Returns `false` if the run does not exist or is
    /// no longer `running`.
    async fn fail(&self, run_id: RunId, error_message: &str) -> Result<bool, LedgerError>;

    /// Runs still `running` whose `started_at` is more than `threshold` ago,
    /// optionally restricted to one job name. Oldest first.
    async fn find_running_older_than(
        &self,
        job_name: Option<&str>,
        threshold: Duration,
    ) -> Result<Vec<JobRun>, LedgerError>;

    /// The most recently completed `success` run of a job.
    async fn find_last_success(&self, job_name: &str) -> Result<Option<JobRun>, LedgerError>;

    /// The `limit` most recently started runs of a job, newest first.
    async fn recent_runs(&self, job_name: &str, limit: usize) -> Result<Vec<JobRun>, LedgerError>;

    async fn get(&self, run_id: RunId) -> Result<Option<JobRun>, LedgerError>;
}

pub type SharedLedger = Arc<dyn JobRunLedger>;
