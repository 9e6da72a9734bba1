//! Job wrapping: every invocation is bracketed by ledger bookkeeping.
//!
//! [`JobRunner::run`] performs, in order:
//! 1. reap this job's own stuck runs
//! 2. `begin` a new run
//! 3. execute the job body
//! 4. `complete` or `fail` the run
//! 5. the post-run audit hook, unconditionally
//!
//! Only ledger failures before the job body has produced an outcome are
//! fatal. A failed terminal write is logged; the outcome the job produced
//! still stands.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Duration;
use tracing::{error, info, warn};

use sentinel_core::{JobMetrics, RunId};

use crate::error::JobError;
use crate::ledger::SharedLedger;
use crate::reaper::StuckJobReaper;

/// A named, periodically invoked unit of work.
#[async_trait]
pub trait Job: Send + Sync {
    /// Stable ledger key for this job.
    fn name(&self) -> &str;

    /// Run the job body, returning the metrics to record on success.
    async fn execute(&self) -> Result<JobMetrics, JobError>;
}

/// Lightweight audit invoked after every job invocation.
///
/// Implementations handle their own failures; the hook cannot change the
/// outcome of the job that triggered it.
#[async_trait]
pub trait RunAudit: Send + Sync {
    async fn after_run(&self, job_name: &str);
}

/// Result of a successful job invocation.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub run_id: RunId,
    pub stuck_runs_reaped: usize,
    pub metrics: JobMetrics,
}

#[derive(Clone)]
pub struct JobRunner {
    ledger: SharedLedger,
    reaper: StuckJobReaper,
    audit: Option<Arc<dyn RunAudit>>,
}

impl JobRunner {
    pub fn new(ledger: SharedLedger, stuck_threshold: Duration) -> Self {
        let reaper = StuckJobReaper::new(ledger.clone(), stuck_threshold);
        Self {
            ledger,
            reaper,
            audit: None,
        }
    }

    /// Attach the post-run audit hook.
    pub fn with_audit(mut self, audit: Arc<dyn RunAudit>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub async fn run(&self, job: &dyn Job) -> Result<JobOutcome, JobError> {
        let result = self.run_tracked(job).await;

        if let Some(audit) = &self.audit {
            audit.after_run(job.name()).await;
        }

        result
    }

    async fn run_tracked(&self, job: &dyn Job) -> Result<JobOutcome, JobError> {
        let name = job.name();
        let reaped = self.reaper.reap(Some(name)).await?;
        let run = self.ledger.begin(name).await?;
        info!(job = %name, run_id = %run.id, "job started");

        let start = Instant::now();
        let result = job.execute().await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(metrics) => {
                match self.ledger.complete(run.id, metrics.clone()).await {
                    Ok(true) => {}
                    Ok(false) => warn!(
                        job = %name,
                        run_id = %run.id,
                        "run was no longer running at completion; outcome not recorded"
                    ),
                    Err(e) => error!(
                        job = %name,
                        run_id = %run.id,
                        error = %e,
                        "failed to record job completion"
                    ),
                }
                info!(job = %name, run_id = %run.id, duration_ms, "job completed");
                Ok(JobOutcome {
                    run_id: run.id,
                    stuck_runs_reaped: reaped.count(),
                    metrics,
                })
            }
            Err(job_err) => {
                error!(job = %name, run_id = %run.id, duration_ms, error = %job_err, "job failed");
                if let Err(e) = self.ledger.fail(run.id, &job_err.to_string()).await {
                    error!(
                        job = %name,
                        run_id = %run.id,
                        error = %e,
                        "failed to record job failure"
                    );
                }
                Err(job_err)
            }
        }
    }
}
