//! Force-fails runs abandoned in the `running` state.
//!
//! A run is considered stuck once its `started_at` is older than the
//! liveness threshold. Reaping is a pure ledger mutation and is idempotent:
//! runs already in a terminal state are never touched again.

use chrono::Duration;
use tracing::{info, warn};

use sentinel_core::JobRun;

use crate::error::LedgerError;
use crate::ledger::SharedLedger;

/// Error message written onto every reaped run.
pub const STUCK_JOB_MESSAGE: &str = "stuck job auto-failed by reaper";

/// Runs transitioned to `failed` by one reaper pass.
#[derive(Debug, Default, Clone)]
pub struct ReapOutcome {
    pub reaped: Vec<JobRun>,
}

impl ReapOutcome {
    pub fn count(&self) -> usize {
        self.reaped.len()
    }

    /// Distinct job names among the reaped runs, in first-seen order.
    pub fn job_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for run in &self.reaped {
            if !names.contains(&run.job_name) {
                names.push(run.job_name.clone());
            }
        }
        names
    }
}

#[derive(Clone)]
pub struct StuckJobReaper {
    ledger: SharedLedger,
    threshold: Duration,
}

impl StuckJobReaper {
    pub fn new(ledger: SharedLedger, threshold: Duration) -> Self {
        Self { ledger, threshold }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Fail every `running` run older than the threshold, optionally only for
    /// one job name.
    ///
    /// A run that finishes between the scan and the update is skipped, since
    /// the ledger only fails runs that are still `running`.
    pub async fn reap(&self, job_name: Option<&str>) -> Result<ReapOutcome, LedgerError> {
        let stale = self
            .ledger
            .find_running_older_than(job_name, self.threshold)
            .await?;

        let mut outcome = ReapOutcome::default();
        for mut run in stale {
            if self.ledger.fail(run.id, STUCK_JOB_MESSAGE).await? {
                warn!(
                    job = %run.job_name,
                    run_id = %run.id,
                    started_at = %run.started_at,
                    "reaped stuck job run"
                );
                if let Some(updated) = self.ledger.get(run.id).await? {
                    run = updated;
                }
                outcome.reaped.push(run);
            }
        }

        if outcome.count() > 0 {
            info!(
                scope = job_name.unwrap_or("*"),
                count = outcome.count(),
                "stuck job reaper pass complete"
            );
        }
        Ok(outcome)
    }
}
