//! The health-check cycle.
//!
//! [`Supervisor::audit`] runs three checks in a fixed order against the
//! job-run ledger:
//!
//! 1. stuck runs: reap every run older than the stuck threshold, and when
//!    remediating, re-run each affected job once
//! 2. missing runs: flag monitored jobs whose last success is too old
//! 3. failure rate: flag monitored jobs failing more often than allowed,
//!    counting finished runs only
//!
//! A notification goes out only when the cycle produced alerts. If the
//! cycle itself fails, a distinct "health check failed" alert is attempted
//! and the original error is returned.

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use sentinel_core::{is_weekday, JobStatus, SharedClock};
use sentinel_jobs::{RunAudit, SharedLedger, StuckJobReaper};
use sentinel_notify::{Notification, SharedNotifier, TemplateRenderer};

use crate::error::SupervisorError;
use crate::policy::{SupervisorPolicy, HIGH_FAILURE_RATE_FLAG};
use crate::remediation::{invoke, RemediationTable};
use crate::report::HealthReport;

pub struct Supervisor {
    ledger: SharedLedger,
    reaper: StuckJobReaper,
    remediations: RemediationTable,
    notifier: SharedNotifier,
    renderer: TemplateRenderer,
    clock: SharedClock,
    policy: SupervisorPolicy,
}

impl Supervisor {
    pub fn new(
        ledger: SharedLedger,
        notifier: SharedNotifier,
        clock: SharedClock,
        policy: SupervisorPolicy,
    ) -> Self {
        let reaper = StuckJobReaper::new(ledger.clone(), policy.stuck_threshold);
        Self {
            ledger,
            reaper,
            remediations: RemediationTable::new(),
            notifier,
            renderer: TemplateRenderer::new(),
            clock,
            policy,
        }
    }

    /// Install the job name → action table used when remediating.
    pub fn with_remediations(mut self, remediations: RemediationTable) -> Self {
        if remediations.is_empty() {
            warn!("no remediations registered; remediating cycles will only alert");
        } else {
            let jobs: Vec<&str> = remediations.job_names().collect();
            debug!(?jobs, "remediations registered");
        }
        self.remediations = remediations;
        self
    }

    pub fn policy(&self) -> &SupervisorPolicy {
        &self.policy
    }

    /// Run one health-check cycle.
    ///
    /// With `auto_remediate` off the cycle only observes, reaps and alerts.
    pub async fn audit(&self, auto_remediate: bool) -> Result<HealthReport, SupervisorError> {
        match self.run_checks(auto_remediate).await {
            Ok(report) => {
                if !report.alerts.is_empty() {
                    self.send_alert(&report).await;
                }
                info!(
                    alerts = report.alerts.len(),
                    stuck_jobs_fixed = report.stuck_jobs_fixed,
                    jobs_triggered = report.jobs_triggered.len(),
                    auto_remediate,
                    "health check complete"
                );
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, "health check failed");
                let notification = Notification::critical(
                    "[sentinel] Health check failed",
                    format!(
                        "The supervisor could not complete its health check at {}.\n\nError: {e}",
                        self.clock.now().to_rfc3339()
                    ),
                );
                if let Err(notify_err) = self.notifier.send(&notification).await {
                    error!(error = %notify_err, "failed to send health-check failure alert");
                }
                Err(e)
            }
        }
    }

    async fn run_checks(&self, auto_remediate: bool) -> Result<HealthReport, SupervisorError> {
        let mut report = HealthReport::new(self.clock.now(), self.policy.flag_names());

        let retried = self.check_stuck(&mut report, auto_remediate).await?;
        self.check_missing(&mut report, auto_remediate, &retried).await?;
        self.check_failure_rate(&mut report).await?;

        Ok(report)
    }

    // ── Check 1: stuck runs ─────────────────────────────────────

    async fn check_stuck(
        &self,
        report: &mut HealthReport,
        auto_remediate: bool,
    ) -> Result<HashSet<String>, SupervisorError> {
        let outcome = self.reaper.reap(None).await?;
        report.stuck_jobs_fixed = outcome.count();

        let mut retried = HashSet::new();
        if outcome.count() == 0 {
            return Ok(retried);
        }

        let names = outcome.job_names();
        report.alerts.push(format!(
            "Fixed {} stuck job run(s): {}",
            outcome.count(),
            names.join(", ")
        ));

        if !auto_remediate {
            return Ok(retried);
        }

        for name in names {
            let Some(action) = self.remediations.get(&name) else {
                debug!(job = %name, "no remediation registered for stuck job");
                continue;
            };
            match invoke(action).await {
                Ok(()) => {
                    info!(job = %name, "retried stuck job");
                    report.actions.push(format!("Retried stuck job {name}"));
                    report.jobs_triggered.push(format!("{name} (retry)"));
                }
                Err(e) => {
                    warn!(job = %name, error = %e, "stuck job retry failed");
                    report.actions.push(format!("Failed to retry {name}: {e}"));
                }
            }
            retried.insert(name);
        }

        Ok(retried)
    }

    // ── Check 2: missing expected runs ──────────────────────────

    async fn check_missing(
        &self,
        report: &mut HealthReport,
        auto_remediate: bool,
        retried: &HashSet<String>,
    ) -> Result<(), SupervisorError> {
        let now = self.clock.now();

        for job in &self.policy.monitored {
            if job.weekdays_only && !is_weekday(now.date_naive()) {
                debug!(job = %job.name, "weekend; skipping missing-run check");
                continue;
            }

            let last = self.ledger.find_last_success(&job.name).await?;
            let stale = match &last {
                None => true,
                Some(run) => now.signed_duration_since(run.finished_at()) > job.max_staleness,
            };
            if !stale {
                continue;
            }

            report.raise(&job.flag);
            report.alerts.push(match &last {
                None => format!("No successful {} run on record", job.name),
                Some(run) => format!(
                    "No successful {} run in the last {}h (last success {})",
                    job.name,
                    job.max_staleness.num_hours(),
                    run.finished_at().to_rfc3339()
                ),
            });

            if !auto_remediate {
                continue;
            }
            if retried.contains(&job.name) {
                report.actions.push(format!(
                    "Skipped triggering {}: already retried this cycle",
                    job.name
                ));
                continue;
            }
            let Some(action) = self.remediations.get(&job.name) else {
                debug!(job = %job.name, "no remediation registered for missing job");
                continue;
            };
            match invoke(action).await {
                Ok(()) => {
                    info!(job = %job.name, "triggered missing job");
                    report.actions.push(format!("Triggered missing {} run", job.name));
                    report.jobs_triggered.push(job.name.clone());
                }
                Err(e) => {
                    warn!(job = %job.name, error = %e, "missing job trigger failed");
                    report
                        .actions
                        .push(format!("Failed to trigger {}: {e}", job.name));
                }
            }
        }

        Ok(())
    }

    // ── Check 3: failure rate ───────────────────────────────────

    async fn check_failure_rate(&self, report: &mut HealthReport) -> Result<(), SupervisorError> {
        for job in &self.policy.monitored {
            // An in-flight run has no outcome yet.
            let runs: Vec<_> = self
                .ledger
                .recent_runs(&job.name, self.policy.failure_window)
                .await?
                .into_iter()
                .filter(|r| r.status.is_terminal())
                .collect();
            if runs.is_empty() {
                continue;
            }

            let failed = runs
                .iter()
                .filter(|r| r.status == JobStatus::Failed)
                .count();
            let rate = failed as f64 / runs.len() as f64;
            if rate > self.policy.failure_threshold {
                report.raise(HIGH_FAILURE_RATE_FLAG);
                report.alerts.push(format!(
                    "High failure rate for {}: {}/{} recent runs failed",
                    job.name,
                    failed,
                    runs.len()
                ));
            }
        }
        Ok(())
    }

    async fn send_alert(&self, report: &HealthReport) {
        let notification = report.to_notification(&self.renderer);
        if let Err(e) = self.notifier.send(&notification).await {
            error!(error = %e, alerts = report.alerts.len(), "failed to send health alert");
        }
    }
}

/// Post-run hook: observe-only audit after every job invocation.
#[async_trait]
impl RunAudit for Supervisor {
    async fn after_run(&self, job_name: &str) {
        match self.audit(false).await {
            Ok(report) => debug!(
                job = %job_name,
                alerts = report.alerts.len(),
                "post-run health check"
            ),
            Err(e) => warn!(job = %job_name, error = %e, "post-run health check failed"),
        }
    }
}

