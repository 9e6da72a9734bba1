use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use sentinel_core::config::SupervisorConfig;
use sentinel_core::{Clock, Config, FixedClock, JobMetrics, JobRun, RunId};
use sentinel_jobs::{
    InMemoryJobRunLedger, Job, JobError, JobRunLedger, JobRunner, LedgerError, STUCK_JOB_MESSAGE,
};
use sentinel_notify::{Notification, Notifier, NotifyError};
use sentinel_supervisor::{
    from_fn, MonitoredJob, RemediationAction, RemediationError, RemediationTable, Supervisor,
    SupervisorError, SupervisorPolicy,
};

// ── Fixtures ────────────────────────────────────────────────────

/// Monday 2024-03-04 12:00 UTC.
fn monday_noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap()
}

/// Saturday 2024-03-09 12:00 UTC.
fn saturday_noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap()
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    fail: bool,
}

impl RecordingNotifier {
    fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    fn subjects(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.subject.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(notification.clone());
        if self.fail {
            return Err(NotifyError::Config("smtp relay down".into()));
        }
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "recording"
    }
}

fn counting_action(calls: Arc<AtomicUsize>) -> Arc<dyn RemediationAction> {
    from_fn(move || {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    })
}

/// A deployment with the analyst feed configured.
fn analyst_policy() -> SupervisorPolicy {
    SupervisorPolicy::default().monitor(MonitoredJob::analyst_data(&SupervisorConfig::default()))
}

struct Harness {
    clock: Arc<FixedClock>,
    ledger: Arc<InMemoryJobRunLedger>,
    notifier: Arc<RecordingNotifier>,
    policy: SupervisorPolicy,
}

impl Harness {
    fn at(now: DateTime<Utc>) -> Self {
        let clock = Arc::new(FixedClock::new(now));
        Self {
            ledger: Arc::new(InMemoryJobRunLedger::new(clock.clone())),
            clock,
            notifier: Arc::new(RecordingNotifier::default()),
            policy: analyst_policy(),
        }
    }

    fn with_policy(mut self, policy: SupervisorPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn supervisor(&self, remediations: RemediationTable) -> Supervisor {
        Supervisor::new(
            self.ledger.clone(),
            self.notifier.clone(),
            self.clock.clone(),
            self.policy.clone(),
        )
        .with_remediations(remediations)
    }

    fn seed(&self, job: &str, started_ago: Duration, ok: bool) {
        let started = self.clock.now() - started_ago;
        let mut run = JobRun::started(job, started);
        let finished = started + Duration::minutes(2);
        if ok {
            run.mark_success(JobMetrics::new(), finished);
        } else {
            run.mark_failed("provider timeout", finished);
        }
        self.ledger.insert(run);
    }

    /// Recent successes for both monitored jobs.
    fn seed_healthy(&self) {
        self.seed("daily-filings", Duration::hours(3), true);
        self.seed("analyst-data", Duration::hours(5), true);
    }
}

// ── Healthy cycle ───────────────────────────────────────────────

#[tokio::test]
async fn healthy_cycle_sends_nothing() {
    let h = Harness::at(monday_noon());
    h.seed_healthy();

    let report = h.supervisor(RemediationTable::new()).audit(true).await.unwrap();

    assert!(report.alerts.is_empty());
    assert!(report.actions.is_empty());
    assert!(report.jobs_triggered.is_empty());
    assert_eq!(report.stuck_jobs_fixed, 0);
    assert!(!report.flag("missing_daily_run"));
    assert!(!report.flag("missing_analyst_run"));
    assert!(!report.flag("high_failure_rate"));
    assert!(h.notifier.subjects().is_empty());
}

#[tokio::test]
async fn healthy_deployment_without_analyst_feed_sends_nothing() {
    let mut config = Config::for_profile("HEALTH_TEST");
    config.supervisor = SupervisorConfig::default();
    config.analyst.api_url = None;
    config.macro_indicators.price_url = None;

    let h = Harness::at(monday_noon()).with_policy(SupervisorPolicy::from_config(&config));
    h.seed("daily-filings", Duration::hours(3), true);

    let report = h.supervisor(RemediationTable::new()).audit(true).await.unwrap();

    assert!(report.alerts.is_empty());
    assert!(!report.flag("missing_analyst_run"));
    assert!(h.notifier.subjects().is_empty());
}

// ── Stuck runs ──────────────────────────────────────────────────

#[tokio::test]
async fn stuck_run_is_reaped_and_retried() {
    let h = Harness::at(monday_noon());
    h.seed_healthy();
    let stuck = h.ledger.begin("daily-filings").await.unwrap();
    h.clock.advance(Duration::minutes(15));

    let calls = Arc::new(AtomicUsize::new(0));
    let table = RemediationTable::new().with("daily-filings", counting_action(calls.clone()));
    let report = h.supervisor(table).audit(true).await.unwrap();

    let reaped = h.ledger.get(stuck.id).await.unwrap().unwrap();
    assert_eq!(reaped.error_message.as_deref(), Some(STUCK_JOB_MESSAGE));
    assert_eq!(report.stuck_jobs_fixed, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.jobs_triggered, vec!["daily-filings (retry)".to_string()]);
    assert_eq!(report.actions, vec!["Retried stuck job daily-filings".to_string()]);
    assert_eq!(h.notifier.subjects().len(), 1);
}

#[tokio::test]
async fn stuck_run_is_not_retried_without_remediation() {
    let h = Harness::at(monday_noon());
    h.seed_healthy();
    h.ledger.begin("daily-filings").await.unwrap();
    h.clock.advance(Duration::minutes(15));

    let calls = Arc::new(AtomicUsize::new(0));
    let table = RemediationTable::new().with("daily-filings", counting_action(calls.clone()));
    let report = h.supervisor(table).audit(false).await.unwrap();

    assert_eq!(report.stuck_jobs_fixed, 1);
    assert_eq!(report.alerts.len(), 1);
    assert!(report.actions.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn young_running_run_is_left_alone() {
    let h = Harness::at(monday_noon());
    h.seed_healthy();
    let young = h.ledger.begin("daily-filings").await.unwrap();
    h.clock.advance(Duration::minutes(5));

    let report = h.supervisor(RemediationTable::new()).audit(true).await.unwrap();

    assert_eq!(report.stuck_jobs_fixed, 0);
    assert!(h.ledger.get(young.id).await.unwrap().unwrap().is_running());
}

// ── Missing runs ────────────────────────────────────────────────

#[tokio::test]
async fn missing_run_is_flagged_and_triggered() {
    let h = Harness::at(monday_noon());
    h.seed("daily-filings", Duration::hours(40), true);
    h.seed("analyst-data", Duration::hours(5), true);

    let calls = Arc::new(AtomicUsize::new(0));
    let table = RemediationTable::new().with("daily-filings", counting_action(calls.clone()));
    let report = h.supervisor(table).audit(true).await.unwrap();

    assert!(report.flag("missing_daily_run"));
    assert!(!report.flag("missing_analyst_run"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.jobs_triggered, vec!["daily-filings".to_string()]);
    assert_eq!(report.actions, vec!["Triggered missing daily-filings run".to_string()]);
    assert!(report.alerts[0].contains("last 30h"));
}

#[tokio::test]
async fn missing_run_without_history_is_flagged() {
    let h = Harness::at(monday_noon());
    h.seed("analyst-data", Duration::hours(5), true);

    let report = h.supervisor(RemediationTable::new()).audit(false).await.unwrap();

    assert!(report.flag("missing_daily_run"));
    assert_eq!(report.alerts, vec!["No successful daily-filings run on record".to_string()]);
    assert!(report.jobs_triggered.is_empty());
}

#[tokio::test]
async fn job_retried_as_stuck_is_not_triggered_again() {
    let h = Harness::at(monday_noon());
    h.seed("analyst-data", Duration::hours(5), true);
    h.ledger.begin("daily-filings").await.unwrap();
    h.clock.advance(Duration::minutes(15));

    let calls = Arc::new(AtomicUsize::new(0));
    let table = RemediationTable::new().with("daily-filings", counting_action(calls.clone()));
    let report = h.supervisor(table).audit(true).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(report.flag("missing_daily_run"));
    assert_eq!(report.jobs_triggered, vec!["daily-filings (retry)".to_string()]);
    assert!(report
        .actions
        .iter()
        .any(|a| a.contains("already retried this cycle")));
}

#[tokio::test]
async fn analyst_check_is_skipped_on_weekends() {
    let h = Harness::at(saturday_noon());
    h.seed("daily-filings", Duration::hours(3), true);

    let report = h.supervisor(RemediationTable::new()).audit(true).await.unwrap();

    assert!(!report.flag("missing_analyst_run"));
    assert!(report.alerts.is_empty());
    assert!(h.notifier.subjects().is_empty());
}

#[tokio::test]
async fn analyst_check_runs_on_weekdays() {
    let h = Harness::at(monday_noon());
    h.seed("daily-filings", Duration::hours(3), true);
    h.seed("analyst-data", Duration::hours(72), true);

    let report = h.supervisor(RemediationTable::new()).audit(false).await.unwrap();

    assert!(report.flag("missing_analyst_run"));
    assert!(report.alerts[0].starts_with("No successful analyst-data run in the last 48h"));
}

// ── Remediation isolation ───────────────────────────────────────

fn explode() -> Result<(), RemediationError> {
    panic!("client pool poisoned")
}

#[tokio::test]
async fn failing_remediations_do_not_stop_the_cycle() {
    let h = Harness::at(monday_noon());

    let failing = from_fn(|| async { Err(RemediationError::failed("provider unreachable")) });
    let panicking = from_fn(|| async { explode() });
    let table = RemediationTable::new()
        .with("daily-filings", failing)
        .with("analyst-data", panicking);

    let report = h.supervisor(table).audit(true).await.unwrap();

    assert!(report.flag("missing_daily_run"));
    assert!(report.flag("missing_analyst_run"));
    assert!(report.jobs_triggered.is_empty());
    assert_eq!(report.actions.len(), 2);
    assert_eq!(report.actions[0], "Failed to trigger daily-filings: provider unreachable");
    assert!(report.actions[1].starts_with("Failed to trigger analyst-data: remediation panicked"));
    assert_eq!(h.notifier.subjects().len(), 1);
}

#[tokio::test]
async fn missing_job_without_remediation_is_only_flagged() {
    let h = Harness::at(monday_noon());
    h.seed("daily-filings", Duration::hours(3), true);

    let calls = Arc::new(AtomicUsize::new(0));
    let table = RemediationTable::new().with("daily-filings", counting_action(calls.clone()));
    let report = h.supervisor(table).audit(true).await.unwrap();

    assert!(report.flag("missing_analyst_run"));
    assert!(report.actions.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

// ── Failure rate ────────────────────────────────────────────────

fn seed_window(h: &Harness, failures: usize) {
    // Newest first: the most recent run always succeeds so the missing-run
    // check stays quiet.
    for i in 0..10 {
        let ok = i == 0 || i > failures;
        h.seed("daily-filings", Duration::hours(i as i64 + 1), ok);
    }
    h.seed("analyst-data", Duration::hours(5), true);
}

#[tokio::test]
async fn high_failure_rate_alerts() {
    let h = Harness::at(monday_noon());
    seed_window(&h, 7);

    let report = h.supervisor(RemediationTable::new()).audit(false).await.unwrap();

    assert!(report.flag("high_failure_rate"));
    assert_eq!(
        report.alerts,
        vec!["High failure rate for daily-filings: 7/10 recent runs failed".to_string()]
    );
    assert_eq!(h.notifier.subjects(), vec!["[sentinel] 1 health alert".to_string()]);
}

#[tokio::test]
async fn moderate_failure_rate_is_quiet() {
    let h = Harness::at(monday_noon());
    seed_window(&h, 4);

    let report = h.supervisor(RemediationTable::new()).audit(false).await.unwrap();

    assert!(!report.flag("high_failure_rate"));
    assert!(report.alerts.is_empty());
    assert!(h.notifier.subjects().is_empty());
}

#[tokio::test]
async fn exactly_half_failed_is_not_high() {
    let h = Harness::at(monday_noon());
    seed_window(&h, 5);

    let report = h.supervisor(RemediationTable::new()).audit(false).await.unwrap();
    assert!(!report.flag("high_failure_rate"));
}

#[tokio::test]
async fn in_flight_runs_do_not_dilute_failure_rate() {
    let h = Harness::at(monday_noon());
    h.seed("analyst-data", Duration::hours(5), true);
    // Four young running rows, newer than any finished run.
    for minutes in 1..=4 {
        h.ledger
            .insert(JobRun::started("daily-filings", h.clock.now() - Duration::minutes(minutes)));
    }
    // Six finished runs: newest succeeded, then four failures, then a success.
    for i in 1..=6 {
        h.seed("daily-filings", Duration::hours(i), i == 1 || i == 6);
    }

    let report = h.supervisor(RemediationTable::new()).audit(false).await.unwrap();

    assert_eq!(report.stuck_jobs_fixed, 0);
    assert!(report.flag("high_failure_rate"));
    assert_eq!(
        report.alerts,
        vec!["High failure rate for daily-filings: 4/6 recent runs failed".to_string()]
    );
}

// ── Cycle failure ───────────────────────────────────────────────

struct UnavailableLedger;

#[async_trait]
impl JobRunLedger for UnavailableLedger {
    async fn begin(&self, _job_name: &str) -> Result<JobRun, LedgerError> {
        Err(LedgerError::Unavailable("connection refused".into()))
    }

    async fn complete(&self, _run_id: RunId, _metrics: JobMetrics) -> Result<bool, LedgerError> {
        Err(LedgerError::Unavailable("connection refused".into()))
    }

    async fn fail(&self, _run_id: RunId, _error_message: &str) -> Result<bool, LedgerError> {
        Err(LedgerError::Unavailable("connection refused".into()))
    }

    async fn find_running_older_than(
        &self,
        _job_name: Option<&str>,
        _threshold: Duration,
    ) -> Result<Vec<JobRun>, LedgerError> {
        Err(LedgerError::Unavailable("connection refused".into()))
    }

    async fn find_last_success(&self, _job_name: &str) -> Result<Option<JobRun>, LedgerError> {
        Err(LedgerError::Unavailable("connection refused".into()))
    }

    async fn recent_runs(&self, _job_name: &str, _limit: usize) -> Result<Vec<JobRun>, LedgerError> {
        Err(LedgerError::Unavailable("connection refused".into()))
    }

    async fn get(&self, _run_id: RunId) -> Result<Option<JobRun>, LedgerError> {
        Err(LedgerError::Unavailable("connection refused".into()))
    }
}

#[tokio::test]
async fn cycle_failure_sends_distinct_alert_and_propagates() {
    let notifier = Arc::new(RecordingNotifier::default());
    let supervisor = Supervisor::new(
        Arc::new(UnavailableLedger),
        notifier.clone(),
        Arc::new(FixedClock::new(monday_noon())),
        SupervisorPolicy::default(),
    );

    let err = supervisor.audit(true).await.unwrap_err();
    assert!(matches!(err, SupervisorError::Ledger(LedgerError::Unavailable(_))));
    assert_eq!(notifier.subjects(), vec!["[sentinel] Health check failed".to_string()]);
}

#[tokio::test]
async fn cycle_failure_survives_notifier_failure() {
    let notifier = Arc::new(RecordingNotifier::failing());
    let supervisor = Supervisor::new(
        Arc::new(UnavailableLedger),
        notifier.clone(),
        Arc::new(FixedClock::new(monday_noon())),
        SupervisorPolicy::default(),
    );

    let err = supervisor.audit(false).await.unwrap_err();
    assert!(err.to_string().contains("connection refused"));
    assert_eq!(notifier.subjects().len(), 1);
}

#[tokio::test]
async fn alert_delivery_failure_keeps_report() {
    let clock = Arc::new(FixedClock::new(monday_noon()));
    let ledger = Arc::new(InMemoryJobRunLedger::new(clock.clone()));
    let supervisor = Supervisor::new(
        ledger,
        Arc::new(RecordingNotifier::failing()),
        clock,
        SupervisorPolicy::default(),
    );

    let report = supervisor.audit(false).await.unwrap();
    assert_eq!(report.alerts, vec!["No successful daily-filings run on record".to_string()]);
}

// ── Post-run hook ───────────────────────────────────────────────

struct NoopJob;

#[async_trait]
impl Job for NoopJob {
    fn name(&self) -> &str {
        "daily-filings"
    }

    async fn execute(&self) -> Result<JobMetrics, JobError> {
        Ok(JobMetrics::new())
    }
}

#[tokio::test]
async fn runner_audits_after_each_job() {
    let h = Harness::at(monday_noon());
    h.seed("analyst-data", Duration::hours(5), true);
    let audit = Arc::new(h.supervisor(RemediationTable::new()));
    let runner = JobRunner::new(h.ledger.clone(), Duration::minutes(10)).with_audit(audit);

    runner.run(&NoopJob).await.unwrap();

    // The just-completed run satisfies the missing-run check, so the
    // post-run audit stays silent.
    assert!(h.notifier.subjects().is_empty());

    h.clock.advance(Duration::hours(31));
    runner.run(&NoopJob).await.unwrap();
    // analyst-data is now 36h stale, still within its 48h allowance.
    assert!(h.notifier.subjects().is_empty());
}
