use chrono::Duration;

use sentinel_core::config::SupervisorConfig;
use sentinel_core::{Config, ANALYST_DATA_JOB, DAILY_FILINGS_JOB, MACRO_INDICATORS_JOB};

/// Report flag raised when any monitored job exceeds the failure threshold.
pub const HIGH_FAILURE_RATE_FLAG: &str = "high_failure_rate";

/// A job the supervisor expects to succeed on a regular cadence.
#[derive(Debug, Clone)]
pub struct MonitoredJob {
    pub name: String,
    /// Report flag raised when no recent success is on record.
    pub flag: String,
    pub max_staleness: Duration,
    /// Skip the missing-run check on Saturday and Sunday.
    pub weekdays_only: bool,
}

impl MonitoredJob {
    pub fn new(name: impl Into<String>, flag: impl Into<String>, max_staleness: Duration) -> Self {
        Self {
            name: name.into(),
            flag: flag.into(),
            max_staleness,
            weekdays_only: false,
        }
    }

    pub fn weekdays_only(mut self) -> Self {
        self.weekdays_only = true;
        self
    }

    pub fn daily_filings(config: &SupervisorConfig) -> Self {
        Self::new(
            DAILY_FILINGS_JOB,
            "missing_daily_run",
            Duration::hours(i64::from(config.filings_max_age_hours)),
        )
    }

    /// Consensus figures only move on trading days.
    pub fn analyst_data(config: &SupervisorConfig) -> Self {
        Self::new(
            ANALYST_DATA_JOB,
            "missing_analyst_run",
            Duration::hours(i64::from(config.analyst_max_age_hours)),
        )
        .weekdays_only()
    }

    pub fn macro_indicators(config: &SupervisorConfig) -> Self {
        Self::new(
            MACRO_INDICATORS_JOB,
            "missing_macro_run",
            Duration::hours(i64::from(config.macro_max_age_hours)),
        )
        .weekdays_only()
    }
}

/// Thresholds and expectations for one supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorPolicy {
    pub stuck_threshold: Duration,
    pub monitored: Vec<MonitoredJob>,
    /// How many recent runs the failure-rate check inspects.
    pub failure_window: usize,
    /// Alert when the failed fraction of the window strictly exceeds this.
    pub failure_threshold: f64,
}

impl SupervisorPolicy {
    /// Thresholds from `config`, monitoring daily-filings only.
    pub fn new(config: &SupervisorConfig) -> Self {
        Self {
            stuck_threshold: Duration::minutes(i64::from(config.stuck_minutes)),
            monitored: vec![MonitoredJob::daily_filings(config)],
            failure_window: config.failure_window as usize,
            failure_threshold: config.failure_threshold,
        }
    }

    /// Policy for a deployment: daily-filings always, each optional feed
    /// only when its source is configured. An unconfigured feed never runs,
    /// so monitoring it would alert on every cycle.
    pub fn from_config(config: &Config) -> Self {
        let sup = &config.supervisor;
        let mut policy = Self::new(sup);
        if config.analyst.is_configured() {
            policy = policy.monitor(MonitoredJob::analyst_data(sup));
        }
        if config.macro_indicators.is_configured() {
            policy = policy.monitor(MonitoredJob::macro_indicators(sup));
        }
        policy
    }

    pub fn monitor(mut self, job: MonitoredJob) -> Self {
        self.monitored.push(job);
        self
    }

    /// Every flag this policy can raise, for initialising a report.
    pub fn flag_names(&self) -> impl Iterator<Item = &str> {
        self.monitored
            .iter()
            .map(|job| job.flag.as_str())
            .chain(std::iter::once(HIGH_FAILURE_RATE_FLAG))
    }
}

impl Default for SupervisorPolicy {
    fn default() -> Self {
        Self::new(&SupervisorConfig::default())
    }
}
