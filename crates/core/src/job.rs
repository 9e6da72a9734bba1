use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SentinelError;

pub type RunId = Uuid;

/// Ledger key of the filings ingestion job.
pub const DAILY_FILINGS_JOB: &str = "daily-filings";
/// Ledger key of the analyst consensus job.
pub const ANALYST_DATA_JOB: &str = "analyst-data";
/// Ledger key of the macro indicator job.
pub const MACRO_INDICATORS_JOB: &str = "macro-indicators";
/// Ledger key of the tracked-company refresh.
pub const COMPANY_UNIVERSE_JOB: &str = "company-universe";

/// Free-form per-run counters, interpreted only by the job that wrote them.
pub type JobMetrics = serde_json::Map<String, serde_json::Value>;

/// Lifecycle state of a [`JobRun`].
///
/// `Running` is the only non-terminal state. A run leaves it exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Success,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = SentinelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(JobStatus::Running),
            "success" => Ok(JobStatus::Success),
            "failed" => Ok(JobStatus::Failed),
            other => Err(SentinelError::InvalidStatus(other.to_string())),
        }
    }
}

/// One execution attempt of a named job.
///
/// Invariants: `completed_at` is `None` iff `status == Running`;
/// `error_message` is `Some` iff `status == Failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRun {
    pub id: RunId,
    pub job_name: String,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metrics: JobMetrics,
    pub error_message: Option<String>,
}

impl JobRun {
    /// A fresh run in the `running` state.
    pub fn started(job_name: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_name: job_name.into(),
            status: JobStatus::Running,
            started_at,
            completed_at: None,
            metrics: JobMetrics::new(),
            error_message: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == JobStatus::Running
    }

    /// When the run reached its terminal state, or when it started if still running.
    pub fn finished_at(&self) -> DateTime<Utc> {
        self.completed_at.unwrap_or(self.started_at)
    }

    /// Transition to `success`. No-op unless the run is still running.
    pub fn mark_success(&mut self, metrics: JobMetrics, now: DateTime<Utc>) -> bool {
        if !self.is_running() {
            return false;
        }
        self.status = JobStatus::Success;
        self.completed_at = Some(now);
        self.metrics = metrics;
        true
    }

    /// Transition to `failed`. No-op unless the run is still running.
    pub fn mark_failed(&mut self, error_message: impl Into<String>, now: DateTime<Utc>) -> bool {
        if !self.is_running() {
            return false;
        }
        self.status = JobStatus::Failed;
        self.completed_at = Some(now);
        self.error_message = Some(error_message.into());
        true
    }
}
