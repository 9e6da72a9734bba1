//! PostgreSQL-backed ledger over the `job_runs` table.
//!
//! Timestamps come from the injected clock rather than `NOW()` so the
//! reaper's cutoff and the row timestamps share one time source.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use sentinel_core::{JobMetrics, JobRun, JobStatus, RunId, SharedClock};

use crate::error::LedgerError;
use crate::ledger::JobRunLedger;

const RUN_COLUMNS: &str =
    "id, job_name, status, started_at, completed_at, metrics, error_message";

/// Row from the `job_runs` table.
#[derive(Debug, sqlx::FromRow)]
struct JobRunRow {
    id: Uuid,
    job_name: String,
    status: String,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    metrics: serde_json::Value,
    error_message: Option<String>,
}

impl TryFrom<JobRunRow> for JobRun {
    type Error = LedgerError;

    fn try_from(row: JobRunRow) -> Result<Self, Self::Error> {
        let status: JobStatus = row.status.parse().map_err(|e| LedgerError::Corrupt {
            id: row.id,
            reason: format!("{e}"),
        })?;
        let metrics = match row.metrics {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => JobMetrics::new(),
            other => {
                return Err(LedgerError::Corrupt {
                    id: row.id,
                    reason: format!("metrics is not an object: {other}"),
                })
            }
        };
        Ok(JobRun {
            id: row.id,
            job_name: row.job_name,
            status,
            started_at: row.started_at,
            completed_at: row.completed_at,
            metrics,
            error_message: row.error_message,
        })
    }
}

fn into_runs(rows: Vec<JobRunRow>) -> Result<Vec<JobRun>, LedgerError> {
    rows.into_iter().map(JobRun::try_from).collect()
}

pub struct PgJobRunLedger {
    pool: PgPool,
    clock: SharedClock,
}

impl PgJobRunLedger {
    pub fn new(pool: PgPool, clock: SharedClock) -> Self {
        Self { pool, clock }
    }
}

#[async_trait]
impl JobRunLedger for PgJobRunLedger {
    async fn begin(&self, job_name: &str) -> Result<JobRun, LedgerError> {
        let run = JobRun::started(job_name, self.clock.now());
        let row = sqlx::query_as::<_, JobRunRow>(&format!(
            "INSERT INTO job_runs (id, job_name, status, started_at, metrics)
             VALUES ($1, $2, 'running', $3, '{{}}'::jsonb)
             RETURNING {RUN_COLUMNS}"
        ))
        .bind(run.id)
        .bind(&run.job_name)
        .bind(run.started_at)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn complete(&self, run_id: RunId, metrics: JobMetrics) -> Result<bool, LedgerError> {
        let result = sqlx::query(
            "UPDATE job_runs
             SET status = 'success', completed_at = $2, metrics = $3
             WHERE id = $1 AND status = 'running'",
        )
        .bind(run_id)
        .bind(self.clock.now())
        .bind(serde_json::Value::Object(metrics))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn fail(&self, run_id: RunId, error_message: &str) -> Result<bool, LedgerError> {
        let result = sqlx::query(
            "UPDATE job_runs
             SET status = 'failed', completed_at = $2, error_message = $3
             WHERE id = $1 AND status = 'running'",
        )
        .bind(run_id)
        .bind(self.clock.now())
        .bind(error_message)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_running_older_than(
        &self,
        job_name: Option<&str>,
        threshold: Duration,
    ) -> Result<Vec<JobRun>, LedgerError> {
        let cutoff = self.clock.now() - threshold;
        let rows = sqlx::query_as::<_, JobRunRow>(&format!(
            "SELECT {RUN_COLUMNS} FROM job_runs
             WHERE status = 'running'
               AND started_at < $1
               AND ($2::text IS NULL OR job_name = $2)
             ORDER BY started_at ASC"
        ))
        .bind(cutoff)
        .bind(job_name)
        .fetch_all(&self.pool)
        .await?;

        into_runs(rows)
    }

    async fn find_last_success(&self, job_name: &str) -> Result<Option<JobRun>, LedgerError> {
        let row = sqlx::query_as::<_, JobRunRow>(&format!(
            "SELECT {RUN_COLUMNS} FROM job_runs
             WHERE job_name = $1 AND status = 'success'
             ORDER BY completed_at DESC NULLS LAST
             LIMIT 1"
        ))
        .bind(job_name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(JobRun::try_from).transpose()
    }

    async fn recent_runs(&self, job_name: &str, limit: usize) -> Result<Vec<JobRun>, LedgerError> {
        let rows = sqlx::query_as::<_, JobRunRow>(&format!(
            "SELECT {RUN_COLUMNS} FROM job_runs
             WHERE job_name = $1
             ORDER BY started_at DESC
             LIMIT $2"
        ))
        .bind(job_name)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        into_runs(rows)
    }

    async fn get(&self, run_id: RunId) -> Result<Option<JobRun>, LedgerError> {
        let row = sqlx::query_as::<_, JobRunRow>(&format!(
            "SELECT {RUN_COLUMNS} FROM job_runs WHERE id = $1"
        ))
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(JobRun::try_from).transpose()
    }
}
