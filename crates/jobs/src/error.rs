//! Ledger and job error types.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt job run {id}: {reason}")]
    Corrupt { id: Uuid, reason: String },

    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Failure of a single job invocation.
#[derive(Debug, Error)]
pub enum JobError {
    /// The ledger could not record the run. Fatal to the invocation.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// The job body itself failed.
    #[error("{0}")]
    Execution(String),
}

impl JobError {
    pub fn execution(err: impl std::fmt::Display) -> Self {
        JobError::Execution(err.to_string())
    }
}
