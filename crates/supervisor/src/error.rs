use thiserror::Error;

use sentinel_jobs::LedgerError;

/// The audit itself could not complete.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("health check failed: {0}")]
    Ledger(#[from] LedgerError),
}

/// A remediation action reported failure.
#[derive(Debug, Error)]
pub enum RemediationError {
    #[error("{0}")]
    Failed(String),

    #[error("remediation panicked: {0}")]
    Panicked(String),
}

impl RemediationError {
    pub fn failed(err: impl std::fmt::Display) -> Self {
        RemediationError::Failed(err.to_string())
    }
}
