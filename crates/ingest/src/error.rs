use thiserror::Error;

use sentinel_jobs::JobError;

/// A data source could not deliver.
///
/// The filings and analyst jobs count it and carry on with whatever other
/// sources returned. Single-source jobs fail the run through
/// [`IngestError::Provider`].
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status}: {body}")]
    Api { status: u16, body: String },

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("provider not configured: {0}")]
    NotConfigured(String),

    #[error("{provider} does not support {query} queries")]
    UnsupportedQuery {
        provider: &'static str,
        query: &'static str,
    },

    #[error("not enough data: {0}")]
    InsufficientData(String),

    #[error("all {attempted} requests failed, last error: {last}")]
    AllRequestsFailed { attempted: usize, last: String },
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("stored row is invalid: {0}")]
    Decode(String),
}

/// Job-fatal ingestion failure.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl From<IngestError> for JobError {
    fn from(err: IngestError) -> Self {
        JobError::execution(err)
    }
}
