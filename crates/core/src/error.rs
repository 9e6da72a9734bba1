use thiserror::Error;

#[derive(Error, Debug)]
pub enum SentinelError {
    #[error("Invalid job status: {0}")]
    InvalidStatus(String),

    #[error("Invalid indicator reading: {0}")]
    InvalidIndicator(String),
}
