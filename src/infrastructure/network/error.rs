use crate::shared::error::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Invalid replay request: {0}")]
    InvalidRequest(String),

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Server responded with {status}: {body}")]
    Status { status: u16, body: String },
}

impl From<reqwest::Error> for ReplayError {
    fn from(err: reqwest::Error) -> Self {
        ReplayError::Transport(err.to_string())
    }
}

impl From<ReplayError> for AppError {
    fn from(err: ReplayError) -> Self {
        match err {
            ReplayError::InvalidRequest(msg) => AppError::ValidationError(msg),
            other => AppError::Network(other.to_string()),
        }
    }
}
