use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Request rejected with status {status_code}: {body}")]
    NonRetryable { status_code: u16, body: String },

    #[error("Request failed after {attempts} attempts, last status {status_code}: {body}")]
    RetryExhausted {
        status_code: u16,
        body: String,
        attempts: u32,
    },

    #[error("Timed out after {elapsed:?} waiting for '{resource_id}'")]
    PollTimeout {
        resource_id: String,
        elapsed: Duration,
    },

    #[error("Failed to update rows {} to {end_index}: {cause}", start_index + 1)]
    ChunkUpdateFailed {
        start_index: usize,
        end_index: usize,
        #[source]
        cause: Box<AppError>,
    },

    #[error("Microsoft Graph API error: {0}")]
    Graph(String),

    #[error("OAuth2 authentication error: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Whether a lookup that failed with this error may succeed if reissued.
    ///
    /// Network failures, exhausted retries, throttling and server-side (5xx)
    /// rejections count as transient. Other client errors do not.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Http(_) | AppError::RetryExhausted { .. } => true,
            AppError::NonRetryable { status_code, .. } => {
                *status_code == 429 || *status_code >= 500
            }
            _ => false,
        }
    }

    /// HTTP status carried by the error, if the remote answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            AppError::NonRetryable { status_code, .. }
            | AppError::RetryExhausted { status_code, .. } => Some(*status_code),
            AppError::ChunkUpdateFailed { cause, .. } => cause.status_code(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
