//! Error types for minielect

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === Election Errors ===
    #[error("non-leader elected yet")]
    NoLeaderElected,

    #[error("deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),

    #[error("session is not campaigning")]
    NotCampaigning,

    // === Backend Errors ===
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Session error: {0}")]
    Session(String),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Did a bounded backend call run out of time?
    ///
    /// For a campaign this is the normal outcome while another identity
    /// holds leadership.
    pub fn is_deadline(&self) -> bool {
        matches!(self, Error::DeadlineExceeded(_))
    }

    /// Is this a retryable error?
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::DeadlineExceeded(_)
                | Error::Unavailable(_)
                | Error::NoLeaderElected
                | Error::Io(_)
        )
    }
}

// Implement From for common error types
impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}
