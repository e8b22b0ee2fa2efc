//! Run-time failure types
//!
//! Everything here surfaces through a case's failure channel; nothing
//! is retried and no failure converts into a passing case.

use restspec_core::ExpectError;
use thiserror::Error;

/// Result type alias for case execution
pub type RunResult<T> = std::result::Result<T, RunError>;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("no '{0}' grant configured in the auth scheme")]
    UnsupportedGrant(String),

    #[error("token endpoint returned status {status}")]
    TokenStatus { status: u16 },

    #[error("token endpoint response is missing field '{0}'")]
    TokenMissing(String),

    #[error("unsupported HTTP verb: {0}")]
    InvalidVerb(String),

    #[error("expectation failed: {0}")]
    Expect(#[from] ExpectError),

    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
