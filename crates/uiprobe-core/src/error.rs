//! Harness error taxonomy.

use thiserror::Error;

use crate::compare::Mismatch;

/// Result alias used across the harness.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the harness core and both backends.
///
/// The taxonomy separates "never became true" (`Timeout`) from
/// "became false" (`Mismatch`), and configuration mistakes from
/// runtime failures. Nothing here is retried automatically.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid options or missing required option, detected before any
    /// asynchronous work starts.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A named entity (option value, control path, story) does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Structural comparison failure. The primary test-failure channel.
    #[error("{0}")]
    Mismatch(Mismatch),

    /// A poll loop or navigation wait exceeded its hard ceiling.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Error originating inside the controlled page.
    #[error("Page error: {0}")]
    Page(String),

    /// Navigation sequence failure.
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// HTTP request failure.
    #[error("HTTP error: {0}")]
    Http(String),

    /// WebSocket transport failure (remote-control backend).
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Remote automation protocol error.
    #[error("Protocol error: {message} (code: {code})")]
    Protocol { code: i64, message: String },

    /// Backend-specific failure (stale handle, closed session).
    #[error("Backend error: {0}")]
    Backend(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<Mismatch> for Error {
    fn from(mismatch: Mismatch) -> Self {
        Error::Mismatch(mismatch)
    }
}

impl Error {
    /// True for errors raised by the wait engine rather than a failed check.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }
}
