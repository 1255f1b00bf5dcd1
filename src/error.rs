//! Error types for offers-dump
//!
//! Errors fall into two families:
//! - Transient failures (rate limiting, transport errors) that the client retries
//!   on its own and that only surface once retries are exhausted
//! - Fatal failures (unexpected status, malformed payload, broken output) that
//!   abort the whole export

use thiserror::Error;

/// Result type alias for offers-dump operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for offers-dump
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "pipeline.workers")
        key: Option<String>,
    },

    /// Transport-level failure talking to the remote service
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The search service answered 429 Too Many Requests
    #[error("rate limited by search service")]
    RateLimited,

    /// The authentication endpoint rejected the credentials or answered garbage
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The search service answered with a status the export cannot handle
    #[error("unexpected status {status} from search service")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
    },

    /// A response could not be interpreted (bad header, bad envelope)
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Data broke an invariant the pipeline relies on
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// A transient failure persisted past the configured retry budget
    #[error("giving up after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Number of attempts made, including the first
        attempts: u32,
        /// The last transient error observed
        source: Box<Error>,
    },

    /// A worker task panicked or was cancelled before reporting
    #[error("worker task failed: {0}")]
    Worker(String),

    /// I/O error (output stream)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a configuration error tied to a key
    pub(crate) fn config(message: impl Into<String>, key: &str) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}
