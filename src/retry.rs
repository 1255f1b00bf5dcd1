//! Retry logic with exponential backoff
//!
//! Transient failures (429 responses, dropped connections) are retried in a
//! bounded loop. Every attempt still goes through the client's rate gate, so the
//! backoff delay computed here only ever adds to the global request spacing.
//!
//! # Example
//!
//! ```no_run
//! use offers_dump::retry::{IsRetryable, with_retry};
//! use offers_dump::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{self:?}")
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! with_retry(&config, || async { Ok::<_, MyError>(()) }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (rate limiting, connection reset, timeouts) return `true`.
/// Integrity failures (unexpected status, malformed payload) return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // Transport failures while sending or while reading the body
            Error::Network(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            Error::RateLimited => true,
            Error::Config { .. }
            | Error::Auth(_)
            | Error::UnexpectedStatus { .. }
            | Error::InvalidResponse(_)
            | Error::Integrity(_)
            | Error::RetriesExhausted { .. }
            | Error::Worker(_)
            | Error::Io(_)
            | Error::Serialization(_) => false,
        }
    }
}

/// Execute an async operation, retrying transient failures with exponential backoff
///
/// Returns the successful result, the first non-retryable error, or the last
/// retryable error once `max_attempts` retries have been spent.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut retries = 0;
    let mut backoff = config.initial_delay;

    loop {
        let error = match operation().await {
            Ok(value) => {
                if retries > 0 {
                    tracing::debug!(retries, "request went through after retrying");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !error.is_retryable() {
            return Err(error);
        }
        if retries >= config.max_attempts {
            tracing::error!(error = %error, retries, "transient failure persisted, giving up");
            return Err(error);
        }

        retries += 1;
        let pause = if config.jitter {
            add_jitter(backoff)
        } else {
            backoff
        };
        tracing::warn!(
            error = %error,
            retry = retries,
            max_attempts = config.max_attempts,
            pause_ms = pause.as_millis() as u64,
            "transient failure, backing off"
        );
        tokio::time::sleep(pause).await;
        backoff = next_backoff(backoff, config);
    }
}

/// Grow `backoff` by the configured multiplier, saturating at `max_delay`
fn next_backoff(backoff: Duration, config: &RetryConfig) -> Duration {
    Duration::try_from_secs_f64(backoff.as_secs_f64() * config.backoff_multiplier)
        .map_or(config.max_delay, |grown| grown.min(config.max_delay))
}

/// Stretch `delay` by a random factor in `[1, 2]`
fn add_jitter(delay: Duration) -> Duration {
    delay.mul_f64(1.0 + rand::thread_rng().gen_range(0.0..=1.0))
}
