//! Rate-limited, token-refreshing client for the search API
//!
//! All requests from every worker funnel through one [`RateLimitedClient`]. Its
//! mutex guards the access token, the token expiry and the earliest instant the
//! next request may start, so the configured request ceiling holds for the whole
//! process no matter how many tasks are waiting.
//!
//! - [`auth`] - client credentials exchange and the gate state
//! - [`search`] - search query parameters and response interpretation

mod auth;
// unwrap/expect are acceptable in test doubles
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod fake;
mod search;

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::config::{ApiConfig, Config, RetryConfig};
use crate::error::{Error, Result};
use crate::retry::{IsRetryable, with_retry};
use crate::span::Span;

use auth::AuthState;
use search::Outcome;

/// Results per page the search endpoint accepts
pub const MAX_ITEMS_PER_PAGE: u32 = 150;

/// Pages a single query can reach
pub const MAX_PAGES: u32 = 21;

/// Most matches a single query can ever enumerate
pub const MAX_ITEMS: u64 = (MAX_ITEMS_PER_PAGE * MAX_PAGES) as u64;

/// One search response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Raw response body (empty when the span has no match)
    pub body: Vec<u8>,
    /// True match count for the span when the service reported one (206), else 0
    pub remaining: u64,
}

/// Source of search result pages
///
/// Implemented by [`RateLimitedClient`] for the real service; the partitioner and
/// the worker pool only depend on this trait.
#[async_trait]
pub trait SearchApi: Send + Sync {
    /// Fetch `item_count` results starting at page `page` of the matches in `span`
    async fn fetch_page(&self, span: Span, page: u32, item_count: u32) -> Result<Page>;

    /// Requests sent so far, retries included (0 when the source does not count them)
    fn requests(&self) -> u64 {
        0
    }
}

/// HTTP client sharing one token and one request gate across all callers
pub struct RateLimitedClient {
    http: reqwest::Client,
    api: ApiConfig,
    retry: RetryConfig,
    min_interval: Duration,
    state: Mutex<AuthState>,
    requests: AtomicU64,
}

impl RateLimitedClient {
    /// Build the client and authenticate once before returning
    pub async fn new(config: &Config) -> Result<Self> {
        let min_interval = config.rate_limit.min_interval()?;
        let http = reqwest::Client::builder()
            .timeout(config.api.request_timeout)
            .build()?;

        let client = Self {
            http,
            api: config.api.clone(),
            retry: config.retry.clone(),
            min_interval,
            state: Mutex::new(AuthState::unauthenticated()),
            requests: AtomicU64::new(0),
        };
        client.authenticate().await?;
        tracing::info!(auth_url = %client.api.auth_url, "authenticated");
        Ok(client)
    }

    /// Obtain a new access token and install it
    ///
    /// Blocks every other caller until the exchange completes.
    pub async fn authenticate(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        self.refresh(&mut state).await
    }

    /// Number of search requests sent so far (probes and pages, retries included)
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Configured minimum spacing between two requests
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    async fn refresh(&self, state: &mut AuthState) -> Result<()> {
        let response = with_retry(&self.retry, || auth::request_token(&self.http, &self.api))
            .await
            .map_err(|e| self.exhausted(e))?;
        state.install(response, self.api.token_safety_margin);
        Ok(())
    }

    /// Take this request's slot in the gate and return a valid token
    async fn acquire(&self) -> Result<String> {
        let mut state = self.state.lock().await;
        state.wait_turn(self.min_interval).await;
        if state.is_expired() {
            tracing::debug!("access token expired, renewing");
            self.refresh(&mut state).await?;
        }
        Ok(state.token.clone())
    }

    async fn try_fetch(&self, query: &[(&'static str, String)]) -> Result<Page> {
        let token = self.acquire().await?;
        self.requests.fetch_add(1, Ordering::Relaxed);

        let response = self
            .http
            .get(&self.api.search_url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;

        match search::classify(response.status())? {
            Outcome::Empty => Ok(Page::empty()),
            Outcome::Complete => {
                let body = response.bytes().await?;
                Ok(Page {
                    body: body.to_vec(),
                    remaining: 0,
                })
            }
            Outcome::Partial => {
                let remaining = search::parse_total(response.headers())?;
                let body = response.bytes().await?;
                Ok(Page {
                    body: body.to_vec(),
                    remaining,
                })
            }
        }
    }

    fn exhausted(&self, error: Error) -> Error {
        if error.is_retryable() {
            Error::RetriesExhausted {
                attempts: self.retry.max_attempts + 1,
                source: Box::new(error),
            }
        } else {
            error
        }
    }
}

#[async_trait]
impl SearchApi for RateLimitedClient {
    async fn fetch_page(&self, span: Span, page: u32, item_count: u32) -> Result<Page> {
        let query = search::search_query(span, page, item_count)?;
        let query = query.as_slice();
        let result = with_retry(&self.retry, move || self.try_fetch(query)).await;
        let page_result = result.map_err(|e| self.exhausted(e))?;
        tracing::trace!(
            range = %span,
            page,
            item_count,
            bytes = page_result.body.len(),
            remaining = page_result.remaining,
            "fetched page"
        );
        Ok(page_result)
    }

    fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }
}
