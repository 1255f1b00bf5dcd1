//! Client credentials authentication and the shared gate state

use serde::Deserialize;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::ApiConfig;
use crate::error::{Error, Result};

/// Token endpoint response
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub(crate) access_token: String,
    /// Validity in seconds
    pub(crate) expires_in: u64,
}

/// Token, its expiry and the earliest time the next request may start
///
/// One instance lives behind the client's mutex; every request locks it.
#[derive(Debug)]
pub(crate) struct AuthState {
    pub(crate) token: String,
    pub(crate) expiry: Instant,
    pub(crate) next_allowed: Instant,
}

impl AuthState {
    /// State with no usable token yet
    pub(crate) fn unauthenticated() -> Self {
        let now = Instant::now();
        Self {
            token: String::new(),
            expiry: now,
            next_allowed: now,
        }
    }

    pub(crate) fn is_expired(&self) -> bool {
        Instant::now() >= self.expiry
    }

    /// Store a fresh token; it is considered expired `margin` before the server says so
    pub(crate) fn install(&mut self, response: TokenResponse, margin: Duration) {
        let validity = Duration::from_secs(response.expires_in).saturating_sub(margin);
        self.token = response.access_token;
        self.expiry = Instant::now() + validity;
        tracing::debug!(valid_for_secs = validity.as_secs(), "installed new access token");
    }

    /// Wait for this caller's slot, then push the gate one interval past now
    pub(crate) async fn wait_turn(&mut self, interval: Duration) {
        tokio::time::sleep_until(self.next_allowed).await;
        self.next_allowed = Instant::now() + interval;
    }
}

/// One `client_credentials` exchange with the token endpoint
pub(crate) async fn request_token(
    http: &reqwest::Client,
    api: &ApiConfig,
) -> Result<TokenResponse> {
    let mut request = http.post(&api.auth_url);
    if !api.realm.is_empty() {
        request = request.query(&[("realm", api.realm.as_str())]);
    }
    let response = request
        .form(&[
            ("grant_type", "client_credentials"),
            ("scope", api.scope.as_str()),
            ("client_id", api.client_id.as_str()),
            ("client_secret", api.client_secret.as_str()),
        ])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Auth(format!("token endpoint returned {status}: {body}")));
    }

    let body = response.bytes().await?;
    serde_json::from_slice(&body)
        .map_err(|e| Error::Auth(format!("malformed token response: {e}")))
}
