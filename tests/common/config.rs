//! Configurations pointing the exporter at a local mock service

use std::time::Duration;
use offers_dump::config::{ApiConfig, PipelineConfig, RateLimitConfig, RetryConfig};
use offers_dump::Config;
use wiremock::MockServer;

/// Request ceiling used by the integration tests
pub const TEST_MAX_RPS: f64 = 50.0;

/// Config for `server` with fast retries and a high, but still enforced, rate ceiling
pub fn test_config(server: &MockServer) -> Config {
    Config {
        api: ApiConfig {
            auth_url: format!("{}/token", server.uri()),
            search_url: format!("{}/search", server.uri()),
            client_id: "integration".to_string(),
            client_secret: "integration-secret".to_string(),
            request_timeout: Duration::from_secs(10),
            ..Default::default()
        },
        rate_limit: RateLimitConfig {
            max_requests_per_second: TEST_MAX_RPS,
        },
        retry: RetryConfig {
            max_attempts: 5,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(50),
            backoff_multiplier: 2.0,
            jitter: false,
        },
        pipeline: PipelineConfig {
            workers: 4,
            ..Default::default()
        },
    }
}
