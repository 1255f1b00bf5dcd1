//! Configuration types for offers-dump

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default OAuth2 token endpoint of the job offer API
pub const DEFAULT_AUTH_URL: &str =
    "https://entreprise.pole-emploi.fr/connexion/oauth2/access_token";

/// Default search endpoint of the job offer API
pub const DEFAULT_SEARCH_URL: &str =
    "https://api.pole-emploi.io/partenaire/offresdemploi/v2/offres/search";

/// Remote endpoints and credentials
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Token endpoint (default: the public job offer API)
    #[serde(default = "default_auth_url")]
    pub auth_url: String,

    /// Search endpoint (default: the public job offer API)
    #[serde(default = "default_search_url")]
    pub search_url: String,

    /// Realm query parameter sent to the token endpoint (empty = omitted)
    #[serde(default = "default_realm")]
    pub realm: String,

    /// OAuth2 scope requested with the client credentials grant
    #[serde(default = "default_scope")]
    pub scope: String,

    /// Client identifier
    #[serde(default)]
    pub client_id: String,

    /// Client secret
    #[serde(default)]
    pub client_secret: String,

    /// Per-request timeout (default: 60 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Subtracted from the token validity reported by the server (default: 10 seconds)
    #[serde(default = "default_token_safety_margin", with = "duration_serde")]
    pub token_safety_margin: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            auth_url: default_auth_url(),
            search_url: default_search_url(),
            realm: default_realm(),
            scope: default_scope(),
            client_id: String::new(),
            client_secret: String::new(),
            request_timeout: default_request_timeout(),
            token_safety_margin: default_token_safety_margin(),
        }
    }
}

/// Global request rate ceiling shared by every caller of the client
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests per second across all workers (default: 4)
    #[serde(default = "default_max_requests_per_second")]
    pub max_requests_per_second: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests_per_second: default_max_requests_per_second(),
        }
    }
}

impl RateLimitConfig {
    /// Minimum spacing between the start of two consecutive requests
    ///
    /// Fails when the rate is not positive or so small the spacing overflows a [`Duration`].
    pub fn min_interval(&self) -> Result<Duration> {
        let rps = self.max_requests_per_second;
        Duration::try_from_secs_f64(1.0 / rps).map_err(|e| {
            Error::config(
                format!("cannot space requests at {rps} per second: {e}"),
                "rate_limit.max_requests_per_second",
            )
        })
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 8)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 500 ms)
    #[serde(default = "default_initial_delay", with = "duration_millis_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_millis_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// How records are framed inside the compressed stream
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordEncoding {
    /// One JSON object per line (default)
    #[default]
    Ndjson,
    /// 4-byte big-endian length followed by the JSON bytes
    Framed,
}

/// Worker pool, record fields and output settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of concurrent page-fetching workers (default: 8)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Capacity of the work queue between partitioner and workers (default: 16)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Record field holding the unique identifier (default: "id")
    #[serde(default = "default_id_field")]
    pub id_field: String,

    /// Free-text description field (default: "description")
    #[serde(default = "default_description_field")]
    pub description_field: String,

    /// Free-text title field (default: "intitule")
    #[serde(default = "default_title_field")]
    pub title_field: String,

    /// Also run the title field through text normalization (default: true)
    #[serde(default = "default_true")]
    pub clean_title: bool,

    /// Record framing in the output stream
    #[serde(default)]
    pub encoding: RecordEncoding,

    /// zstd compression level (default: 3)
    #[serde(default = "default_compression_level")]
    pub compression_level: i32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            id_field: default_id_field(),
            description_field: default_description_field(),
            title_field: default_title_field(),
            clean_title: true,
            encoding: RecordEncoding::default(),
            compression_level: default_compression_level(),
        }
    }
}

/// Main configuration for an export run
///
/// Grouped into sub-configs:
/// - [`api`](ApiConfig) - endpoints and credentials
/// - [`rate_limit`](RateLimitConfig) - global request ceiling
/// - [`retry`](RetryConfig) - transient failure handling
/// - [`pipeline`](PipelineConfig) - workers, record fields, output framing
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote endpoints and credentials
    #[serde(default)]
    pub api: ApiConfig,

    /// Global request rate ceiling
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Retry policy for transient failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Worker pool and output settings
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Check the settings an export cannot run without
    pub fn validate(&self) -> Result<()> {
        if self.api.client_id.is_empty() {
            return Err(Error::config("client id is required", "api.client_id"));
        }
        if self.api.client_secret.is_empty() {
            return Err(Error::config(
                "client secret is required",
                "api.client_secret",
            ));
        }
        for (key, value) in [
            ("api.auth_url", &self.api.auth_url),
            ("api.search_url", &self.api.search_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| Error::config(format!("invalid URL {value:?}: {e}"), key))?;
        }
        let rps = self.rate_limit.max_requests_per_second;
        if !rps.is_finite() || rps <= 0.0 {
            return Err(Error::config(
                format!("must be a positive number, got {rps}"),
                "rate_limit.max_requests_per_second",
            ));
        }
        self.rate_limit.min_interval()?;
        if self.pipeline.workers == 0 {
            return Err(Error::config("at least one worker is required", "pipeline.workers"));
        }
        if self.pipeline.queue_capacity == 0 {
            return Err(Error::config(
                "queue capacity must be positive",
                "pipeline.queue_capacity",
            ));
        }
        let multiplier = self.retry.backoff_multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(Error::config(
                "backoff multiplier must be a finite number of at least 1.0",
                "retry.backoff_multiplier",
            ));
        }
        Ok(())
    }
}

fn default_auth_url() -> String {
    DEFAULT_AUTH_URL.to_string()
}

fn default_search_url() -> String {
    DEFAULT_SEARCH_URL.to_string()
}

fn default_realm() -> String {
    "/partenaire".to_string()
}

fn default_scope() -> String {
    "api_offresdemploiv2 o2dsoffre".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_token_safety_margin() -> Duration {
    Duration::from_secs(10)
}

fn default_max_requests_per_second() -> f64 {
    4.0
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    8
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_workers() -> usize {
    8
}

fn default_queue_capacity() -> usize {
    16
}

fn default_id_field() -> String {
    "id".to_string()
}

fn default_description_field() -> String {
    "description".to_string()
}

fn default_title_field() -> String {
    "intitule".to_string()
}

fn default_compression_level() -> i32 {
    3
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds, for sub-second retry delays)
mod duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            api: ApiConfig {
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn defaults_match_the_public_api_limits() {
        let config = Config::default();
        assert_eq!(config.rate_limit.max_requests_per_second, 4.0);
        assert_eq!(
            config.rate_limit.min_interval().unwrap(),
            Duration::from_millis(250)
        );
        assert_eq!(config.pipeline.workers, 8);
        assert_eq!(config.pipeline.queue_capacity, 16);
        assert_eq!(config.api.token_safety_margin, Duration::from_secs(10));
        assert_eq!(config.pipeline.encoding, RecordEncoding::Ndjson);
    }

    #[test]
    fn empty_json_deserializes_to_defaults() {
        let config: Config = serde_json::from_str("{}").expect("deserialize failed");
        assert_eq!(config.api.auth_url, DEFAULT_AUTH_URL);
        assert_eq!(config.pipeline.id_field, "id");
        assert!(config.pipeline.clean_title);
        assert_eq!(config.retry.initial_delay, Duration::from_millis(500));
    }

    #[test]
    fn retry_delays_round_trip_in_milliseconds() {
        let retry = RetryConfig {
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_millis(4_000),
            ..Default::default()
        };
        let json = serde_json::to_string(&retry).expect("serialize failed");
        assert!(json.contains("\"initial_delay\":250"), "got: {json}");

        let back: RetryConfig = serde_json::from_str(&json).expect("deserialize failed");
        assert_eq!(back.initial_delay, Duration::from_millis(250));
        assert_eq!(back.max_delay, Duration::from_millis(4_000));
    }

    #[test]
    fn encoding_uses_snake_case_names() {
        let framed: RecordEncoding = serde_json::from_str("\"framed\"").unwrap();
        assert_eq!(framed, RecordEncoding::Framed);
    }

    #[test]
    fn validate_accepts_complete_config() {
        valid_config().validate().unwrap();
    }

    #[test]
    fn validate_rejects_missing_credentials() {
        let config = Config::default();
        match config.validate() {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("api.client_id")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_zero_workers_and_bad_rate() {
        let mut config = valid_config();
        config.pipeline.workers = 0;
        assert!(matches!(config.validate(), Err(Error::Config { .. })));

        let mut config = valid_config();
        config.rate_limit.max_requests_per_second = 0.0;
        match config.validate() {
            Err(Error::Config { key, .. }) => assert_eq!(
                key.as_deref(),
                Some("rate_limit.max_requests_per_second")
            ),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_malformed_url() {
        let mut config = valid_config();
        config.api.search_url = "not a url".to_string();
        match config.validate() {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("api.search_url")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn vanishing_rate_is_rejected_instead_of_overflowing() {
        let mut config = valid_config();
        config.rate_limit.max_requests_per_second = 1e-300;
        match config.validate() {
            Err(Error::Config { key, .. }) => assert_eq!(
                key.as_deref(),
                Some("rate_limit.max_requests_per_second")
            ),
            other => panic!("expected config error, got {other:?}"),
        }
        assert!(config.rate_limit.min_interval().is_err());

        let zero = RateLimitConfig {
            max_requests_per_second: 0.0,
        };
        assert!(matches!(zero.min_interval(), Err(Error::Config { .. })));
    }

    #[test]
    fn validate_rejects_unbounded_backoff_multiplier() {
        for multiplier in [f64::NAN, f64::INFINITY, 0.5] {
            let mut config = valid_config();
            config.retry.backoff_multiplier = multiplier;
            match config.validate() {
                Err(Error::Config { key, .. }) => {
                    assert_eq!(key.as_deref(), Some("retry.backoff_multiplier"))
                }
                other => panic!("expected config error for {multiplier}, got {other:?}"),
            }
        }
    }
}
