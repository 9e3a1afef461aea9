//! Telemetry configuration.

use std::time::Duration;

/// Environment variable holding the telemetry API key.
pub const API_KEY_ENV: &str = "AGENTSUDO_API_KEY";

/// Environment variable overriding the telemetry endpoint.
pub const ENDPOINT_ENV: &str = "AGENTSUDO_ENDPOINT";

/// Default hosted collector.
pub const DEFAULT_ENDPOINT: &str = "https://agentsudo.dev";

/// Errors raised while building configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// No API key was supplied or found in the environment.
    #[error("API key required. Pass one explicitly or set AGENTSUDO_API_KEY")]
    MissingApiKey,

    /// A numeric setting was out of range.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// The offending setting
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

/// Settings for shipping decision events to a remote collector.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use agentsudo_core::TelemetryConfig;
///
/// let config = TelemetryConfig::new("as_test_key")
///     .with_endpoint("https://collector.internal/")
///     .with_batch_size(50)
///     .with_flush_interval(Duration::from_secs(1));
///
/// assert_eq!(config.endpoint(), "https://collector.internal");
/// assert_eq!(config.events_url(), "https://collector.internal/api/events");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    api_key: String,
    endpoint: String,
    batch_size: usize,
    flush_interval: Duration,
    request_timeout: Duration,
}

impl TelemetryConfig {
    /// Create a config with default endpoint, batching and timeouts.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            batch_size: 10,
            flush_interval: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Read `AGENTSUDO_API_KEY` and optionally `AGENTSUDO_ENDPOINT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = lookup(API_KEY_ENV)
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let mut config = Self::new(api_key);
        if let Some(endpoint) = lookup(ENDPOINT_ENV).filter(|e| !e.trim().is_empty()) {
            config = config.with_endpoint(endpoint);
        }
        Ok(config)
    }

    /// Set the collector base URL. Trailing slashes are trimmed.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Number of events that triggers an immediate send. Default: 10.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Longest time an event waits in a partial batch. Default: 5s.
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Timeout for each collector request. Default: 10s.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Check that the numeric settings are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "batch_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.flush_interval.is_zero() {
            return Err(ConfigError::Invalid {
                field: "flush_interval",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Full URL events are posted to.
    pub fn events_url(&self) -> String {
        format!("{}/api/events", self.endpoint)
    }
}
