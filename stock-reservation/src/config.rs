//! Configuration for the reservation controller.
//!
//! Loads configuration from environment variables with sensible defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use storefront_runtime::RetryPolicy;

/// Reservation controller configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationConfig {
    /// Storefront API base URL
    pub api_url: String,
    /// Total release attempts, the first one included
    pub release_max_attempts: u32,
    /// Fixed delay between release attempts
    pub release_retry_delay: Duration,
    /// Timeout for regular reserve and release requests
    pub request_timeout: Duration,
    /// Timeout for keep-alive releases fired from teardown
    pub keep_alive_timeout: Duration,
    /// How long a facade call waits for its settlement
    ///
    /// Covers releasing a previous hold (with retries) before a new reserve call.
    pub response_timeout: Duration,
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:5000".to_string(),
            release_max_attempts: 3,
            release_retry_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(10),
            keep_alive_timeout: Duration::from_millis(2000),
            response_timeout: Duration::from_secs(60),
        }
    }
}

impl ReservationConfig {
    /// Load configuration from environment variables
    ///
    /// Unset or unparsable variables fall back to the defaults:
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `STOREFRONT_API_URL` | `http://localhost:5000` |
    /// | `RESERVATION_RELEASE_MAX_ATTEMPTS` | `3` |
    /// | `RESERVATION_RELEASE_RETRY_DELAY_MS` | `1000` |
    /// | `RESERVATION_REQUEST_TIMEOUT_SECS` | `10` |
    /// | `RESERVATION_KEEP_ALIVE_TIMEOUT_MS` | `2000` |
    /// | `RESERVATION_RESPONSE_TIMEOUT_SECS` | `60` |
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            api_url: env::var("STOREFRONT_API_URL").unwrap_or(defaults.api_url),
            release_max_attempts: env::var("RESERVATION_RELEASE_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|attempts| *attempts > 0)
                .unwrap_or(defaults.release_max_attempts),
            release_retry_delay: env::var("RESERVATION_RELEASE_RETRY_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map_or(defaults.release_retry_delay, Duration::from_millis),
            request_timeout: env::var("RESERVATION_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map_or(defaults.request_timeout, Duration::from_secs),
            keep_alive_timeout: env::var("RESERVATION_KEEP_ALIVE_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map_or(defaults.keep_alive_timeout, Duration::from_millis),
            response_timeout: env::var("RESERVATION_RESPONSE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map_or(defaults.response_timeout, Duration::from_secs),
        }
    }

    /// Set the API base URL
    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Fixed-backoff policy for release retries
    #[must_use]
    pub const fn release_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.release_max_attempts, self.release_retry_delay)
    }
}
