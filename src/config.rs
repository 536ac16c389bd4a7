//! Configuration Module
//!
//! Handles loading and managing configuration from environment variables.
//! Every value is fixed once the service is constructed.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Service configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries the cache can hold
    pub max_entries: usize,
    /// Maximum number of concurrently running foreground fetches
    pub max_concurrent: usize,
    /// TTL in milliseconds used by the proxy endpoints and by preloads
    pub default_ttl_ms: u64,
    /// Interval in milliseconds between expired-entry sweeps
    pub sweep_interval_ms: u64,
    /// Active pool tasks at or above which preloading pauses
    pub preload_active_threshold: usize,
    /// Retry behaviour of the proxy fetch path
    pub retry: RetryPolicy,
    /// HTTP server port
    pub server_port: u16,
    /// Base URL proxied requests are fetched from
    pub origin_url: String,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_ENTRIES` - Maximum cache entries (default: 100)
    /// - `MAX_CONCURRENT` - Pool size (default: 6)
    /// - `DEFAULT_TTL_MS` - TTL for proxied and preloaded values (default: 300000)
    /// - `SWEEP_INTERVAL_MS` - Sweep frequency (default: 60000)
    /// - `PRELOAD_ACTIVE_THRESHOLD` - Preloading pauses at this many active tasks (default: 2)
    /// - `RETRY_MAX_ATTEMPTS` - Attempts per fetch (default: 3)
    /// - `RETRY_BASE_DELAY_MS` - First backoff delay (default: 1000)
    /// - `RETRY_MAX_DELAY_MS` - Backoff cap (default: 10000)
    /// - `REQUEST_TIMEOUT_MS` - Per-attempt timeout (default: 10000)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `ORIGIN_URL` - Origin base URL (default: http://127.0.0.1:8080)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_entries: env_or("MAX_ENTRIES", defaults.max_entries),
            max_concurrent: env_or("MAX_CONCURRENT", defaults.max_concurrent),
            default_ttl_ms: env_or("DEFAULT_TTL_MS", defaults.default_ttl_ms),
            sweep_interval_ms: env_or("SWEEP_INTERVAL_MS", defaults.sweep_interval_ms),
            preload_active_threshold: env_or(
                "PRELOAD_ACTIVE_THRESHOLD",
                defaults.preload_active_threshold,
            ),
            retry: RetryPolicy {
                max_retries: env_or("RETRY_MAX_ATTEMPTS", defaults.retry.max_retries),
                base_delay: env_ms_or("RETRY_BASE_DELAY_MS", defaults.retry.base_delay),
                max_delay: env_ms_or("RETRY_MAX_DELAY_MS", defaults.retry.max_delay),
                timeout: env_ms_or("REQUEST_TIMEOUT_MS", defaults.retry.timeout),
            },
            server_port: env_or("SERVER_PORT", defaults.server_port),
            origin_url: env::var("ORIGIN_URL").unwrap_or(defaults.origin_url),
        }
    }

    /// Checks the values a service cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_entries == 0 {
            return Err("MAX_ENTRIES must be at least 1".to_string());
        }
        if self.max_concurrent == 0 {
            return Err("MAX_CONCURRENT must be at least 1".to_string());
        }
        Ok(())
    }

    /// TTL applied by the proxy endpoints and the preloader.
    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    /// Interval of the background sweep.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: 100,
            max_concurrent: 6,
            default_ttl_ms: 300_000,
            sweep_interval_ms: 60_000,
            preload_active_threshold: 2,
            retry: RetryPolicy::default(),
            server_port: 3000,
            origin_url: "http://127.0.0.1:8080".to_string(),
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_ms_or(name: &str, default: Duration) -> Duration {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.max_entries, 100);
        assert_eq!(config.max_concurrent, 6);
        assert_eq!(config.default_ttl(), Duration::from_secs(300));
        assert_eq!(config.sweep_interval(), Duration::from_secs(60));
        assert_eq!(config.preload_active_threshold, 2);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.server_port, 3000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        for name in [
            "MAX_ENTRIES",
            "MAX_CONCURRENT",
            "DEFAULT_TTL_MS",
            "SWEEP_INTERVAL_MS",
            "PRELOAD_ACTIVE_THRESHOLD",
            "RETRY_MAX_ATTEMPTS",
            "RETRY_BASE_DELAY_MS",
            "RETRY_MAX_DELAY_MS",
            "REQUEST_TIMEOUT_MS",
            "SERVER_PORT",
            "ORIGIN_URL",
        ] {
            env::remove_var(name);
        }

        let config = Config::from_env();
        assert_eq!(config.max_entries, 100);
        assert_eq!(config.max_concurrent, 6);
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.origin_url, "http://127.0.0.1:8080");
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        let config = Config {
            max_entries: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            max_concurrent: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_ms_or_parses_millis() {
        env::set_var("FLIGHT_CACHE_TEST_DELAY_MS", "250");
        assert_eq!(
            env_ms_or("FLIGHT_CACHE_TEST_DELAY_MS", Duration::ZERO),
            Duration::from_millis(250)
        );
        env::set_var("FLIGHT_CACHE_TEST_DELAY_MS", "not-a-number");
        assert_eq!(
            env_ms_or("FLIGHT_CACHE_TEST_DELAY_MS", Duration::from_secs(1)),
            Duration::from_secs(1)
        );
        env::remove_var("FLIGHT_CACHE_TEST_DELAY_MS");
    }
}
