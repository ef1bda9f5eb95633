//! Configuration Module
//!
//! Handles loading and managing client configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::Locale;

/// Client configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL, without trailing slash
    pub base_url: String,
    /// Language for user-facing error messages
    pub locale: Locale,
    /// Maximum number of cached read responses
    pub cache_max_entries: usize,
    /// Default TTL in seconds for cached read responses
    pub cache_ttl_secs: u64,
    /// Per-request timeout enforced by the HTTP transport, in milliseconds
    pub request_timeout_ms: u64,
    /// Age in seconds after which an in-flight entry is dropped by the safeguard
    pub inflight_timeout_secs: u64,
    /// Upper bound on a renewal call, in milliseconds
    pub refresh_timeout_ms: u64,
    /// Retries after the first attempt for calls wrapped as critical (3 means four calls)
    pub retry_max_retries: u32,
    /// Base delay for the critical-call backoff, in milliseconds
    pub retry_base_delay_ms: u64,
    /// Background sweeper interval in seconds
    pub cleanup_interval_secs: u64,
    pub login_path: String,
    pub logout_path: String,
    pub refresh_path: String,
    /// File backing the credential store in the CLI
    pub credentials_path: String,
}

impl ClientConfig {
    /// Creates a new ClientConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `API_BASE_URL` - Backend base URL (default: http://localhost:8080)
    /// - `API_LOCALE` - Message language, `en` or `fr` (default: en)
    /// - `CACHE_MAX_ENTRIES` - Maximum cached responses (default: 100)
    /// - `CACHE_TTL_SECS` - Cached response TTL in seconds (default: 30)
    /// - `REQUEST_TIMEOUT_MS` - Transport timeout (default: 15000)
    /// - `INFLIGHT_TIMEOUT_SECS` - In-flight safeguard (default: 30)
    /// - `REFRESH_TIMEOUT_MS` - Renewal call bound (default: 10000)
    /// - `RETRY_MAX_RETRIES` - Critical call retries after the first attempt (default: 3)
    /// - `RETRY_BASE_DELAY_MS` - Critical call base delay (default: 500)
    /// - `CLEANUP_INTERVAL_SECS` - Sweeper frequency (default: 30)
    /// - `LOGIN_PATH`, `LOGOUT_PATH`, `REFRESH_PATH` - Auth endpoints
    /// - `CREDENTIALS_PATH` - Credential file (default: .booking_credentials.json)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env::var("API_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            locale: env::var("API_LOCALE")
                .ok()
                .and_then(|v| Locale::parse(&v))
                .unwrap_or(defaults.locale),
            cache_max_entries: parse_var("CACHE_MAX_ENTRIES")
                .filter(|v| *v > 0)
                .unwrap_or(defaults.cache_max_entries),
            cache_ttl_secs: parse_var("CACHE_TTL_SECS").unwrap_or(defaults.cache_ttl_secs),
            request_timeout_ms: parse_var("REQUEST_TIMEOUT_MS")
                .unwrap_or(defaults.request_timeout_ms),
            inflight_timeout_secs: parse_var("INFLIGHT_TIMEOUT_SECS")
                .unwrap_or(defaults.inflight_timeout_secs),
            refresh_timeout_ms: parse_var("REFRESH_TIMEOUT_MS")
                .unwrap_or(defaults.refresh_timeout_ms),
            retry_max_retries: parse_var("RETRY_MAX_RETRIES")
                .unwrap_or(defaults.retry_max_retries),
            retry_base_delay_ms: parse_var("RETRY_BASE_DELAY_MS")
                .unwrap_or(defaults.retry_base_delay_ms),
            cleanup_interval_secs: parse_var("CLEANUP_INTERVAL_SECS")
                .filter(|v| *v > 0)
                .unwrap_or(defaults.cleanup_interval_secs),
            login_path: env::var("LOGIN_PATH").unwrap_or(defaults.login_path),
            logout_path: env::var("LOGOUT_PATH").unwrap_or(defaults.logout_path),
            refresh_path: env::var("REFRESH_PATH").unwrap_or(defaults.refresh_path),
            credentials_path: env::var("CREDENTIALS_PATH").unwrap_or(defaults.credentials_path),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn inflight_timeout(&self) -> Duration {
        Duration::from_secs(self.inflight_timeout_secs)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            locale: Locale::En,
            cache_max_entries: 100,
            cache_ttl_secs: 30,
            request_timeout_ms: 15_000,
            inflight_timeout_secs: 30,
            refresh_timeout_ms: 10_000,
            retry_max_retries: 3,
            retry_base_delay_ms: 500,
            cleanup_interval_secs: 30,
            login_path: "/auth/login".to_string(),
            logout_path: "/auth/logout".to_string(),
            refresh_path: "/auth/refresh".to_string(),
            credentials_path: ".booking_credentials.json".to_string(),
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.locale, Locale::En);
        assert_eq!(config.cache_max_entries, 100);
        assert_eq!(config.cache_ttl(), Duration::from_secs(30));
        assert_eq!(config.retry_max_retries, 3);
        assert_eq!(config.refresh_path, "/auth/refresh");
    }

    // Single test touches the environment so parallel tests cannot race on it.
    #[test]
    fn test_config_from_env() {
        for name in [
            "API_BASE_URL",
            "API_LOCALE",
            "CACHE_MAX_ENTRIES",
            "CACHE_TTL_SECS",
            "RETRY_MAX_RETRIES",
        ] {
            env::remove_var(name);
        }

        let config = ClientConfig::from_env();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.cache_max_entries, 100);

        env::set_var("API_BASE_URL", "https://api.example.test/");
        env::set_var("API_LOCALE", "fr-FR");
        env::set_var("CACHE_MAX_ENTRIES", "0");
        env::set_var("CACHE_TTL_SECS", "not-a-number");
        env::set_var("RETRY_MAX_RETRIES", "2");

        let config = ClientConfig::from_env();
        assert_eq!(config.base_url, "https://api.example.test");
        assert_eq!(config.locale, Locale::Fr);
        assert_eq!(config.cache_max_entries, 100, "zero capacity falls back");
        assert_eq!(config.cache_ttl_secs, 30, "invalid value falls back");
        assert_eq!(config.retry_max_retries, 2);

        for name in [
            "API_BASE_URL",
            "API_LOCALE",
            "CACHE_MAX_ENTRIES",
            "CACHE_TTL_SECS",
            "RETRY_MAX_RETRIES",
        ] {
            env::remove_var(name);
        }
    }
}
