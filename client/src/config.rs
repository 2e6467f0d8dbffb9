//! Client configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::retry::RetryPolicy;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Settings for talking to the railway service
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL of the remote service
    pub api_url: String,
    /// Bearer credential from the authentication subsystem
    pub token: Option<String>,
    /// Upper bound for any single request
    pub request_timeout: Duration,
    /// Upper bound for establishing a connection
    pub connect_timeout: Duration,
    /// Upper bound for an inventory refresh before the stale snapshot is kept
    pub refresh_timeout: Duration,
    /// Backoff for idempotent calls
    pub retry: RetryPolicy,
    /// Where ticket files are written
    pub ticket_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from_vars(|_| None)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_url", &self.api_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("request_timeout", &self.request_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("refresh_timeout", &self.refresh_timeout)
            .field("retry", &self.retry)
            .field("ticket_dir", &self.ticket_dir)
            .finish()
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable values fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source
    #[must_use]
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let millis = |key: &str, default: u64| Duration::from_millis(parsed(&lookup, key, default));

        Self {
            api_url: lookup("RAIL_TIKIT_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "http://localhost:8000".to_string()),
            token: lookup("RAIL_TIKIT_TOKEN").filter(|token| !token.trim().is_empty()),
            request_timeout: millis("RAIL_TIKIT_REQUEST_TIMEOUT_MS", 5000),
            connect_timeout: millis("RAIL_TIKIT_CONNECT_TIMEOUT_MS", 2000),
            refresh_timeout: millis("RAIL_TIKIT_REFRESH_TIMEOUT_MS", 3000),
            retry: RetryPolicy::builder()
                .max_retries(parsed(&lookup, "RAIL_TIKIT_RETRY_MAX", 3))
                .initial_delay(millis("RAIL_TIKIT_RETRY_INITIAL_DELAY_MS", 100))
                .max_delay(millis("RAIL_TIKIT_RETRY_MAX_DELAY_MS", 2000))
                .multiplier(parsed(&lookup, "RAIL_TIKIT_RETRY_MULTIPLIER", 2.0))
                .build(),
            ticket_dir: lookup("RAIL_TIKIT_TICKET_DIR")
                .map_or_else(|| PathBuf::from("."), PathBuf::from),
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key).and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.api_url, "http://localhost:8000");
        assert!(config.token.is_none());
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.refresh_timeout, Duration::from_secs(3));
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.ticket_dir, PathBuf::from("."));
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let vars: HashMap<&str, &str> = [
            ("RAIL_TIKIT_API_URL", "https://rail.example.com/api/"),
            ("RAIL_TIKIT_TOKEN", "secret"),
            ("RAIL_TIKIT_REQUEST_TIMEOUT_MS", "750"),
            ("RAIL_TIKIT_RETRY_MAX", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let config = ClientConfig::from_vars(|key| vars.get(key).map(ToString::to_string));
        assert_eq!(config.api_url, "https://rail.example.com/api");
        assert_eq!(config.token.as_deref(), Some("secret"));
        assert_eq!(config.request_timeout, Duration::from_millis(750));
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = ClientConfig::from_vars(|key| (key == "RAIL_TIKIT_TOKEN").then(|| "secret".to_string()));
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
