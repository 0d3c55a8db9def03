//! Sync configuration.
//!
//! Combines the WebSocket and REST settings and loads them from the
//! environment.

use std::time::Duration;

use crate::client::ClientConfig;
use crate::ws::WsConfig;

/// WebSocket base URL.
pub const ENV_WS_URL: &str = "TICKETDESK_WS_URL";

/// REST API base URL.
pub const ENV_API_URL: &str = "TICKETDESK_API_URL";

/// Base reconnect delay in milliseconds.
pub const ENV_RECONNECT_DELAY_MS: &str = "TICKETDESK_RECONNECT_DELAY_MS";

/// Reconnect delay cap in milliseconds.
pub const ENV_MAX_RECONNECT_DELAY_MS: &str = "TICKETDESK_MAX_RECONNECT_DELAY_MS";

/// Heartbeat interval in seconds; `0` disables the heartbeat.
pub const ENV_HEARTBEAT_SECS: &str = "TICKETDESK_HEARTBEAT_SECS";

/// Configuration for the sync engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncConfig {
    /// WebSocket settings.
    pub ws: WsConfig,

    /// REST settings.
    pub api: ClientConfig,
}

impl SyncConfig {
    /// Creates a configuration for the given WebSocket and REST base URLs.
    #[must_use]
    pub fn new(ws_url: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            ws: WsConfig::new(ws_url),
            api: ClientConfig::new(api_url),
        }
    }

    /// Loads the configuration from `TICKETDESK_*` environment variables,
    /// falling back to defaults for unset ones.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is not a valid number or the result
    /// does not validate.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`SyncConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_WS_URL) {
            config.ws.base_url = url;
        }
        if let Some(url) = lookup(ENV_API_URL) {
            config.api.base_url = url;
        }
        if let Some(ms) = parse_number(&lookup, ENV_RECONNECT_DELAY_MS)? {
            config.ws.reconnect_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_number(&lookup, ENV_MAX_RECONNECT_DELAY_MS)? {
            config.ws.max_reconnect_delay = Duration::from_millis(ms);
        }
        match parse_number(&lookup, ENV_HEARTBEAT_SECS)? {
            Some(0) => config.ws.heartbeat_interval = None,
            Some(secs) => config.ws.heartbeat_interval = Some(Duration::from_secs(secs)),
            None => {}
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates both halves of the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ws
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.api
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }
}

fn parse_number<F>(lookup: &F, key: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidNumber { key, value })
        })
        .transpose()
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A numeric variable did not parse.
    #[error("{key} must be a non-negative integer, got {value:?}")]
    InvalidNumber {
        /// Variable name.
        key: &'static str,
        /// Offending value.
        value: String,
    },

    /// A setting failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = SyncConfig::from_lookup(lookup(&[])).expect("config");
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.ws.reconnect_delay, Duration::from_secs(3));
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = SyncConfig::from_lookup(lookup(&[
            (ENV_WS_URL, "wss://desk.example.com"),
            (ENV_API_URL, "https://desk.example.com/api"),
            (ENV_RECONNECT_DELAY_MS, "500"),
            (ENV_MAX_RECONNECT_DELAY_MS, "8000"),
            (ENV_HEARTBEAT_SECS, "0"),
        ]))
        .expect("config");

        assert_eq!(config.ws.base_url, "wss://desk.example.com");
        assert_eq!(config.api.base_url, "https://desk.example.com/api");
        assert_eq!(config.ws.reconnect_delay, Duration::from_millis(500));
        assert_eq!(config.ws.max_reconnect_delay, Duration::from_millis(8000));
        assert_eq!(config.ws.heartbeat_interval, None);
    }

    #[test]
    fn test_from_lookup_invalid_number() {
        let err = SyncConfig::from_lookup(lookup(&[(ENV_RECONNECT_DELAY_MS, "soon")]))
            .expect_err("invalid");
        assert_eq!(
            err,
            ConfigError::InvalidNumber {
                key: ENV_RECONNECT_DELAY_MS,
                value: "soon".to_string(),
            }
        );
        assert!(err.to_string().contains(ENV_RECONNECT_DELAY_MS));
    }

    #[test]
    fn test_from_lookup_invalid_url() {
        let err = SyncConfig::from_lookup(lookup(&[(ENV_WS_URL, "http://desk")]))
            .expect_err("invalid");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
