//! WebSocket configuration.
//!
//! Provides configuration options for the connection manager.

use std::time::Duration;

use super::error::WsError;

/// Default WebSocket base URL.
pub const DEFAULT_WS_URL: &str = "ws://localhost:8080";

/// Default path of the streaming endpoint.
pub const DEFAULT_WS_PATH: &str = "/api/ws";

/// Default heartbeat interval in seconds.
pub const DEFAULT_HEARTBEAT_SECS: u64 = 30;

/// Default reconnect delay in milliseconds.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 3_000;

/// Maximum reconnect delay in milliseconds.
pub const MAX_RECONNECT_DELAY_MS: u64 = 30_000;

/// WebSocket configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsConfig {
    /// Base URL (`ws://` or `wss://`), without the endpoint path.
    pub base_url: String,

    /// Path of the streaming endpoint.
    pub path: String,

    /// Delay before the first reconnect attempt.
    pub reconnect_delay: Duration,

    /// Ceiling for the exponential reconnect delay.
    pub max_reconnect_delay: Duration,

    /// Maximum consecutive reconnect attempts (None = unlimited).
    pub max_reconnect_attempts: Option<u32>,

    /// Client ping interval while open (None = no heartbeat).
    pub heartbeat_interval: Option<Duration>,

    /// Close code the server uses to reject a token. Closes with this code
    /// are not retried.
    pub auth_failure_close_code: Option<u16>,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_WS_URL.to_string(),
            path: DEFAULT_WS_PATH.to_string(),
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
            max_reconnect_delay: Duration::from_millis(MAX_RECONNECT_DELAY_MS),
            max_reconnect_attempts: None,
            heartbeat_interval: Some(Duration::from_secs(DEFAULT_HEARTBEAT_SECS)),
            auth_failure_close_code: None,
        }
    }
}

impl WsConfig {
    /// Creates a new configuration with the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Sets the endpoint path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets the initial reconnect delay.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets the maximum reconnect delay.
    #[must_use]
    pub fn with_max_reconnect_delay(mut self, delay: Duration) -> Self {
        self.max_reconnect_delay = delay;
        self
    }

    /// Sets the maximum reconnection attempts.
    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = Some(attempts);
        self
    }

    /// Sets the heartbeat interval.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = Some(interval);
        self
    }

    /// Disables the client heartbeat.
    #[must_use]
    pub fn without_heartbeat(mut self) -> Self {
        self.heartbeat_interval = None;
        self
    }

    /// Sets the close code that marks a rejected token.
    #[must_use]
    pub fn with_auth_failure_close_code(mut self, code: u16) -> Self {
        self.auth_failure_close_code = Some(code);
        self
    }

    /// Returns the connection URL carrying the bearer token.
    ///
    /// The token travels as a query parameter because a browser-compatible
    /// handshake cannot set an `Authorization` header.
    #[must_use]
    pub fn connection_url(&self, token: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        let url = format!("{}{}", base, path);
        let token: String = url::form_urlencoded::byte_serialize(token.as_bytes()).collect();

        if url.contains('?') {
            format!("{}&token={}", url, token)
        } else {
            format!("{}?token={}", url, token)
        }
    }

    /// Returns the delay before reconnect attempt number `attempt` (1-based).
    ///
    /// Doubles per attempt and saturates at `max_reconnect_delay`.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let factor = 1u32 << exponent;
        self.reconnect_delay
            .checked_mul(factor)
            .unwrap_or(self.max_reconnect_delay)
            .min(self.max_reconnect_delay)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), WsError> {
        if self.base_url.is_empty() {
            return Err(WsError::InvalidConfig(
                "base_url cannot be empty".to_string(),
            ));
        }

        if !self.base_url.starts_with("ws://") && !self.base_url.starts_with("wss://") {
            return Err(WsError::InvalidConfig(
                "base_url must start with ws:// or wss://".to_string(),
            ));
        }

        if self.reconnect_delay.is_zero() {
            return Err(WsError::InvalidConfig(
                "reconnect_delay must be > 0".to_string(),
            ));
        }

        if self.max_reconnect_delay < self.reconnect_delay {
            return Err(WsError::InvalidConfig(
                "max_reconnect_delay must be >= reconnect_delay".to_string(),
            ));
        }

        if self.heartbeat_interval.is_some_and(|i| i.is_zero()) {
            return Err(WsError::InvalidConfig(
                "heartbeat_interval must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
