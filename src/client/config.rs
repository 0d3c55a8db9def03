//! REST client settings.

use std::time::Duration;

use super::error::ClientError;

/// Helpdesk API root used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Per-request deadline, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Extra attempts after a timeout or a 429.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// How [`HelpdeskClient`](super::HelpdeskClient) reaches the helpdesk API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// API root, e.g. `https://desk.example.com`. Paths are appended as is.
    pub base_url: String,

    /// Deadline for a single attempt.
    pub timeout: Duration,

    /// Extra attempts after a timeout or a 429; other failures are final.
    pub max_retries: u32,

    /// Sent as `User-Agent`.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            user_agent: format!("ticketdesk-sync/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Default settings against `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Overrides the per-attempt deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the retry budget; `0` disables retries.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Overrides the `User-Agent` header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Joins `path` onto the API root.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Checks that the API root is a usable HTTP(S) URL.
    ///
    /// # Errors
    ///
    /// [`ClientError::InvalidConfig`] naming the offending setting.
    pub fn validate(&self) -> Result<(), ClientError> {
        let scheme_ok = ["http://", "https://"]
            .iter()
            .any(|scheme| self.base_url.starts_with(scheme));

        match (self.base_url.is_empty(), scheme_ok) {
            (true, _) => Err(ClientError::InvalidConfig("api base_url is empty".to_string())),
            (false, false) => Err(ClientError::InvalidConfig(format!(
                "api base_url {:?} is not http(s)",
                self.base_url
            ))),
            (false, true) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_identify_the_crate() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
        assert!(config.user_agent.starts_with("ticketdesk-sync/"));
    }

    #[test]
    fn test_overrides() {
        let config = ClientConfig::new("https://desk.example.com")
            .with_timeout(Duration::from_secs(5))
            .with_max_retries(0)
            .with_user_agent("desk-app/1.0");

        assert_eq!(config.base_url, "https://desk.example.com");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.user_agent, "desk-app/1.0");
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let config = ClientConfig::new("https://desk.example.com/");
        assert_eq!(
            config.url("/dashboard/notifications/4/read"),
            "https://desk.example.com/dashboard/notifications/4/read"
        );
    }

    #[test]
    fn test_validate() {
        assert!(ClientConfig::new("https://desk.example.com").validate().is_ok());
        assert!(ClientConfig::new("http://127.0.0.1:9").validate().is_ok());

        for bad in ["", "ws://desk.example.com", "desk.example.com"] {
            assert!(
                matches!(
                    ClientConfig::new(bad).validate(),
                    Err(ClientError::InvalidConfig(_))
                ),
                "{:?}",
                bad
            );
        }
    }
}
