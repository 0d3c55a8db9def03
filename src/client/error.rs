//! Errors returned by the helpdesk REST client.

use std::fmt;

/// Failure of a helpdesk API call.
#[derive(Debug)]
pub enum ClientError {
    /// The request never produced a usable response (DNS, TLS, reset).
    Request(reqwest::Error),

    /// The response body was not the JSON we expected.
    Deserialization(String),

    /// The server answered with an error status other than the ones below.
    Api {
        /// HTTP status, or the server's own error code when it sent one.
        code: String,
        /// Server-provided description.
        message: String,
    },

    /// HTTP 429 that outlived the retry budget.
    RateLimited {
        /// `Retry-After` in seconds, when the server sent one.
        retry_after: Option<u64>,
    },

    /// HTTP 404 for the given path.
    NotFound(String),

    /// HTTP 401, or no session token to send.
    Unauthorized,

    /// Rejected settings in [`ClientConfig`](super::ClientConfig).
    InvalidConfig(String),

    /// The request timed out on every attempt.
    Timeout,

    /// The background acknowledgement task was cancelled or panicked
    /// before it produced a result.
    AckAborted(String),
}

impl ClientError {
    /// Whether the same call might succeed later. Auth, lookup, decoding and
    /// configuration failures will not.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Request(_) | Self::RateLimited { .. } | Self::Timeout | Self::Api { .. }
        )
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request(e) => write!(f, "helpdesk request failed: {}", e),
            Self::Deserialization(msg) => write!(f, "unexpected response body: {}", msg),
            Self::Api { code, message } => write!(f, "helpdesk error {}: {}", code, message),
            Self::RateLimited {
                retry_after: Some(secs),
            } => write!(f, "rate limited for {}s", secs),
            Self::RateLimited { retry_after: None } => f.write_str("rate limited"),
            Self::NotFound(path) => write!(f, "no such resource: {}", path),
            Self::Unauthorized => f.write_str("not signed in or token rejected"),
            Self::InvalidConfig(msg) => write!(f, "bad client settings: {}", msg),
            Self::Timeout => f.write_str("helpdesk request timed out"),
            Self::AckAborted(msg) => write!(f, "acknowledgement task aborted: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Request(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Request(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_is_retryable() {
        let err = ClientError::Api {
            code: "503".to_string(),
            message: "database unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "helpdesk error 503: database unavailable");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_rate_limited_display() {
        let err = ClientError::RateLimited {
            retry_after: Some(30),
        };
        assert_eq!(err.to_string(), "rate limited for 30s");
        assert!(err.is_retryable());

        let err = ClientError::RateLimited { retry_after: None };
        assert_eq!(err.to_string(), "rate limited");
    }

    #[test]
    fn test_permanent_failures_are_not_retryable() {
        let permanent = [
            ClientError::NotFound("/dashboard/notifications/9/read".to_string()),
            ClientError::Unauthorized,
            ClientError::Deserialization("eof".to_string()),
            ClientError::InvalidConfig("empty".to_string()),
            ClientError::AckAborted("cancelled".to_string()),
        ];
        for err in permanent {
            assert!(!err.is_retryable(), "{}", err);
        }
    }

    #[test]
    fn test_timeout_is_retryable() {
        let err = ClientError::Timeout;
        assert_eq!(err.to_string(), "helpdesk request timed out");
        assert!(err.is_retryable());
    }
}
