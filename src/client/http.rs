//! HTTP client implementation.
//!
//! Provides the REST client used for hydration and read acknowledgements.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::debug;

use super::config::ClientConfig;
use super::error::ClientError;
use crate::session::AuthProvider;
use crate::store::ReadAcknowledger;
use crate::types::{Notification, NotificationId};

/// API error response format.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

/// API error details.
#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    message: String,
}

/// Notifications list response.
#[derive(Debug, Deserialize)]
struct NotificationsResponse {
    notifications: Vec<Notification>,
}

/// HTTP client for the Ticketdesk REST API.
///
/// Requests are bearer-authenticated with the token of the session current
/// at request time.
#[derive(Clone)]
pub struct HelpdeskClient {
    config: ClientConfig,
    http: reqwest::Client,
    auth: Arc<dyn AuthProvider>,
}

impl std::fmt::Debug for HelpdeskClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HelpdeskClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HelpdeskClient {
    /// Creates a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be created.
    pub fn new(config: ClientConfig, auth: Arc<dyn AuthProvider>) -> Result<Self, ClientError> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .user_agent(&config.user_agent)
            .build()
            .map_err(ClientError::Request)?;

        Ok(Self { config, http, auth })
    }

    /// Creates a new client with the given base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_base_url(
        base_url: impl Into<String>,
        auth: Arc<dyn AuthProvider>,
    ) -> Result<Self, ClientError> {
        Self::new(ClientConfig::new(base_url), auth)
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn bearer_token(&self) -> Result<String, ClientError> {
        self.auth
            .session()
            .bearer_token()
            .map(str::to_owned)
            .ok_or(ClientError::Unauthorized)
    }

    /// Makes a GET request to the given path and decodes the JSON body.
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.config.url(path);
        let token = self.bearer_token()?;

        let resp = self
            .execute(path, || self.http.get(&url).bearer_auth(&token))
            .await?;

        let body = resp
            .text()
            .await
            .map_err(|e| ClientError::Deserialization(e.to_string()))?;

        serde_json::from_str(&body).map_err(|e| ClientError::Deserialization(e.to_string()))
    }

    /// Makes a PUT request without a body and ignores the response body.
    async fn put_empty(&self, path: &str) -> Result<(), ClientError> {
        let url = self.config.url(path);
        let token = self.bearer_token()?;

        self.execute(path, || self.http.put(&url).bearer_auth(&token))
            .await?;

        Ok(())
    }

    /// Sends a request, retrying timeouts and rate limits.
    async fn execute<F>(&self, path: &str, request_fn: F) -> Result<reqwest::Response, ClientError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut retry_count = 0;

        loop {
            match request_fn().send().await {
                Ok(resp) => {
                    let status = resp.status();

                    if status.is_success() {
                        return Ok(resp);
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = resp
                            .headers()
                            .get("Retry-After")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse().ok());

                        if retry_count < self.config.max_retries {
                            let wait_time = retry_after.unwrap_or(1);
                            debug!(path, wait_time, "Rate limited, retrying");
                            tokio::time::sleep(Duration::from_secs(wait_time)).await;
                            retry_count += 1;
                            continue;
                        }

                        return Err(ClientError::RateLimited { retry_after });
                    }

                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(ClientError::NotFound(path.to_string()));
                    }

                    if status == reqwest::StatusCode::UNAUTHORIZED {
                        return Err(ClientError::Unauthorized);
                    }

                    let body = resp.text().await.unwrap_or_default();
                    if let Ok(error_resp) = serde_json::from_str::<ApiErrorResponse>(&body) {
                        return Err(ClientError::Api {
                            code: error_resp.error.code,
                            message: error_resp.error.message,
                        });
                    }

                    return Err(ClientError::Api {
                        code: status.as_str().to_string(),
                        message: body,
                    });
                }
                Err(e) => {
                    if e.is_timeout() && retry_count < self.config.max_retries {
                        retry_count += 1;
                        debug!(path, retry_count, "Request timed out, retrying");
                        tokio::time::sleep(Duration::from_millis(100 * (1 << retry_count))).await;
                        continue;
                    }
                    return Err(ClientError::from(e));
                }
            }
        }
    }

    /// Gets the user's notifications, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get_notifications(&self) -> Result<Vec<Notification>, ClientError> {
        let response: NotificationsResponse = self.get("/dashboard/notifications").await?;
        Ok(response.notifications)
    }

    /// Acknowledges a notification as read on the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn mark_notification_read(&self, id: NotificationId) -> Result<(), ClientError> {
        self.put_empty(&format!("/dashboard/notifications/{}/read", id))
            .await
    }
}

impl ReadAcknowledger for HelpdeskClient {
    fn acknowledge(&self, id: NotificationId) -> BoxFuture<'_, Result<(), ClientError>> {
        Box::pin(self.mark_notification_read(id))
    }
}
