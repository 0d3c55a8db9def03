//! HTTP client for the Ticketdesk REST API.
//!
//! The REST API is the source of truth for persisted notifications. This
//! module covers the two endpoints the synchronization layer needs: the
//! notification list used for hydration and the read acknowledgement.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ticketdesk_sync::client::{ClientConfig, HelpdeskClient};
//! use ticketdesk_sync::session::AuthState;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let auth = Arc::new(AuthState::new());
//!     auth.login("agent@desk", "token");
//!
//!     let client = HelpdeskClient::new(ClientConfig::new("https://desk.example.com"), auth)?;
//!     let notifications = client.get_notifications().await?;
//!     println!("{} notifications", notifications.len());
//!
//!     client.mark_notification_read(notifications[0].id).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod http;

pub use config::ClientConfig;
pub use error::ClientError;
pub use http::HelpdeskClient;
