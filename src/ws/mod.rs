//! WebSocket connection layer.
//!
//! This module owns the single push connection to the helpdesk backend:
//! configuration, the wire envelope, the socket transport and the
//! [`ConnectionManager`] state machine that opens, closes and reconnects it.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ticketdesk_sync::ws::{ConnectionManager, TungsteniteConnector, WsConfig};
//!
//! let manager = ConnectionManager::spawn(
//!     WsConfig::new("wss://desk.example.com"),
//!     Arc::new(TungsteniteConnector),
//!     auth,
//!     router,
//!     metrics,
//!     notices,
//! )?;
//!
//! manager.connect();
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod messages;
pub mod transport;

pub use config::WsConfig;
pub use connection::{ConnectionManager, ConnectionState, DownReason};
pub use error::WsError;
pub use messages::{Envelope, InboundMessage, MessageType};
pub use transport::{BoxSocket, Connector, Socket, TungsteniteConnector};
