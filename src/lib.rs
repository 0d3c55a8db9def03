//! Ticketdesk Sync - real-time notification and ticket-status client.
//!
//! This crate keeps a helpdesk client in sync with the backend over a single
//! authenticated WebSocket: it opens the socket on login and closes it on
//! logout, reconnects after abnormal closes, routes pushed messages, keeps
//! an in-memory notification list with optimistic read state, and relays
//! ticket-status deltas to views.
//!
//! # Components
//!
//! - [`ws`]: WebSocket configuration, envelope, transport and the
//!   [`ConnectionManager`] state machine
//! - [`supervisor`]: one connection manager per authenticated session
//! - [`router`]: inbound message dispatch
//! - [`store`]: notification store with optimistic read acknowledgement
//! - [`projector`]: ticket update relay
//! - [`client`]: REST client for hydration and acknowledgements
//! - [`engine`]: facade wiring everything together
//! - [`notice`], [`metrics`]: advisories and counters
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ticketdesk_sync::{AuthState, SyncConfig, SyncEngine};
//!
//! let auth = Arc::new(AuthState::new());
//! let engine = SyncEngine::start(SyncConfig::from_env()?, auth.clone())?;
//! auth.login("agent@desk", token);
//! ```

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod notice;
pub mod projector;
pub mod router;
pub mod session;
pub mod store;
pub mod supervisor;
pub mod types;
pub mod ws;

#[cfg(test)]
mod testing;

pub use client::{ClientConfig, ClientError, HelpdeskClient};
pub use config::{ConfigError, SyncConfig};
pub use engine::{SyncEngine, SyncEngineBuilder};
pub use error::SyncError;
pub use metrics::{SyncMetrics, SyncMetricsSnapshot};
pub use notice::{Notice, NoticeSender};
pub use projector::TicketUpdateProjector;
pub use router::MessageRouter;
pub use session::{AuthProvider, AuthState, Session};
pub use store::{MarkRead, NotificationStore, ReadAcknowledger};
pub use supervisor::SessionSupervisor;
pub use types::{Notification, NotificationId, NotificationPayload, TicketSnapshot, TicketUpdateEvent};
pub use ws::{ConnectionManager, ConnectionState, Connector, Envelope, WsConfig, WsError};
