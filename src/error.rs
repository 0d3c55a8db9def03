//! Crate-level error type.

use crate::client::ClientError;
use crate::config::ConfigError;
use crate::ws::WsError;

/// Errors surfaced by the sync engine.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// WebSocket layer error.
    #[error("websocket: {0}")]
    Ws(#[from] WsError),

    /// REST layer error.
    #[error("rest: {0}")]
    Client(#[from] ClientError),
}
