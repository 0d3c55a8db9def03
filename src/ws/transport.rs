//! Socket transport.
//!
//! The connection manager talks to sockets through [`Connector`] so the
//! state machine does not depend on a concrete WebSocket implementation.

use std::pin::Pin;

use futures_util::future::BoxFuture;
use futures_util::{Sink, SinkExt, Stream, TryStreamExt};
use tokio_tungstenite::tungstenite::Message;

use super::error::WsError;

/// A bidirectional WebSocket: a stream of inbound messages and a sink for
/// outbound ones.
pub trait Socket:
    Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Send
{
}

impl<T> Socket for T where
    T: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Send
{
}

/// Boxed socket owned by the connection manager.
pub type BoxSocket = Pin<Box<dyn Socket>>;

/// Opens sockets.
pub trait Connector: Send + Sync + 'static {
    /// Opens a socket to `url`. Resolves once the handshake completes.
    fn connect(&self, url: String) -> BoxFuture<'static, Result<BoxSocket, WsError>>;
}

/// Production connector backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

impl Connector for TungsteniteConnector {
    fn connect(&self, url: String) -> BoxFuture<'static, Result<BoxSocket, WsError>> {
        Box::pin(async move {
            let (ws_stream, _) = tokio_tungstenite::connect_async(url)
                .await
                .map_err(|e| WsError::Connection(e.to_string()))?;

            let socket = ws_stream
                .sink_map_err(WsError::from)
                .map_err(WsError::from);

            Ok(Box::pin(socket) as BoxSocket)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tungstenite_connector_refused() {
        // Port 9 (discard) is not listening on loopback in test environments.
        let result = TungsteniteConnector
            .connect("ws://127.0.0.1:9/api/ws?token=t".to_string())
            .await;
        assert!(matches!(result, Err(WsError::Connection(_))));
    }

    #[tokio::test]
    async fn test_tungstenite_connector_bad_url() {
        let result = TungsteniteConnector.connect("not a url".to_string()).await;
        assert!(result.is_err());
    }
}
