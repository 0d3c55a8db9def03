//! Connection manager.
//!
//! A single task owns the socket. Callers talk to it through
//! [`ConnectionManager`], which forwards commands over a channel, so every
//! transition (open, close, error, timer, command) is applied sequentially
//! by one owner. At most one socket exists per manager and at most one
//! reconnect timer is pending at any time.

use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, trace, warn};

use super::config::WsConfig;
use super::error::WsError;
use super::messages::Envelope;
use super::transport::{BoxSocket, Connector};
use crate::metrics::SyncMetrics;
use crate::notice::{Notice, NoticeSender};
use crate::router::MessageRouter;
use crate::session::AuthProvider;

/// Close code for a normal closure.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code reported when a close frame carries no status.
pub const NO_STATUS_RECEIVED: u16 = 1005;

/// How long a client-initiated close may take before the socket is dropped.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No socket, no handshake in progress.
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Socket open.
    Open,
    /// Client-initiated close in progress.
    Closing,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Closing => write!(f, "closing"),
        }
    }
}

/// Why a socket went down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownReason {
    /// The peer sent a close frame.
    Closed {
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
    /// The stream ended without a close frame.
    Dropped,
    /// The socket reported an error.
    Error(WsError),
    /// The handshake failed.
    OpenFailed(WsError),
}

impl DownReason {
    /// Returns the close code, if the peer sent one.
    #[must_use]
    pub fn close_code(&self) -> Option<u16> {
        match self {
            Self::Closed { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns true for a normal (1000) closure.
    #[must_use]
    pub fn is_normal_closure(&self) -> bool {
        self.close_code() == Some(NORMAL_CLOSURE)
    }
}

impl std::fmt::Display for DownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed { code, reason } if reason.is_empty() => write!(f, "closed ({})", code),
            Self::Closed { code, reason } => write!(f, "closed ({}): {}", code, reason),
            Self::Dropped => write!(f, "stream ended"),
            Self::Error(e) => write!(f, "socket error: {}", e),
            Self::OpenFailed(e) => write!(f, "open failed: {}", e),
        }
    }
}

enum Command {
    Connect,
    Send(Envelope),
    Disconnect(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Handle to the connection task.
///
/// Dropping the handle stops the task and closes its socket.
#[derive(Debug)]
pub struct ConnectionManager {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    task: JoinHandle<()>,
}

impl ConnectionManager {
    /// Spawns the connection task. The manager starts disconnected.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn spawn(
        config: WsConfig,
        connector: Arc<dyn Connector>,
        auth: Arc<dyn AuthProvider>,
        router: Arc<MessageRouter>,
        metrics: Arc<SyncMetrics>,
        notices: NoticeSender,
    ) -> Result<Self, WsError> {
        config.validate()?;

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let task = ConnectionTask {
            config,
            connector,
            auth,
            router,
            metrics,
            notices,
            commands: commands_rx,
            state: state_tx,
            socket: None,
            connecting: None,
            reconnect_timer: None,
            heartbeat: None,
            reconnect_attempt: 0,
            generation: 0,
            live_generation: None,
        };

        Ok(Self {
            commands: commands_tx,
            state: state_rx,
            task: tokio::spawn(task.run()),
        })
    }

    /// Opens the connection.
    ///
    /// No-op while open or connecting, or when the session has no token.
    pub fn connect(&self) {
        let _ = self.commands.send(Command::Connect);
    }

    /// Closes the connection with a normal closure and cancels any pending
    /// reconnect. Returns once the task has applied the close.
    pub async fn disconnect(&self) {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Disconnect(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    /// Sends an envelope. Silently dropped unless the connection is open.
    pub fn send(&self, envelope: Envelope) {
        let _ = self.commands.send(Command::Send(envelope));
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Returns true if the socket is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Subscribes to state changes.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Disconnects and waits for the task to finish. Nothing the manager
    /// started (socket, handshake, timer) outlives this call.
    pub async fn shutdown(self) {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Shutdown(tx)).is_ok() {
            let _ = rx.await;
        }
        if let Err(e) = self.task.await {
            warn!(error = %e, "Connection task ended abnormally");
        }
    }
}

struct ConnectionTask {
    config: WsConfig,
    connector: Arc<dyn Connector>,
    auth: Arc<dyn AuthProvider>,
    router: Arc<MessageRouter>,
    metrics: Arc<SyncMetrics>,
    notices: NoticeSender,
    commands: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<ConnectionState>,
    socket: Option<BoxSocket>,
    connecting: Option<BoxFuture<'static, Result<BoxSocket, WsError>>>,
    reconnect_timer: Option<Pin<Box<Sleep>>>,
    heartbeat: Option<Interval>,
    /// Consecutive reconnects since the last successful open.
    reconnect_attempt: u32,
    /// Incremented for every socket instance.
    generation: u64,
    /// The socket instance whose down transition has not run yet.
    live_generation: Option<u64>,
}

impl ConnectionTask {
    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Connect) => self.connect(),
                    Some(Command::Send(envelope)) => self.send(envelope).await,
                    Some(Command::Disconnect(ack)) => {
                        self.disconnect().await;
                        let _ = ack.send(());
                    }
                    Some(Command::Shutdown(ack)) => {
                        self.disconnect().await;
                        let _ = ack.send(());
                        break;
                    }
                    None => {
                        self.disconnect().await;
                        break;
                    }
                },
                result = next_open(&mut self.connecting) => {
                    self.connecting = None;
                    match result {
                        Ok(socket) => self.on_open(socket),
                        Err(e) => self.on_socket_down(self.generation, DownReason::OpenFailed(e)),
                    }
                }
                frame = next_frame(&mut self.socket) => self.on_frame(frame).await,
                () = next_timer(&mut self.reconnect_timer) => {
                    self.reconnect_timer = None;
                    debug!(attempt = self.reconnect_attempt, "Reconnect timer fired");
                    self.connect();
                }
                () = next_tick(&mut self.heartbeat) => self.send(Envelope::ping()).await,
            }
        }

        debug!("Connection task stopped");
    }

    fn current_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn set_state(&self, next: ConnectionState) {
        self.state.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            trace!(from = %state, to = %next, "Connection state changed");
            *state = next;
            true
        });
    }

    fn connect(&mut self) {
        match self.current_state() {
            ConnectionState::Open | ConnectionState::Connecting => {
                debug!("Already connected, ignoring connect");
                return;
            }
            ConnectionState::Disconnected | ConnectionState::Closing => {}
        }

        let session = self.auth.session();
        let Some(token) = session.bearer_token() else {
            debug!("No session token, not connecting");
            return;
        };

        // An explicit connect supersedes a scheduled one.
        self.reconnect_timer = None;

        self.generation += 1;
        self.live_generation = Some(self.generation);

        let url = self.config.connection_url(token);
        self.connecting = Some(self.connector.connect(url));
        self.set_state(ConnectionState::Connecting);

        debug!(
            generation = self.generation,
            attempt = self.reconnect_attempt,
            "Opening WebSocket"
        );
    }

    fn on_open(&mut self, socket: BoxSocket) {
        self.socket = Some(socket);
        self.reconnect_attempt = 0;
        self.metrics.record_socket_opened();

        self.heartbeat = self.config.heartbeat_interval.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        self.set_state(ConnectionState::Open);
        info!(generation = self.generation, "WebSocket connected");
    }

    async fn on_frame(&mut self, frame: Option<Result<Message, WsError>>) {
        let generation = self.generation;

        match frame {
            Some(Ok(Message::Text(text))) => {
                if let Some(reply) = self.router.dispatch_text(text.as_str()).await {
                    self.send(reply).await;
                }
            }
            Some(Ok(Message::Close(frame))) => {
                let reason = match frame {
                    Some(frame) => DownReason::Closed {
                        code: u16::from(frame.code),
                        reason: frame.reason.as_str().to_string(),
                    },
                    None => DownReason::Closed {
                        code: NO_STATUS_RECEIVED,
                        reason: String::new(),
                    },
                };
                // Flush the close reply before the socket is dropped.
                if let Some(mut socket) = self.socket.take() {
                    match tokio::time::timeout(CLOSE_TIMEOUT, socket.close()).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => debug!(error = %e, "Close handshake not completed"),
                        Err(_) => debug!("Close handshake timed out"),
                    }
                }
                self.on_socket_down(generation, reason);
            }
            Some(Ok(Message::Binary(data))) => {
                debug!(len = data.len(), "Ignoring binary frame");
            }
            Some(Ok(_)) => trace!("Control frame"),
            Some(Err(e)) => self.on_socket_down(generation, DownReason::Error(e)),
            None => self.on_socket_down(generation, DownReason::Dropped),
        }
    }

    /// Applies the down transition of socket `generation` exactly once and
    /// decides whether to reconnect.
    fn on_socket_down(&mut self, generation: u64, reason: DownReason) {
        if self.live_generation != Some(generation) {
            debug!(generation, reason = %reason, "Ignoring event from a retired socket");
            return;
        }
        self.live_generation = None;

        self.socket = None;
        self.connecting = None;
        self.heartbeat = None;
        self.set_state(ConnectionState::Disconnected);

        if matches!(reason, DownReason::OpenFailed(_)) {
            self.metrics.record_connect_failure();
        }

        if reason.is_normal_closure() {
            info!("WebSocket closed normally");
            return;
        }

        if let Some(code) = self.config.auth_failure_close_code {
            if reason.close_code() == Some(code) {
                warn!(code, "Server rejected credentials, not reconnecting");
                self.notices.publish(Notice::ConnectionRejected { code });
                return;
            }
        }

        if self.auth.session().bearer_token().is_none() {
            info!(reason = %reason, "WebSocket down after logout, not reconnecting");
            return;
        }

        let attempt = self.reconnect_attempt.saturating_add(1);
        if let Some(max) = self.config.max_reconnect_attempts {
            if attempt > max {
                warn!(attempts = max, reason = %reason, "Giving up reconnecting");
                return;
            }
        }
        self.reconnect_attempt = attempt;

        let delay = self.config.backoff_delay(attempt);
        self.reconnect_timer = Some(Box::pin(tokio::time::sleep(delay)));
        self.metrics.record_reconnect_scheduled();

        warn!(
            reason = %reason,
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "WebSocket down, reconnect scheduled"
        );
    }

    async fn send(&mut self, envelope: Envelope) {
        if self.current_state() != ConnectionState::Open {
            debug!(kind = %envelope.kind, "Not connected, dropping outbound message");
            return;
        }
        let Some(socket) = self.socket.as_mut() else {
            return;
        };

        let text = match envelope.to_text() {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Failed to encode outbound message");
                return;
            }
        };

        let result = socket.send(Message::Text(text.into())).await;
        match result {
            Ok(()) => self.metrics.record_frame_sent(),
            Err(e) => {
                let generation = self.generation;
                self.on_socket_down(generation, DownReason::Error(e));
            }
        }
    }

    async fn disconnect(&mut self) {
        self.reconnect_timer = None;
        self.connecting = None;
        self.heartbeat = None;
        self.live_generation = None;
        self.reconnect_attempt = 0;

        if let Some(mut socket) = self.socket.take() {
            self.set_state(ConnectionState::Closing);

            let frame = CloseFrame {
                code: CloseCode::Normal,
                reason: "".into(),
            };
            match tokio::time::timeout(CLOSE_TIMEOUT, socket.send(Message::Close(Some(frame))))
                .await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(error = %e, "Close frame not delivered"),
                Err(_) => debug!("Close frame timed out"),
            }

            info!("WebSocket closed by client");
        }

        self.set_state(ConnectionState::Disconnected);
    }
}

async fn next_open(
    connecting: &mut Option<BoxFuture<'static, Result<BoxSocket, WsError>>>,
) -> Result<BoxSocket, WsError> {
    match connecting {
        Some(future) => future.await,
        None => pending().await,
    }
}

async fn next_frame(socket: &mut Option<BoxSocket>) -> Option<Result<Message, WsError>> {
    match socket {
        Some(socket) => socket.next().await,
        None => pending().await,
    }
}

async fn next_timer(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.await,
        None => pending().await,
    }
}

async fn next_tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}
