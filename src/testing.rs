//! Test doubles shared by the unit tests.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::{Sink, Stream};
use tokio::sync::{mpsc, watch, Semaphore};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use crate::client::ClientError;
use crate::metrics::SyncMetrics;
use crate::notice::NoticeSender;
use crate::projector::TicketUpdateProjector;
use crate::router::MessageRouter;
use crate::session::{AuthProvider, AuthState};
use crate::store::{NotificationStore, ReadAcknowledger};
use crate::types::{Notification, NotificationId};
use crate::ws::{
    BoxSocket, ConnectionManager, ConnectionState, Connector, WsConfig, WsError,
};

/// Builds an unread notification with a fixed timestamp.
pub(crate) fn notification(id: NotificationId) -> Notification {
    Notification {
        id,
        title: format!("Notification {}", id),
        message: "body".to_string(),
        ticket_id: None,
        created_at: "2024-01-01T00:00:00Z".parse().expect("timestamp"),
        is_read: false,
    }
}

/// Records acknowledgements; can fail or hold them until released.
pub(crate) struct MockAcknowledger {
    calls: Mutex<Vec<NotificationId>>,
    failing: AtomicBool,
    gate: Option<Semaphore>,
}

impl MockAcknowledger {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            gate: None,
        })
    }

    pub(crate) fn failing() -> Arc<Self> {
        let ack = Self::new();
        ack.set_failing(true);
        ack
    }

    pub(crate) fn gated() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            gate: Some(Semaphore::new(0)),
        })
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub(crate) fn calls(&self) -> Vec<NotificationId> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl ReadAcknowledger for MockAcknowledger {
    fn acknowledge(&self, id: NotificationId) -> BoxFuture<'_, Result<(), ClientError>> {
        Box::pin(async move {
            self.calls.lock().expect("calls lock").push(id);

            if let Some(gate) = &self.gate {
                gate.acquire().await.expect("gate open").forget();
            }

            if self.failing.load(Ordering::SeqCst) {
                Err(ClientError::Api {
                    code: "500".to_string(),
                    message: "unavailable".to_string(),
                })
            } else {
                Ok(())
            }
        })
    }
}

/// Server side of one mock socket.
struct MockServer {
    inbound: Option<mpsc::UnboundedSender<Result<Message, WsError>>>,
    outbound: mpsc::UnboundedReceiver<Message>,
    received: Vec<Message>,
    closed: Arc<AtomicBool>,
}

#[derive(Default)]
struct MockConnectorState {
    urls: Vec<String>,
    servers: Vec<MockServer>,
    fail_next: usize,
    attempts: usize,
}

/// In-memory connector. Every successful connect creates a socket whose
/// server side the test drives by index.
#[derive(Clone, Default)]
pub(crate) struct MockConnector {
    state: Arc<Mutex<MockConnectorState>>,
    live: Arc<AtomicUsize>,
    max_live: Arc<AtomicUsize>,
    gate: Option<Arc<Semaphore>>,
}

impl MockConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Connects block until [`MockConnector::release_connect`].
    pub(crate) fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    pub(crate) fn release_connect(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub(crate) fn fail_next(&self, count: usize) {
        self.lock().fail_next = count;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockConnectorState> {
        self.state.lock().expect("connector lock")
    }

    /// Sockets opened so far.
    pub(crate) fn opened(&self) -> usize {
        self.lock().servers.len()
    }

    /// Connect attempts so far, failed ones included.
    pub(crate) fn attempts(&self) -> usize {
        self.lock().attempts
    }

    /// Sockets currently held by the client.
    pub(crate) fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Highest number of sockets ever held at once.
    pub(crate) fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    pub(crate) fn url(&self, index: usize) -> String {
        self.lock().urls[index].clone()
    }

    fn push(&self, index: usize, item: Result<Message, WsError>) {
        let state = self.lock();
        if let Some(tx) = state.servers[index].inbound.as_ref() {
            let _ = tx.send(item);
        }
    }

    pub(crate) fn push_text(&self, index: usize, text: &str) {
        self.push(index, Ok(Message::Text(text.into())));
    }

    pub(crate) fn close(&self, index: usize, code: u16) {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: "".into(),
        };
        self.push(index, Ok(Message::Close(Some(frame))));
    }

    pub(crate) fn error(&self, index: usize) {
        self.push(index, Err(WsError::Protocol("connection reset".to_string())));
    }

    /// Ends the inbound stream without a close frame.
    pub(crate) fn drop_socket(&self, index: usize) {
        self.lock().servers[index].inbound = None;
    }

    /// Whether the client closed socket `index` through its sink.
    pub(crate) fn closed(&self, index: usize) -> bool {
        self.lock().servers[index].closed.load(Ordering::SeqCst)
    }

    /// Messages the client sent on socket `index`.
    pub(crate) fn sent(&self, index: usize) -> Vec<Message> {
        let mut state = self.lock();
        let server = &mut state.servers[index];
        while let Ok(message) = server.outbound.try_recv() {
            server.received.push(message);
        }
        server.received.clone()
    }
}

impl Connector for MockConnector {
    fn connect(&self, url: String) -> BoxFuture<'static, Result<BoxSocket, WsError>> {
        let connector = self.clone();

        Box::pin(async move {
            if let Some(gate) = &connector.gate {
                gate.acquire().await.expect("gate open").forget();
            }

            let mut state = connector.lock();
            state.attempts += 1;

            if state.fail_next > 0 {
                state.fail_next -= 1;
                return Err(WsError::Connection("connection refused".to_string()));
            }

            let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
            let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

            let closed = Arc::new(AtomicBool::new(false));

            state.urls.push(url);
            state.servers.push(MockServer {
                inbound: Some(inbound_tx),
                outbound: outbound_rx,
                received: Vec::new(),
                closed: Arc::clone(&closed),
            });

            let live = connector.live.fetch_add(1, Ordering::SeqCst) + 1;
            connector.max_live.fetch_max(live, Ordering::SeqCst);

            let socket = MockSocket {
                inbound: inbound_rx,
                outbound: outbound_tx,
                live: Arc::clone(&connector.live),
                closed,
            };

            Ok(Box::pin(socket) as BoxSocket)
        })
    }
}

/// Client side of a mock socket.
struct MockSocket {
    inbound: mpsc::UnboundedReceiver<Result<Message, WsError>>,
    outbound: mpsc::UnboundedSender<Message>,
    live: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl Drop for MockSocket {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Stream for MockSocket {
    type Item = Result<Message, WsError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().inbound.poll_recv(cx)
    }
}

impl Sink<Message> for MockSocket {
    type Error = WsError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), WsError>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: Message) -> Result<(), WsError> {
        self.outbound
            .send(item)
            .map_err(|e| WsError::Protocol(e.to_string()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), WsError>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), WsError>> {
        self.closed.store(true, Ordering::SeqCst);
        Poll::Ready(Ok(()))
    }
}

/// A connection manager wired to mocks.
pub(crate) struct Harness {
    pub(crate) manager: ConnectionManager,
    pub(crate) connector: MockConnector,
    pub(crate) auth: Arc<AuthState>,
    pub(crate) router: Arc<MessageRouter>,
    pub(crate) metrics: Arc<SyncMetrics>,
    pub(crate) notices: NoticeSender,
    pub(crate) ack: Arc<MockAcknowledger>,
}

impl Harness {
    pub(crate) fn config() -> WsConfig {
        WsConfig::new("ws://desk.test").without_heartbeat()
    }

    /// Logged-in harness with the default test config.
    pub(crate) fn new() -> Self {
        Self::with(Self::config(), MockConnector::new())
    }

    pub(crate) fn with(config: WsConfig, connector: MockConnector) -> Self {
        let auth = Arc::new(AuthState::new());
        auth.login("agent@desk", "tok-1");

        let (router, metrics, notices, ack) = router();
        let auth_provider: Arc<dyn AuthProvider> = Arc::clone(&auth) as Arc<dyn AuthProvider>;
        let connector_dyn: Arc<dyn Connector> = Arc::new(connector.clone());

        let manager = ConnectionManager::spawn(
            config,
            connector_dyn,
            auth_provider,
            Arc::clone(&router),
            Arc::clone(&metrics),
            notices.clone(),
        )
        .expect("manager");

        Self {
            manager,
            connector,
            auth,
            router,
            metrics,
            notices,
            ack,
        }
    }

    /// Waits for the manager to reach `state`.
    pub(crate) async fn wait_for(&self, state: ConnectionState) {
        wait_for_state(self.manager.subscribe_state(), state).await;
    }
}

/// Builds a router over a fresh store and projector.
pub(crate) fn router() -> (
    Arc<MessageRouter>,
    Arc<SyncMetrics>,
    NoticeSender,
    Arc<MockAcknowledger>,
) {
    let ack = MockAcknowledger::new();
    let acknowledger: Arc<dyn ReadAcknowledger> = Arc::clone(&ack) as Arc<dyn ReadAcknowledger>;
    let notices = NoticeSender::new();
    let metrics = Arc::new(SyncMetrics::new());
    let store = Arc::new(NotificationStore::new(
        acknowledger,
        notices.clone(),
        Arc::clone(&metrics),
    ));
    let router = Arc::new(MessageRouter::new(
        store,
        Arc::new(TicketUpdateProjector::new()),
        notices.clone(),
        Arc::clone(&metrics),
    ));
    (router, metrics, notices, ack)
}

/// Waits until a state receiver reports `state`, failing after a minute of
/// (possibly paused) time.
pub(crate) async fn wait_for_state(
    mut rx: watch::Receiver<ConnectionState>,
    state: ConnectionState,
) {
    tokio::time::timeout(Duration::from_secs(60), rx.wait_for(|s| *s == state))
        .await
        .expect("state reached in time")
        .expect("manager alive");
}
