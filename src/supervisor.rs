//! Session supervisor.
//!
//! Follows the auth provider and keeps exactly one [`ConnectionManager`]
//! per authenticated session. When the session ends or changes, the old
//! manager is shut down (socket closed, timer cancelled, task joined)
//! before a new one is constructed.

use std::future::pending;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::metrics::SyncMetrics;
use crate::notice::NoticeSender;
use crate::router::MessageRouter;
use crate::session::{AuthProvider, Session};
use crate::ws::{ConnectionManager, ConnectionState, Connector, Envelope, WsConfig, WsError};

enum Command {
    Send(Envelope),
    Shutdown(oneshot::Sender<()>),
}

/// Handle to the supervisor task.
#[derive(Debug)]
pub struct SessionSupervisor {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    task: JoinHandle<()>,
}

impl SessionSupervisor {
    /// Spawns the supervisor. It immediately applies the current session,
    /// connecting if a user is already logged in.
    ///
    /// # Errors
    ///
    /// Returns an error if the WebSocket configuration is invalid.
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

        let task = SupervisorTask {
            changes: auth.changes(),
            config,
            connector,
            auth,
            router,
            metrics,
            notices,
            commands: commands_rx,
            state: state_tx,
            active: None,
        };

        Ok(Self {
            commands: commands_tx,
            state: state_rx,
            task: tokio::spawn(task.run()),
        })
    }

    /// Returns the state of the current session's connection.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Subscribes to connection state changes across sessions.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Sends an envelope on the current connection, if one is open.
    pub fn send(&self, envelope: Envelope) {
        let _ = self.commands.send(Command::Send(envelope));
    }

    /// Shuts down the current manager and stops following the session.
    pub async fn shutdown(self) {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Shutdown(tx)).is_ok() {
            let _ = rx.await;
        }
        if let Err(e) = self.task.await {
            warn!(error = %e, "Supervisor task ended abnormally");
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SessionKey {
    identity: Option<String>,
    token: String,
}

impl SessionKey {
    fn of(session: &Session) -> Option<Self> {
        session.bearer_token().map(|token| Self {
            identity: session.identity.clone(),
            token: token.to_string(),
        })
    }
}

struct ActiveSession {
    key: SessionKey,
    manager: ConnectionManager,
    state: watch::Receiver<ConnectionState>,
}

struct SupervisorTask {
    changes: watch::Receiver<Session>,
    config: WsConfig,
    connector: Arc<dyn Connector>,
    auth: Arc<dyn AuthProvider>,
    router: Arc<MessageRouter>,
    metrics: Arc<SyncMetrics>,
    notices: NoticeSender,
    commands: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<ConnectionState>,
    active: Option<ActiveSession>,
}

impl SupervisorTask {
    async fn run(mut self) {
        let session = self.changes.borrow_and_update().clone();
        self.apply(session).await;

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Send(envelope)) => {
                        if let Some(active) = &self.active {
                            active.manager.send(envelope);
                        }
                    }
                    Some(Command::Shutdown(ack)) => {
                        self.retire(None).await;
                        let _ = ack.send(());
                        break;
                    }
                    None => {
                        self.retire(None).await;
                        break;
                    }
                },
                changed = self.changes.changed() => {
                    if changed.is_err() {
                        debug!("Auth provider dropped");
                        self.retire(None).await;
                        break;
                    }
                    let session = self.changes.borrow_and_update().clone();
                    self.apply(session).await;
                }
                state = next_state(&mut self.active) => {
                    self.state.send_replace(state);
                }
            }
        }

        debug!("Supervisor stopped");
    }

    async fn apply(&mut self, session: Session) {
        let next = SessionKey::of(&session);
        if self.active.as_ref().map(|active| &active.key) == next.as_ref() {
            return;
        }

        self.retire(next.as_ref()).await;

        let Some(key) = next else {
            return;
        };

        let manager = match ConnectionManager::spawn(
            self.config.clone(),
            Arc::clone(&self.connector),
            Arc::clone(&self.auth),
            Arc::clone(&self.router),
            Arc::clone(&self.metrics),
            self.notices.clone(),
        ) {
            Ok(manager) => manager,
            Err(e) => {
                warn!(error = %e, "Failed to start connection manager");
                return;
            }
        };

        info!(identity = ?key.identity, "Session started, connecting");
        manager.connect();
        let state = manager.subscribe_state();
        self.active = Some(ActiveSession {
            key,
            manager,
            state,
        });
    }

    /// Shuts down the active manager. The store is cleared unless the next
    /// session belongs to the same user.
    async fn retire(&mut self, next: Option<&SessionKey>) {
        let Some(active) = self.active.take() else {
            return;
        };

        active.manager.shutdown().await;
        self.state.send_replace(ConnectionState::Disconnected);

        let same_user = next.is_some_and(|key| key.identity == active.key.identity);
        if same_user {
            debug!(identity = ?active.key.identity, "Session renewed");
        } else {
            self.router.store().clear().await;
            info!(identity = ?active.key.identity, "Session ended");
        }
    }
}

async fn next_state(active: &mut Option<ActiveSession>) -> ConnectionState {
    match active {
        Some(active) => {
            if active.state.changed().await.is_err() {
                return pending().await;
            }
            *active.state.borrow_and_update()
        }
        None => pending().await,
    }
}
