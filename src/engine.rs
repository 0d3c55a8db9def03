//! Sync engine.
//!
//! Wires the REST client, store, projector, router, metrics, notices and
//! session supervisor together. This is the entry point for hosts.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ticketdesk_sync::{AuthState, SyncConfig, SyncEngine};
//!
//! let auth = Arc::new(AuthState::new());
//! let engine = SyncEngine::start(SyncConfig::from_env()?, auth.clone())?;
//!
//! auth.login("agent@desk", token);
//! let mut notices = engine.subscribe_notices();
//! while let Ok(notice) = notices.recv().await {
//!     println!("{:?}", notice);
//! }
//! ```

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::info;

use crate::client::HelpdeskClient;
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::metrics::{SyncMetrics, SyncMetricsSnapshot};
use crate::notice::{Notice, NoticeSender};
use crate::projector::TicketUpdateProjector;
use crate::router::MessageRouter;
use crate::session::AuthProvider;
use crate::store::{MarkRead, NotificationStore, ReadAcknowledger};
use crate::supervisor::SessionSupervisor;
use crate::types::{NotificationId, TicketUpdateEvent};
use crate::ws::{ConnectionState, Connector, Envelope, TungsteniteConnector};

/// Builder for [`SyncEngine`] with replaceable transport and
/// acknowledgement.
pub struct SyncEngineBuilder {
    config: SyncConfig,
    auth: Arc<dyn AuthProvider>,
    connector: Arc<dyn Connector>,
    acknowledger: Option<Arc<dyn ReadAcknowledger>>,
}

impl std::fmt::Debug for SyncEngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngineBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SyncEngineBuilder {
    /// Uses a custom socket connector.
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    /// Acknowledges reads through `acknowledger` instead of the REST
    /// client.
    #[must_use]
    pub fn acknowledger(mut self, acknowledger: Arc<dyn ReadAcknowledger>) -> Self {
        self.acknowledger = Some(acknowledger);
        self
    }

    /// Builds the engine and starts following the session.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be created.
    pub fn start(self) -> Result<SyncEngine, SyncError> {
        self.config.validate()?;

        let client = Arc::new(HelpdeskClient::new(
            self.config.api.clone(),
            Arc::clone(&self.auth),
        )?);
        let acknowledger = match self.acknowledger {
            Some(acknowledger) => acknowledger,
            None => Arc::clone(&client) as Arc<dyn ReadAcknowledger>,
        };

        let notices = NoticeSender::new();
        let metrics = Arc::new(SyncMetrics::new());
        let store = Arc::new(NotificationStore::new(
            acknowledger,
            notices.clone(),
            Arc::clone(&metrics),
        ));
        let projector = Arc::new(TicketUpdateProjector::new());
        let router = Arc::new(MessageRouter::new(
            Arc::clone(&store),
            Arc::clone(&projector),
            notices.clone(),
            Arc::clone(&metrics),
        ));

        let supervisor = SessionSupervisor::spawn(
            self.config.ws.clone(),
            self.connector,
            self.auth,
            router,
            Arc::clone(&metrics),
            notices.clone(),
        )?;

        info!(
            ws_url = %self.config.ws.base_url,
            api_url = %self.config.api.base_url,
            "Sync engine started"
        );

        Ok(SyncEngine {
            client,
            store,
            projector,
            notices,
            metrics,
            supervisor,
        })
    }
}

/// Running sync engine.
#[derive(Debug)]
pub struct SyncEngine {
    client: Arc<HelpdeskClient>,
    store: Arc<NotificationStore>,
    projector: Arc<TicketUpdateProjector>,
    notices: NoticeSender,
    metrics: Arc<SyncMetrics>,
    supervisor: SessionSupervisor,
}

impl SyncEngine {
    /// Returns a builder using the production WebSocket connector and the
    /// REST client for acknowledgements.
    #[must_use]
    pub fn builder(config: SyncConfig, auth: Arc<dyn AuthProvider>) -> SyncEngineBuilder {
        SyncEngineBuilder {
            config,
            auth,
            connector: Arc::new(TungsteniteConnector),
            acknowledger: None,
        }
    }

    /// Starts an engine with the production connector and REST client.
    ///
    /// # Errors
    ///
    /// See [`SyncEngineBuilder::start`].
    pub fn start(config: SyncConfig, auth: Arc<dyn AuthProvider>) -> Result<Self, SyncError> {
        Self::builder(config, auth).start()
    }

    /// Returns the notification store.
    #[must_use]
    pub fn store(&self) -> &Arc<NotificationStore> {
        &self.store
    }

    /// Returns the ticket projector.
    #[must_use]
    pub fn projector(&self) -> &Arc<TicketUpdateProjector> {
        &self.projector
    }

    /// Returns the REST client.
    #[must_use]
    pub fn client(&self) -> &Arc<HelpdeskClient> {
        &self.client
    }

    /// Returns the metrics.
    #[must_use]
    pub fn metrics(&self) -> &Arc<SyncMetrics> {
        &self.metrics
    }

    /// Returns a point-in-time copy of the metrics.
    #[must_use]
    pub fn metrics_snapshot(&self) -> SyncMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Subscribes to notices.
    #[must_use]
    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    /// Subscribes to ticket updates.
    #[must_use]
    pub fn subscribe_ticket_updates(&self) -> watch::Receiver<Option<TicketUpdateEvent>> {
        self.projector.subscribe()
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.supervisor.state()
    }

    /// Subscribes to connection state changes.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.supervisor.subscribe_state()
    }

    /// Marks a notification as read. See [`NotificationStore::mark_as_read`].
    pub async fn mark_as_read(&self, id: NotificationId) -> MarkRead {
        self.store.mark_as_read(id).await
    }

    /// Replaces the store with the server's notification list.
    ///
    /// Returns the number of notifications loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails; the store is left unchanged.
    pub async fn refresh(&self) -> Result<usize, SyncError> {
        let notifications = self.client.get_notifications().await?;
        let count = notifications.len();
        self.store.hydrate(notifications).await;
        Ok(count)
    }

    /// Sends an envelope on the open connection, if any.
    pub fn send(&self, envelope: Envelope) {
        self.supervisor.send(envelope);
    }

    /// Closes the connection and stops following the session.
    pub async fn shutdown(self) {
        self.supervisor.shutdown().await;
        info!("Sync engine stopped");
    }
}
