//! Ticketdesk Sync listener binary.
//!
//! Logs in with a token from the environment, keeps the notification
//! stream connected and logs every notice until Ctrl-C.

use std::env;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ticketdesk_sync::{AuthProvider, AuthState, Notice, SyncConfig, SyncEngine};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ticketdesk_sync=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = SyncConfig::from_env().context("invalid TICKETDESK_* configuration")?;
    let token = env::var("TICKETDESK_TOKEN").context("TICKETDESK_TOKEN must be set")?;
    let identity = env::var("TICKETDESK_IDENTITY").unwrap_or_else(|_| "cli".to_string());

    tracing::info!("Starting Ticketdesk Sync");
    tracing::info!("WebSocket URL: {}", config.ws.base_url);
    tracing::info!("API URL: {}", config.api.base_url);

    let auth = Arc::new(AuthState::new());
    let engine = SyncEngine::start(config, Arc::clone(&auth) as Arc<dyn AuthProvider>)?;
    let mut notices = engine.subscribe_notices();

    auth.login(identity, token);

    match engine.refresh().await {
        Ok(count) => tracing::info!(count, "Loaded notifications"),
        Err(e) => tracing::warn!(error = %e, "Could not load notifications"),
    }

    loop {
        tokio::select! {
            notice = notices.recv() => match notice {
                Ok(Notice::NewNotification { id, title }) => {
                    tracing::info!(id, %title, "New notification");
                }
                Ok(Notice::ReadAckFailed { id, reason, retryable }) => {
                    tracing::warn!(id, %reason, retryable, "Marking notification as read failed");
                }
                Ok(Notice::ConnectionRejected { code }) => {
                    tracing::error!(code, "Server rejected the session");
                    break;
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Notice stream lagged");
                }
                Err(RecvError::Closed) => break,
            },
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl-C")?;
                break;
            }
        }
    }

    tracing::info!("Shutting down Ticketdesk Sync");
    auth.logout();
    let metrics = engine.metrics_snapshot();
    engine.shutdown().await;
    tracing::info!(
        notifications = metrics.notifications_received,
        ticket_updates = metrics.ticket_updates,
        reconnects = metrics.reconnects_scheduled,
        "Session summary"
    );

    Ok(())
}
