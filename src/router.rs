//! Message router.
//!
//! Turns inbound frames into typed messages and hands each to its handler.
//! Frames are dispatched one at a time in the order the transport delivers
//! them.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::metrics::SyncMetrics;
use crate::notice::{Notice, NoticeSender};
use crate::projector::TicketUpdateProjector;
use crate::store::NotificationStore;
use crate::types::Notification;
use crate::ws::messages::{Envelope, InboundMessage};

/// Dispatches inbound messages to the store and the projector.
#[derive(Debug)]
pub struct MessageRouter {
    store: Arc<NotificationStore>,
    projector: Arc<TicketUpdateProjector>,
    notices: NoticeSender,
    metrics: Arc<SyncMetrics>,
}

impl MessageRouter {
    /// Creates a router.
    #[must_use]
    pub fn new(
        store: Arc<NotificationStore>,
        projector: Arc<TicketUpdateProjector>,
        notices: NoticeSender,
        metrics: Arc<SyncMetrics>,
    ) -> Self {
        Self {
            store,
            projector,
            notices,
            metrics,
        }
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

    /// Parses and dispatches a text frame. Malformed frames are dropped.
    ///
    /// Returns the envelope to send back, if the frame calls for one.
    pub async fn dispatch_text(&self, text: &str) -> Option<Envelope> {
        self.metrics.record_frame_received();

        match Envelope::from_text(text) {
            Ok(envelope) => self.dispatch(envelope).await,
            Err(e) => {
                warn!(error = %e, "Dropping malformed frame");
                self.metrics.record_frame_dropped();
                None
            }
        }
    }

    /// Dispatches an envelope. A server `ping` is answered with `pong`.
    pub async fn dispatch(&self, envelope: Envelope) -> Option<Envelope> {
        let message = match InboundMessage::from_envelope(envelope) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Dropping frame with malformed payload");
                self.metrics.record_frame_dropped();
                return None;
            }
        };

        match message {
            InboundMessage::NewNotification(payload) => {
                let notification = Notification::from(payload);
                let id = notification.id;
                let title = notification.title.clone();

                if self.store.add(notification).await {
                    self.metrics.record_notification();
                    self.notices.publish(Notice::NewNotification { id, title });
                }
            }
            InboundMessage::TicketUpdate(event) => {
                self.metrics.record_ticket_update();
                self.projector.publish(event);
            }
            InboundMessage::Ping => {
                trace!("Server ping");
                return Some(Envelope::pong());
            }
            InboundMessage::Pong => {
                trace!("Server pong");
            }
            InboundMessage::Notification(_) | InboundMessage::CommentAdded(_) => {
                debug!("Signal frame without local state");
            }
            InboundMessage::Unknown(kind) => {
                debug!(kind = %kind, "Ignoring unknown message type");
            }
        }

        None
    }
}
