//! Ticket update projector.
//!
//! Relays ticket status deltas to interested views. Only the latest event is
//! retained: a view that has not looked yet sees the newest update and the
//! superseded ones are gone. Views own their tickets and merge with
//! [`TicketSnapshot::apply`](crate::types::TicketSnapshot::apply).

use tokio::sync::watch;
use tracing::debug;

use crate::types::TicketUpdateEvent;

/// Publishes the most recent ticket update.
#[derive(Debug)]
pub struct TicketUpdateProjector {
    tx: watch::Sender<Option<TicketUpdateEvent>>,
}

impl Default for TicketUpdateProjector {
    fn default() -> Self {
        Self::new()
    }
}

impl TicketUpdateProjector {
    /// Creates a projector with no update yet.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Publishes an update, superseding any previous one.
    pub fn publish(&self, event: TicketUpdateEvent) {
        debug!(
            ticket_id = %event.ticket_id,
            status = %event.status,
            "Ticket update"
        );
        self.tx.send_replace(Some(event));
    }

    /// Returns the most recent update.
    #[must_use]
    pub fn latest(&self) -> Option<TicketUpdateEvent> {
        self.tx.borrow().clone()
    }

    /// Subscribes to updates.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<TicketUpdateEvent>> {
        self.tx.subscribe()
    }

    /// Returns the number of subscribed views.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
