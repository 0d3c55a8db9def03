//! Ticket status types.
//!
//! Ticket updates are transient deltas. The collection of tickets belongs to
//! the consuming views, which merge deltas into their own
//! [`TicketSnapshot`]s.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload of a `ticket_update` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketUpdateEvent {
    /// Ticket ID.
    pub ticket_id: String,

    /// New status.
    pub status: String,

    /// Assignee user ID, if assigned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<u64>,

    /// Server time of the change.
    pub updated_at: DateTime<Utc>,
}

/// A view's copy of one ticket's mutable status fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketSnapshot {
    /// Ticket ID.
    pub ticket_id: String,

    /// Current status.
    pub status: String,

    /// Assignee user ID, if assigned.
    #[serde(default)]
    pub assigned_to: Option<u64>,

    /// Time of the last applied change.
    pub updated_at: DateTime<Utc>,
}

impl TicketSnapshot {
    /// Merges an update using last-write-wins on `updated_at`.
    ///
    /// Returns true if the snapshot changed. Updates for other tickets and
    /// updates older than the snapshot are ignored.
    pub fn apply(&mut self, event: &TicketUpdateEvent) -> bool {
        if event.ticket_id != self.ticket_id || event.updated_at < self.updated_at {
            return false;
        }

        let changed = self.status != event.status
            || self.assigned_to != event.assigned_to
            || self.updated_at != event.updated_at;

        self.status.clone_from(&event.status);
        self.assigned_to = event.assigned_to;
        self.updated_at = event.updated_at;

        changed
    }
}

impl From<TicketUpdateEvent> for TicketSnapshot {
    fn from(event: TicketUpdateEvent) -> Self {
        Self {
            ticket_id: event.ticket_id,
            status: event.status,
            assigned_to: event.assigned_to,
            updated_at: event.updated_at,
        }
    }
}
