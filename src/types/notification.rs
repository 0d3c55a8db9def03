//! Notification types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Notification identifier assigned by the server.
pub type NotificationId = u64;

/// A notification shown in the client's list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Notification ID.
    pub id: NotificationId,

    /// Short title.
    pub title: String,

    /// Body text.
    pub message: String,

    /// Related ticket, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<String>,

    /// Creation time on the server.
    pub created_at: DateTime<Utc>,

    /// Whether the user has read it.
    #[serde(default)]
    pub is_read: bool,
}

impl Notification {
    /// Returns true if the notification is still unread.
    #[must_use]
    pub const fn is_unread(&self) -> bool {
        !self.is_read
    }
}

impl From<NotificationPayload> for Notification {
    fn from(payload: NotificationPayload) -> Self {
        Self {
            id: payload.id,
            title: payload.title,
            message: payload.message,
            ticket_id: payload.ticket_id,
            created_at: payload.created_at,
            is_read: false,
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = if self.is_read { ' ' } else { '*' };
        write!(f, "{} #{} {}", marker, self.id, self.title)
    }
}

/// Payload of a `new_notification` frame.
///
/// Carries no read flag; pushed notifications always arrive unread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// Notification ID.
    pub id: NotificationId,

    /// Short title.
    pub title: String,

    /// Body text.
    pub message: String,

    /// Related ticket, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<String>,

    /// Creation time on the server.
    pub created_at: DateTime<Utc>,
}
