//! User-facing advisories.
//!
//! Notices are fire-and-forget: they are broadcast to whoever renders them
//! and silently dropped when nobody listens.

use tokio::sync::broadcast;
use tracing::trace;

use crate::types::NotificationId;

/// Capacity of the notice broadcast buffer.
pub const NOTICE_CAPACITY: usize = 64;

/// An advisory for the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A notification arrived over the stream.
    NewNotification {
        /// Notification ID.
        id: NotificationId,
        /// Notification title.
        title: String,
    },

    /// A read acknowledgement failed and was rolled back. Retry by marking
    /// the notification as read again.
    ReadAckFailed {
        /// Notification ID.
        id: NotificationId,
        /// Failure description.
        reason: String,
        /// Whether marking it read again may succeed.
        retryable: bool,
    },

    /// The server rejected the connection's credentials.
    ConnectionRejected {
        /// Close code sent by the server.
        code: u16,
    },
}

/// Sending half of the notice channel.
#[derive(Debug, Clone)]
pub struct NoticeSender {
    tx: broadcast::Sender<Notice>,
}

impl Default for NoticeSender {
    fn default() -> Self {
        Self::new()
    }
}

impl NoticeSender {
    /// Creates a new notice channel.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(NOTICE_CAPACITY);
        Self { tx }
    }

    /// Publishes a notice.
    pub fn publish(&self, notice: Notice) {
        if self.tx.send(notice).is_err() {
            trace!("No notice subscribers");
        }
    }

    /// Subscribes to notices published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let notices = NoticeSender::new();
        let mut rx = notices.subscribe();

        notices.publish(Notice::NewNotification {
            id: 1,
            title: "X".to_string(),
        });

        let notice = rx.recv().await.expect("notice");
        assert_eq!(
            notice,
            Notice::NewNotification {
                id: 1,
                title: "X".to_string()
            }
        );
    }

    #[test]
    fn test_publish_without_subscribers() {
        let notices = NoticeSender::default();
        notices.publish(Notice::ConnectionRejected { code: 4401 });
    }
}
