//! Notification store.
//!
//! Ordered, in-memory list of notifications, newest first. Read state is
//! updated optimistically and reconciled with the server in the background.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::ClientError;
use crate::metrics::SyncMetrics;
use crate::notice::{Notice, NoticeSender};
use crate::types::{Notification, NotificationId};

/// Acknowledges read notifications with the source of truth.
pub trait ReadAcknowledger: Send + Sync + 'static {
    /// Records notification `id` as read on the server.
    fn acknowledge(&self, id: NotificationId) -> BoxFuture<'_, Result<(), ClientError>>;
}

/// Outcome of [`NotificationStore::mark_as_read`].
#[derive(Debug)]
pub enum MarkRead {
    /// No notification with that ID is held.
    NotFound,

    /// Already read (or an acknowledgement is in flight); nothing was sent.
    AlreadyRead,

    /// Marked read locally; the acknowledgement runs in the background.
    /// On failure the flag has already been reverted when the handle
    /// resolves.
    Pending(JoinHandle<Result<(), ClientError>>),
}

impl MarkRead {
    /// Waits for the acknowledgement, if one was issued.
    ///
    /// # Errors
    ///
    /// Returns the acknowledgement error after the rollback was applied.
    pub async fn settled(self) -> Result<(), ClientError> {
        match self {
            Self::Pending(handle) => handle
                .await
                .unwrap_or_else(|e| Err(ClientError::AckAborted(e.to_string()))),
            Self::NotFound | Self::AlreadyRead => Ok(()),
        }
    }
}

/// Entries plus the IDs whose acknowledgement has not settled.
#[derive(Debug, Default)]
struct Entries {
    /// Newest first.
    list: VecDeque<Notification>,

    /// Locally read, not yet confirmed or rejected by the server.
    pending_acks: HashSet<NotificationId>,
}

impl Entries {
    fn find_mut(&mut self, id: NotificationId) -> Option<&mut Notification> {
        self.list.iter_mut().find(|n| n.id == id)
    }
}

/// In-memory notification list.
pub struct NotificationStore {
    entries: RwLock<Entries>,

    /// Server-side read acknowledgement.
    acknowledger: Arc<dyn ReadAcknowledger>,

    /// Advisory channel.
    notices: NoticeSender,

    /// Metrics.
    metrics: Arc<SyncMetrics>,
}

impl std::fmt::Debug for NotificationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationStore").finish_non_exhaustive()
    }
}

impl NotificationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new(
        acknowledger: Arc<dyn ReadAcknowledger>,
        notices: NoticeSender,
        metrics: Arc<SyncMetrics>,
    ) -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
            acknowledger,
            notices,
            metrics,
        }
    }

    /// Prepends a notification as unread.
    ///
    /// Returns false if a notification with the same ID is already held;
    /// redelivered frames do not create duplicates.
    pub async fn add(&self, mut notification: Notification) -> bool {
        let mut entries = self.entries.write().await;

        if entries.list.iter().any(|n| n.id == notification.id) {
            debug!(id = notification.id, "Duplicate notification ignored");
            return false;
        }

        notification.is_read = false;
        entries.list.push_front(notification);
        true
    }

    /// Replaces the contents with a server snapshot, kept in the order
    /// given (newest first).
    ///
    /// A notification whose acknowledgement is still in flight stays read
    /// even if the snapshot predates it. One the snapshot already reports
    /// as read is no longer rolled back should that acknowledgement fail.
    pub async fn hydrate(&self, notifications: Vec<Notification>) {
        let mut entries = self.entries.write().await;
        let Entries { list, pending_acks } = &mut *entries;
        list.clear();

        for mut notification in notifications {
            if list.iter().any(|n| n.id == notification.id) {
                continue;
            }
            if notification.is_read {
                pending_acks.remove(&notification.id);
            } else if pending_acks.contains(&notification.id) {
                notification.is_read = true;
            }
            list.push_back(notification);
        }

        info!(
            count = list.len(),
            pending = pending_acks.len(),
            "Notifications hydrated"
        );
    }

    /// Marks a notification read.
    ///
    /// The flag flips immediately; the acknowledgement is sent in the
    /// background. If it fails, the flag reverts to unread and a
    /// [`Notice::ReadAckFailed`] is published so the user can retry.
    pub async fn mark_as_read(self: &Arc<Self>, id: NotificationId) -> MarkRead {
        {
            let mut entries = self.entries.write().await;
            let Some(entry) = entries.find_mut(id) else {
                return MarkRead::NotFound;
            };

            if entry.is_read {
                return MarkRead::AlreadyRead;
            }

            entry.is_read = true;
            entries.pending_acks.insert(id);
        }

        self.metrics.record_ack_sent();

        let store = Arc::clone(self);
        MarkRead::Pending(tokio::spawn(async move {
            let result = store.acknowledger.acknowledge(id).await;

            match &result {
                Ok(()) => {
                    store.entries.write().await.pending_acks.remove(&id);
                }
                Err(e) => {
                    store.metrics.record_ack_failed();
                    if store.rollback(id).await {
                        warn!(id, error = %e, "Read acknowledgement failed, rolled back");
                        store.notices.publish(Notice::ReadAckFailed {
                            id,
                            reason: e.to_string(),
                            retryable: e.is_retryable(),
                        });
                    } else {
                        debug!(id, error = %e, "Read acknowledgement failed for an entry no longer pending");
                    }
                }
            }

            result
        }))
    }

    /// Reverts a failed optimistic read. Returns false when the entry is
    /// gone or a snapshot already settled it.
    async fn rollback(&self, id: NotificationId) -> bool {
        let mut entries = self.entries.write().await;
        if !entries.pending_acks.remove(&id) {
            return false;
        }
        match entries.find_mut(id) {
            Some(entry) => {
                entry.is_read = false;
                true
            }
            None => false,
        }
    }

    /// Empties the store locally. The server is not informed.
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        debug!(count = entries.list.len(), "Notifications cleared");
        entries.list.clear();
        entries.pending_acks.clear();
    }

    /// Returns the number of unread notifications.
    pub async fn unread_count(&self) -> usize {
        self.entries
            .read()
            .await
            .list
            .iter()
            .filter(|n| n.is_unread())
            .count()
    }

    /// Returns a copy of the list, newest first.
    pub async fn snapshot(&self) -> Vec<Notification> {
        self.entries.read().await.list.iter().cloned().collect()
    }

    /// Returns a copy of one notification.
    pub async fn get(&self, id: NotificationId) -> Option<Notification> {
        self.entries
            .read()
            .await
            .list
            .iter()
            .find(|n| n.id == id)
            .cloned()
    }

    /// Returns the number of notifications held.
    pub async fn len(&self) -> usize {
        self.entries.read().await.list.len()
    }

    /// Returns true if the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.list.is_empty()
    }
}
