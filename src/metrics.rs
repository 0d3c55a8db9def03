//! Synchronization metrics.
//!
//! Provides atomic counters for monitoring the connection and the stores.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Metrics for the synchronization layer.
#[derive(Debug)]
pub struct SyncMetrics {
    /// Sockets opened successfully.
    sockets_opened: AtomicU64,

    /// Socket open attempts that failed.
    connect_failures: AtomicU64,

    /// Reconnects scheduled after a socket went down.
    reconnects_scheduled: AtomicU64,

    /// Text frames received.
    frames_received: AtomicU64,

    /// Frames dropped because they could not be parsed.
    frames_dropped: AtomicU64,

    /// Frames sent.
    frames_sent: AtomicU64,

    /// Notifications added from the stream.
    notifications_received: AtomicU64,

    /// Ticket updates relayed.
    ticket_updates: AtomicU64,

    /// Read acknowledgements issued.
    acks_sent: AtomicU64,

    /// Read acknowledgements that failed and were rolled back.
    acks_failed: AtomicU64,

    /// Start time for uptime.
    start_time: Instant,
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncMetrics {
    /// Creates a new metrics instance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sockets_opened: AtomicU64::new(0),
            connect_failures: AtomicU64::new(0),
            reconnects_scheduled: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            frames_sent: AtomicU64::new(0),
            notifications_received: AtomicU64::new(0),
            ticket_updates: AtomicU64::new(0),
            acks_sent: AtomicU64::new(0),
            acks_failed: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Records an opened socket.
    pub fn record_socket_opened(&self) {
        self.sockets_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed open attempt.
    pub fn record_connect_failure(&self) {
        self.connect_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a scheduled reconnect.
    pub fn record_reconnect_scheduled(&self) {
        self.reconnects_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a received frame.
    pub fn record_frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a dropped frame.
    pub fn record_frame_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a sent frame.
    pub fn record_frame_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a notification added from the stream.
    pub fn record_notification(&self) {
        self.notifications_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a relayed ticket update.
    pub fn record_ticket_update(&self) {
        self.ticket_updates.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an issued acknowledgement.
    pub fn record_ack_sent(&self) {
        self.acks_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed acknowledgement.
    pub fn record_ack_failed(&self) {
        self.acks_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns sockets opened.
    #[must_use]
    pub fn sockets_opened(&self) -> u64 {
        self.sockets_opened.load(Ordering::Relaxed)
    }

    /// Returns failed open attempts.
    #[must_use]
    pub fn connect_failures(&self) -> u64 {
        self.connect_failures.load(Ordering::Relaxed)
    }

    /// Returns scheduled reconnects.
    #[must_use]
    pub fn reconnects_scheduled(&self) -> u64 {
        self.reconnects_scheduled.load(Ordering::Relaxed)
    }

    /// Returns frames received.
    #[must_use]
    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    /// Returns frames dropped.
    #[must_use]
    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::Relaxed)
    }

    /// Returns frames sent.
    #[must_use]
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    /// Returns notifications received.
    #[must_use]
    pub fn notifications_received(&self) -> u64 {
        self.notifications_received.load(Ordering::Relaxed)
    }

    /// Returns ticket updates relayed.
    #[must_use]
    pub fn ticket_updates(&self) -> u64 {
        self.ticket_updates.load(Ordering::Relaxed)
    }

    /// Returns acknowledgements issued.
    #[must_use]
    pub fn acks_sent(&self) -> u64 {
        self.acks_sent.load(Ordering::Relaxed)
    }

    /// Returns failed acknowledgements.
    #[must_use]
    pub fn acks_failed(&self) -> u64 {
        self.acks_failed.load(Ordering::Relaxed)
    }

    /// Returns the uptime.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Returns a snapshot of all metrics.
    #[must_use]
    pub fn snapshot(&self) -> SyncMetricsSnapshot {
        SyncMetricsSnapshot {
            sockets_opened: self.sockets_opened(),
            connect_failures: self.connect_failures(),
            reconnects_scheduled: self.reconnects_scheduled(),
            frames_received: self.frames_received(),
            frames_dropped: self.frames_dropped(),
            frames_sent: self.frames_sent(),
            notifications_received: self.notifications_received(),
            ticket_updates: self.ticket_updates(),
            acks_sent: self.acks_sent(),
            acks_failed: self.acks_failed(),
            uptime: self.uptime(),
        }
    }
}

/// A point-in-time snapshot of synchronization metrics.
#[derive(Debug, Clone)]
pub struct SyncMetricsSnapshot {
    /// Sockets opened.
    pub sockets_opened: u64,
    /// Failed open attempts.
    pub connect_failures: u64,
    /// Scheduled reconnects.
    pub reconnects_scheduled: u64,
    /// Frames received.
    pub frames_received: u64,
    /// Frames dropped.
    pub frames_dropped: u64,
    /// Frames sent.
    pub frames_sent: u64,
    /// Notifications received.
    pub notifications_received: u64,
    /// Ticket updates relayed.
    pub ticket_updates: u64,
    /// Acknowledgements issued.
    pub acks_sent: u64,
    /// Failed acknowledgements.
    pub acks_failed: u64,
    /// Uptime.
    pub uptime: Duration,
}
