//! Destination metrics for observability

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};

/// Connection state of a destination's transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Connecting,
            2 => Self::Connected,
            _ => Self::Disconnected,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Connected => 2,
        }
    }
}

/// Metrics for a single destination
#[derive(Debug, Default)]
pub struct DestinationMetrics {
    /// Current queue length
    queue_len: AtomicUsize,
    /// Units accepted into the queue
    enqueued_count: AtomicU64,
    /// Units transmitted successfully
    sent_count: AtomicU64,
    /// Units whose transmission failed
    failure_count: AtomicU64,
    /// Units dropped because the queue was full (or already closed)
    dropped_count: AtomicU64,
    /// Units released unsent at teardown
    discarded_count: AtomicU64,
    /// Failed connect attempts
    reconnect_failures: AtomicU64,
    /// Set while the queue is rejecting units
    saturated: AtomicBool,
    /// `ConnectionState` as u8
    connection: AtomicU8,
}

impl DestinationMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn enqueued_count(&self) -> u64 {
        self.enqueued_count.load(Ordering::Relaxed)
    }

    pub fn inc_enqueued_count(&self) {
        self.enqueued_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sent_count(&self) -> u64 {
        self.sent_count.load(Ordering::Relaxed)
    }

    pub fn inc_sent_count(&self) {
        self.sent_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    pub fn inc_dropped_count(&self) {
        self.dropped_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn discarded_count(&self) -> u64 {
        self.discarded_count.load(Ordering::Relaxed)
    }

    pub fn add_discarded_count(&self, n: u64) {
        self.discarded_count.fetch_add(n, Ordering::Relaxed);
    }

    pub fn reconnect_failures(&self) -> u64 {
        self.reconnect_failures.load(Ordering::Relaxed)
    }

    pub fn inc_reconnect_failures(&self) {
        self.reconnect_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark the queue saturated; returns the previous value
    pub fn swap_saturated(&self, saturated: bool) -> bool {
        self.saturated.swap(saturated, Ordering::Relaxed)
    }

    pub fn connection_state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.connection.load(Ordering::Relaxed))
    }

    pub fn set_connection_state(&self, state: ConnectionState) {
        self.connection.store(state.as_u8(), Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len(),
            enqueued_count: self.enqueued_count(),
            sent_count: self.sent_count(),
            failure_count: self.failure_count(),
            dropped_count: self.dropped_count(),
            discarded_count: self.discarded_count(),
            reconnect_failures: self.reconnect_failures(),
            connection: self.connection_state(),
        }
    }
}

/// Snapshot of destination metrics (for reporting)
#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub enqueued_count: u64,
    pub sent_count: u64,
    pub failure_count: u64,
    pub dropped_count: u64,
    pub discarded_count: u64,
    pub reconnect_failures: u64,
    pub connection: ConnectionState,
}
