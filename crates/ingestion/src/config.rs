//! Listener configuration and metrics

use std::sync::atomic::{AtomicU64, Ordering};

use contracts::{RelayTuning, DEFAULT_MAX_FRAME_SIZE};

/// Listener configuration
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Largest accepted stream frame payload
    pub max_frame_size: u32,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl From<&RelayTuning> for ListenerConfig {
    fn from(tuning: &RelayTuning) -> Self {
        Self {
            max_frame_size: tuning.max_frame_size,
        }
    }
}

/// Listener metrics
#[derive(Debug, Default)]
pub struct ListenerMetrics {
    /// Units handed to the dispatcher
    pub units_received: AtomicU64,

    /// Payload bytes handed to the dispatcher
    pub bytes_received: AtomicU64,

    /// Stream frames rejected (oversized header or truncated payload)
    pub frames_rejected: AtomicU64,

    /// Stream connections accepted
    pub connections_opened: AtomicU64,

    /// Stream connections closed
    pub connections_closed: AtomicU64,
}

impl ListenerMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one unit received
    pub fn record_unit(&self, bytes: usize) {
        self.units_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Record rejected frame
    pub fn record_rejected(&self) {
        self.frames_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> ListenerMetricsSnapshot {
        ListenerMetricsSnapshot {
            units_received: self.units_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            frames_rejected: self.frames_rejected.load(Ordering::Relaxed),
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerMetricsSnapshot {
    pub units_received: u64,
    pub bytes_received: u64,
    pub frames_rejected: u64,
    pub connections_opened: u64,
    pub connections_closed: u64,
}

impl ListenerMetricsSnapshot {
    /// Stream connections still open
    pub fn active_connections(&self) -> u64 {
        self.connections_opened
            .saturating_sub(self.connections_closed)
    }
}
