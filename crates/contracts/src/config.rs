//! RelayConfig - Config Loader output
//!
//! Describes the complete relay: where to listen, where to replicate to, and
//! the tuning knobs shared by listeners and destination workers.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::{DestinationSpec, ListenSpec, DEFAULT_MAX_FRAME_SIZE};

/// Fully resolved relay configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Local endpoint receiving traffic
    pub listen: ListenSpec,

    /// Destinations, in configuration order
    pub destinations: Vec<DestinationSpec>,

    /// Queue / framing / retry tuning
    pub tuning: RelayTuning,

    /// Where the configuration came from (re-read on reload)
    pub source: ConfigSource,
}

/// Origin of a configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Config file, re-read on every reload
    File(PathBuf),
    /// Spec list given directly (command line); reload re-applies it
    Args(Vec<String>),
}

/// Tuning knobs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayTuning {
    /// Per-destination queue capacity (units)
    pub queue_capacity: usize,

    /// Largest stream frame payload accepted (bytes)
    pub max_frame_size: u32,

    /// Governance poll interval (ms)
    pub poll_interval_ms: u64,

    /// Stream destination connect timeout (ms)
    pub connect_timeout_ms: u64,

    /// Stream destination write timeout per frame (ms)
    pub send_timeout_ms: u64,

    /// First reconnect delay (ms), doubled on every failed attempt
    pub reconnect_initial_ms: u64,

    /// Upper bound of the reconnect delay (ms)
    pub reconnect_max_ms: u64,

    /// Log destination statistics every N governance ticks (0 = never)
    pub stats_interval_ticks: u32,
}

impl Default for RelayTuning {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            poll_interval_ms: 1000,
            connect_timeout_ms: 2000,
            send_timeout_ms: 5000,
            reconnect_initial_ms: 100,
            reconnect_max_ms: 5000,
            stats_interval_ticks: 60,
        }
    }
}

/// Largest accepted per-destination queue capacity (units)
pub const MAX_QUEUE_CAPACITY: usize = 1 << 24;

fn default_queue_capacity() -> usize {
    1024
}

impl RelayTuning {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn reconnect_initial(&self) -> Duration {
        Duration::from_millis(self.reconnect_initial_ms)
    }

    pub fn reconnect_max(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_ms)
    }
}
