//! Relay statistics and end-of-run summary.

use std::time::Duration;

use dispatcher::{DispatchStats, MetricsSnapshot};
use ingestion::ListenerMetricsSnapshot;

/// Statistics from a relay run
#[derive(Debug, Clone, Default)]
pub struct RelayStats {
    /// Total duration of the run
    pub duration: Duration,

    /// Listener counters
    pub listener: ListenerMetricsSnapshot,

    /// Dispatcher totals
    pub dispatch: DispatchStats,

    /// Per-destination counters of the final generation
    pub destinations: Vec<(String, MetricsSnapshot)>,

    /// Generation number at exit
    pub generation: u64,

    /// Applied / failed reloads
    pub reloads: u64,
    pub failed_reloads: u64,

    /// Shared buffers still allocated after teardown (expected 0)
    pub live_buffers: usize,

    /// Set when the listener ended with an error
    pub listener_error: Option<String>,
}

impl RelayStats {
    /// Received units per second
    pub fn units_per_second(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.listener.units_received as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Share of destination offers that were dropped, in percent
    pub fn drop_rate(&self) -> f64 {
        let offers = self.dispatch.enqueued + self.dispatch.dropped;
        if offers > 0 {
            (self.dispatch.dropped as f64 / offers as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                       Relay Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Units received: {}", self.listener.units_received);
        println!("   ├─ Bytes received: {}", self.listener.bytes_received);
        println!("   ├─ Units/s: {:.2}", self.units_per_second());
        println!("   ├─ Frames rejected: {}", self.listener.frames_rejected);
        println!("   ├─ Connections: {}", self.listener.connections_opened);
        println!(
            "   ├─ Reloads: {} ({} failed), generation {}",
            self.reloads, self.failed_reloads, self.generation
        );
        println!("   └─ Live buffers at exit: {}", self.live_buffers);

        println!("\nDispatch");
        println!("   ├─ Units dispatched: {}", self.dispatch.units);
        println!("   ├─ Enqueued: {}", self.dispatch.enqueued);
        println!(
            "   └─ Dropped: {} ({:.2}%)",
            self.dispatch.dropped,
            self.drop_rate()
        );

        if !self.destinations.is_empty() {
            println!("\nDestinations");
            for (name, snap) in &self.destinations {
                println!(
                    "   ├─ {}: sent {}, failed {}, dropped {}, discarded {}, reconnect failures {}",
                    name,
                    snap.sent_count,
                    snap.failure_count,
                    snap.dropped_count,
                    snap.discarded_count,
                    snap.reconnect_failures
                );
            }
        }

        if let Some(ref error) = self.listener_error {
            println!("\nListener failed: {}", error);
        }

        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_with_no_traffic() {
        let stats = RelayStats::default();
        assert_eq!(stats.units_per_second(), 0.0);
        assert_eq!(stats.drop_rate(), 0.0);
    }

    #[test]
    fn test_drop_rate() {
        let stats = RelayStats {
            dispatch: DispatchStats {
                units: 10,
                enqueued: 15,
                dropped: 5,
            },
            ..Default::default()
        };
        assert!((stats.drop_rate() - 25.0).abs() < f64::EPSILON);
    }
}
