//! Relay metrics
//!
//! Thin helpers over the `metrics` facade so every crate records the same
//! metric names. Without an installed recorder they are no-ops.

use metrics::{counter, gauge};

/// Record one ingested unit
pub fn record_unit_received(protocol: &str, bytes: usize) {
    counter!("relay_units_received_total", "protocol" => protocol.to_string()).increment(1);
    counter!("relay_bytes_received_total", "protocol" => protocol.to_string())
        .increment(bytes as u64);
}

/// Record a rejected stream frame (oversized header, short read)
pub fn record_frame_rejected(reason: &'static str) {
    counter!("relay_frames_rejected_total", "reason" => reason).increment(1);
}

/// Record accepted / closed stream ingestion connections
pub fn record_connection_opened() {
    counter!("relay_connections_total").increment(1);
    gauge!("relay_connections_active").increment(1.0);
}

pub fn record_connection_closed() {
    gauge!("relay_connections_active").decrement(1.0);
}

/// Record one fan-out pass
pub fn record_dispatch(enqueued: usize, dropped: usize) {
    counter!("relay_units_dispatched_total").increment(1);
    if enqueued > 0 {
        counter!("relay_units_enqueued_total").increment(enqueued as u64);
    }
    if dropped > 0 {
        counter!("relay_units_dropped_total").increment(dropped as u64);
    }
}

/// Record a unit dropped for one destination (queue full or closed)
pub fn record_destination_dropped(destination: &str) {
    counter!(
        "relay_destination_dropped_total",
        "destination" => destination.to_string()
    )
    .increment(1);
}

/// Record a transmission attempt for one destination
pub fn record_destination_sent(destination: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "relay_destination_sent_total",
        "destination" => destination.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Record a failed (re)connect attempt
pub fn record_reconnect_failure(destination: &str) {
    counter!(
        "relay_destination_reconnect_failures_total",
        "destination" => destination.to_string()
    )
    .increment(1);
}

/// Record queue depth for one destination
pub fn record_queue_depth(destination: &str, depth: usize) {
    gauge!(
        "relay_destination_queue_depth",
        "destination" => destination.to_string()
    )
    .set(depth as f64);
}

/// Record a newly published pool generation
pub fn record_generation(generation: u64, destinations: usize) {
    gauge!("relay_pool_generation").set(generation as f64);
    gauge!("relay_pool_destinations").set(destinations as f64);
}

/// Record currently allocated shared buffers
pub fn record_live_buffers(count: usize) {
    gauge!("relay_live_buffers").set(count as f64);
}
