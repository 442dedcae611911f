//! Configuration validation module
//!
//! Rules:
//! - destinations are unique (protocol + resolved address)
//! - no destination points back at the listen endpoint
//! - queue capacity, frame size, poll interval and timeouts are non-zero
//! - queue capacity <= MAX_QUEUE_CAPACITY
//! - reconnect_initial_ms <= reconnect_max_ms

use std::collections::HashSet;

use contracts::{ContractError, RelayConfig, RelayTuning, MAX_QUEUE_CAPACITY};

/// Validate a resolved RelayConfig
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &RelayConfig) -> Result<(), ContractError> {
    validate_destinations(config)?;
    validate_tuning(&config.tuning)?;
    Ok(())
}

fn validate_destinations(config: &RelayConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, destination) in config.destinations.iter().enumerate() {
        if !seen.insert(destination) {
            return Err(ContractError::config_validation(
                format!("destinations[{idx}]"),
                format!("duplicate destination {destination}"),
            ));
        }
        if *destination == config.listen {
            return Err(ContractError::config_validation(
                format!("destinations[{idx}]"),
                format!("destination {destination} is the listen endpoint"),
            ));
        }
    }
    Ok(())
}

/// Validate tuning ranges
pub fn validate_tuning(tuning: &RelayTuning) -> Result<(), ContractError> {
    let non_zero = [
        ("tuning.queue_capacity", tuning.queue_capacity as u64),
        ("tuning.max_frame_size", u64::from(tuning.max_frame_size)),
        ("tuning.poll_interval_ms", tuning.poll_interval_ms),
        ("tuning.connect_timeout_ms", tuning.connect_timeout_ms),
        ("tuning.send_timeout_ms", tuning.send_timeout_ms),
        ("tuning.reconnect_initial_ms", tuning.reconnect_initial_ms),
    ];
    for (field, value) in non_zero {
        if value == 0 {
            return Err(ContractError::config_validation(field, "must be greater than 0"));
        }
    }

    if tuning.queue_capacity > MAX_QUEUE_CAPACITY {
        return Err(ContractError::config_validation(
            "tuning.queue_capacity",
            format!(
                "queue_capacity ({}) must be <= {MAX_QUEUE_CAPACITY}",
                tuning.queue_capacity
            ),
        ));
    }

    if tuning.reconnect_initial_ms > tuning.reconnect_max_ms {
        return Err(ContractError::config_validation(
            "tuning.reconnect_max_ms",
            format!(
                "reconnect_max_ms ({}) must be >= reconnect_initial_ms ({})",
                tuning.reconnect_max_ms, tuning.reconnect_initial_ms
            ),
        ));
    }
    Ok(())
}
