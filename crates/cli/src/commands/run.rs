//! `run` command implementation.

use std::sync::Arc;

use anyhow::{Context, Result};
use contracts::{ControlFlags, RelayConfig};
use tracing::{error, info};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::relay::{install_signal_handlers, Relay, RelayStats};

/// Execute the `run` command
pub async fn run_relay(args: &RunArgs) -> Result<()> {
    let config = load_config(args)?;

    info!(
        listen = %config.listen,
        destinations = config.destinations.len(),
        queue_capacity = config.tuning.queue_capacity,
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&config);
        return Ok(());
    }

    let flags = Arc::new(ControlFlags::new());
    let signals = install_signal_handlers(Arc::clone(&flags))?;

    let relay = Relay::start(config, Arc::clone(&flags))
        .await
        .context("Relay startup failed")?;
    let stats = relay.run().await;
    signals.abort();

    stats.print_summary();
    finish(&stats)
}

/// A failed listener is a global shutdown, not a failed run: teardown has
/// completed by now, so the error is only reported.
fn finish(stats: &RelayStats) -> Result<()> {
    match &stats.listener_error {
        Some(message) => error!(
            error = %message,
            units = stats.listener.units_received,
            "Relay finished after listener failure"
        ),
        None => info!("Relay finished"),
    }
    Ok(())
}

/// Load positional config, apply CLI tuning overrides
fn load_config(args: &RunArgs) -> Result<RelayConfig> {
    let mut config = config_loader::ConfigLoader::from_cli_args(&args.specs)
        .map_err(|e| CliError::config(e.to_string()))
        .with_context(|| format!("Failed to load configuration from {:?}", args.specs))?;

    let changed = args.tuning.apply(&mut config.tuning);
    if !changed.is_empty() {
        info!(fields = ?changed, "Tuning overridden from CLI");
        config_loader::validate_tuning(&config.tuning)
            .map_err(|e| CliError::config(e.to_string()))?;
    }
    Ok(config)
}

/// Print configuration summary for dry-run mode
fn print_config_summary(config: &RelayConfig) {
    println!("\n=== Configuration Summary ===\n");
    println!("Listen: {}", config.listen);
    println!("\nDestinations ({}):", config.destinations.len());
    for destination in &config.destinations {
        println!("  - {destination}");
    }

    let tuning = &config.tuning;
    println!("\nTuning:");
    println!("  Queue capacity: {}", tuning.queue_capacity);
    println!("  Max frame size: {} bytes", tuning.max_frame_size);
    println!("  Poll interval: {} ms", tuning.poll_interval_ms);
    println!(
        "  Connect / send timeout: {} / {} ms",
        tuning.connect_timeout_ms, tuning.send_timeout_ms
    );
    println!(
        "  Reconnect backoff: {}..{} ms",
        tuning.reconnect_initial_ms, tuning.reconnect_max_ms
    );
    println!();
}
