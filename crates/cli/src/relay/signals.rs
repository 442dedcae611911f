//! Signal handling: signals only set control flags, the governance loop acts
//! on them at its next tick.

use std::sync::Arc;

use contracts::ControlFlags;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::CliError;

/// Install handlers for the life of the process
///
/// SIGHUP sets `RELOAD`, SIGTERM and SIGINT set `SHUTDOWN`, SIGPIPE is logged
/// and otherwise ignored.
#[cfg(unix)]
pub fn install_signal_handlers(flags: Arc<ControlFlags>) -> Result<JoinHandle<()>, CliError> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup()).map_err(CliError::Signals)?;
    let mut terminate = signal(SignalKind::terminate()).map_err(CliError::Signals)?;
    let mut interrupt = signal(SignalKind::interrupt()).map_err(CliError::Signals)?;
    let mut pipe = signal(SignalKind::pipe()).map_err(CliError::Signals)?;

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(()) = hangup.recv() => {
                    info!(signal = "SIGHUP", "Reload requested");
                    flags.request_reload();
                }
                Some(()) = terminate.recv() => {
                    info!(signal = "SIGTERM", "Shutdown requested");
                    flags.request_shutdown();
                }
                Some(()) = interrupt.recv() => {
                    info!(signal = "SIGINT", "Shutdown requested");
                    flags.request_shutdown();
                }
                Some(()) = pipe.recv() => {
                    warn!(signal = "SIGPIPE", "Signal ignored");
                }
                else => break,
            }
        }
    }))
}

/// Ctrl+C sets `SHUTDOWN`; reload has no signal here
#[cfg(not(unix))]
pub fn install_signal_handlers(flags: Arc<ControlFlags>) -> Result<JoinHandle<()>, CliError> {
    Ok(tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            info!(signal = "ctrl-c", "Shutdown requested");
            flags.request_shutdown();
        }
        warn!("Ctrl+C handler unavailable");
    }))
}
