//! Relay orchestration module.

mod orchestrator;
mod signals;
mod stats;

pub use orchestrator::Relay;
pub use signals::install_signal_handlers;
pub use stats::RelayStats;
