//! # Ingestion
//!
//! Listener module.
//!
//! Responsibilities:
//! - Bind the local endpoint (datagram or stream)
//! - Turn each datagram / length-prefixed frame into one `SharedBuffer`
//! - Hand every unit to a `BufferSink` (the fan-out dispatcher)
//! - Escalate listener-level failures to `SHUTDOWN`
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{Listener, ListenerConfig};
//!
//! let listener = Listener::bind(config.listen, &ListenerConfig::from(&config.tuning)).await?;
//! let handle = listener.spawn(Arc::new(dispatcher), flags.clone());
//! // ...
//! handle.shutdown().await?;
//! ```

pub mod config;
pub mod error;
pub mod listeners;

#[cfg(test)]
mod testing;

pub use config::{ListenerConfig, ListenerMetrics, ListenerMetricsSnapshot};
pub use error::{IngestionError, Result};
pub use listeners::{DatagramListener, Listener, ListenerHandle, StreamListener};
