//! Transport / BufferSink traits
//!
//! `Transport` is the delivery side of a destination, `BufferSink` is what
//! listeners hand ingested units to.

use crate::{ContractError, SharedBuffer};

/// Outbound transport of one destination
///
/// Destination transports implement the `Send` variant, [`Transport`].
#[trait_variant::make(Transport: Send)]
pub trait LocalTransport {
    /// Transport name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Whether a send can be attempted right now
    fn is_connected(&self) -> bool;

    /// Open (or re-open) the underlying socket
    ///
    /// # Errors
    /// Returns connect error (should include context)
    async fn connect(&mut self) -> Result<(), ContractError>;

    /// Transmit one unit
    ///
    /// A failed send must leave the transport disconnected if the
    /// connection can no longer be trusted.
    async fn send(&mut self, buffer: &SharedBuffer) -> Result<(), ContractError>;

    /// Close the underlying socket
    async fn close(&mut self) -> Result<(), ContractError>;
}

/// Receiver of ingested units (implemented by the fan-out dispatcher).
///
/// `submit` takes ownership of the handle and must never block on a slow
/// consumer.
pub trait BufferSink: Send + Sync + 'static {
    fn submit(&self, buffer: SharedBuffer);
}
