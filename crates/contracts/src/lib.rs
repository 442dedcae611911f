//! # Contracts
//!
//! Frozen interface contracts shared by every relay crate.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Ownership Model
//! - One ingested unit becomes one [`SharedBuffer`] (refcount = 1)
//! - Fan-out clones the handle per destination, never the payload
//! - Storage is freed exactly once, when the last handle is released

mod buffer;
mod config;
mod control;
mod endpoint;
mod error;
mod frame;
mod sink;

pub use buffer::{live_buffers, BufferWatch, SharedBuffer};
pub use config::{ConfigSource, RelayConfig, RelayTuning, MAX_QUEUE_CAPACITY};
pub use control::{ControlFlags, ControlState};
pub use endpoint::{DestinationSpec, Endpoint, ListenSpec, Protocol};
pub use error::*;
pub use frame::*;
pub use sink::*;
