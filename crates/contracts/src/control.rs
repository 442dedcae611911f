//! ControlFlags - process-wide shutdown / reload bits
//!
//! Set asynchronously (signal handlers, failing listeners) and polled by the
//! long-running loops at iteration boundaries.

use std::sync::atomic::{AtomicU32, Ordering};

/// Atomic bitset shared by every task of the relay.
#[derive(Debug, Default)]
pub struct ControlFlags {
    bits: AtomicU32,
}

/// Governance view of the flags for one tick.
///
/// Both bits may be set at once; shutdown wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    Running,
    ReloadRequested,
    ShutdownRequested,
}

impl ControlFlags {
    /// Terminal teardown requested.
    pub const SHUTDOWN: u32 = 1 << 0;
    /// Re-read configuration and reconfigure the destination set.
    pub const RELOAD: u32 = 1 << 1;

    pub const fn new() -> Self {
        Self {
            bits: AtomicU32::new(0),
        }
    }

    /// OR `bits` into the word.
    #[inline]
    pub fn set(&self, bits: u32) {
        self.bits.fetch_or(bits, Ordering::AcqRel);
    }

    /// Clear `bits` (AND with complement).
    #[inline]
    pub fn clear(&self, bits: u32) {
        self.bits.fetch_and(!bits, Ordering::AcqRel);
    }

    #[inline]
    pub fn get(&self) -> u32 {
        self.bits.load(Ordering::Acquire)
    }

    pub fn request_shutdown(&self) {
        self.set(Self::SHUTDOWN);
    }

    pub fn request_reload(&self) {
        self.set(Self::RELOAD);
    }

    /// The only bit listeners and workers look at.
    #[inline]
    pub fn is_shutdown(&self) -> bool {
        self.get() & Self::SHUTDOWN != 0
    }

    #[inline]
    pub fn is_reload_requested(&self) -> bool {
        self.get() & Self::RELOAD != 0
    }

    /// Snapshot for one governance tick.
    pub fn state(&self) -> ControlState {
        let bits = self.get();
        if bits & Self::SHUTDOWN != 0 {
            ControlState::ShutdownRequested
        } else if bits & Self::RELOAD != 0 {
            ControlState::ReloadRequested
        } else {
            ControlState::Running
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_running() {
        let flags = ControlFlags::new();
        assert_eq!(flags.get(), 0);
        assert_eq!(flags.state(), ControlState::Running);
        assert!(!flags.is_shutdown());
    }

    #[test]
    fn test_reload_set_and_clear() {
        let flags = ControlFlags::new();
        flags.request_reload();
        assert_eq!(flags.state(), ControlState::ReloadRequested);
        assert!(!flags.is_shutdown());

        flags.clear(ControlFlags::RELOAD);
        assert_eq!(flags.state(), ControlState::Running);
    }

    #[test]
    fn test_shutdown_wins_over_reload() {
        let flags = ControlFlags::new();
        flags.request_reload();
        flags.request_shutdown();
        assert_eq!(flags.state(), ControlState::ShutdownRequested);

        // clearing reload leaves shutdown untouched
        flags.clear(ControlFlags::RELOAD);
        assert_eq!(flags.get(), ControlFlags::SHUTDOWN);
    }
}
