//! SharedBuffer - one ingested unit, read by every destination
//!
//! The payload is written once at creation and never mutated afterwards, so
//! readers need no synchronization beyond the reference count itself.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use bytes::Bytes;

use crate::ContractError;

/// Number of buffers whose storage has not been freed yet (process-wide).
static LIVE_BUFFERS: AtomicUsize = AtomicUsize::new(0);

/// Count of currently allocated buffer storages.
///
/// Reaches zero once every handle of every buffer has been released.
pub fn live_buffers() -> usize {
    LIVE_BUFFERS.load(Ordering::Acquire)
}

struct Storage {
    payload: Bytes,
}

impl Storage {
    fn new(payload: Bytes) -> Self {
        LIVE_BUFFERS.fetch_add(1, Ordering::AcqRel);
        Self { payload }
    }
}

impl Drop for Storage {
    fn drop(&mut self) {
        LIVE_BUFFERS.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Immutable, reference-counted unit of ingested data.
///
/// Cloning a handle only bumps the atomic count; the payload is never copied.
/// Dropping (or [`release`](Self::release)-ing) a handle decrements the count,
/// and the storage is freed exactly once, when the last handle goes away.
///
/// # Examples
/// ```
/// use contracts::SharedBuffer;
///
/// let buffer = SharedBuffer::copy_from_slice(b"hello").unwrap();
/// let fanned = buffer.clone();
/// assert_eq!(buffer.ref_count(), 2);
///
/// let watch = buffer.watch();
/// buffer.release();
/// fanned.release();
/// assert!(watch.is_released());
/// ```
#[derive(Clone)]
pub struct SharedBuffer {
    storage: Arc<Storage>,
}

impl SharedBuffer {
    /// Wrap an already filled payload. The length must fit the `u32` header.
    pub fn new(payload: Bytes) -> Result<Self, ContractError> {
        if u32::try_from(payload.len()).is_err() {
            return Err(ContractError::FrameTooLarge {
                len: payload.len() as u64,
                max: u64::from(u32::MAX),
            });
        }

        Ok(Self {
            storage: Arc::new(Storage::new(payload)),
        })
    }

    /// Allocate a buffer holding a copy of `data`.
    pub fn copy_from_slice(data: &[u8]) -> Result<Self, ContractError> {
        Self::new(Bytes::copy_from_slice(data))
    }

    /// Payload length as carried in the frame header.
    #[inline]
    pub fn len(&self) -> u32 {
        // checked in `new`
        self.storage.payload.len() as u32
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.storage.payload.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.storage.payload
    }

    /// Cheap view of the payload (shares the same allocation).
    #[inline]
    pub fn payload(&self) -> &Bytes {
        &self.storage.payload
    }

    /// Number of outstanding handles to this storage.
    #[inline]
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.storage)
    }

    /// Give up this handle. Equivalent to dropping it, spelled out at call
    /// sites where ownership transfer matters.
    #[inline]
    pub fn release(self) {
        drop(self);
    }

    /// Observe the storage without keeping it alive.
    pub fn watch(&self) -> BufferWatch {
        BufferWatch {
            storage: Arc::downgrade(&self.storage),
        }
    }

    /// Whether two handles alias the same storage.
    pub fn ptr_eq(&self, other: &SharedBuffer) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }
}

impl fmt::Debug for SharedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedBuffer")
            .field("len", &self.len())
            .field("refs", &self.ref_count())
            .finish()
    }
}

/// Non-owning observer of a [`SharedBuffer`]'s storage.
#[derive(Debug, Clone)]
pub struct BufferWatch {
    storage: Weak<Storage>,
}

impl BufferWatch {
    /// True once every handle has been released and the storage freed.
    pub fn is_released(&self) -> bool {
        self.storage.strong_count() == 0
    }

    /// Current number of live handles (0 once released).
    pub fn ref_count(&self) -> usize {
        self.storage.strong_count()
    }
}
