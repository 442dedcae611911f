//! Dispatcher - fan-out of ingested units to the current destination set

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use contracts::{BufferSink, SharedBuffer};
use tracing::trace;

use crate::pool::WorkerPool;

/// Result of dispatching one unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Generation the unit was offered to
    pub generation: u64,
    pub enqueued: usize,
    pub dropped: usize,
}

/// Totals across all dispatches
#[derive(Debug, Default)]
struct DispatchTotals {
    units: AtomicU64,
    enqueued: AtomicU64,
    dropped: AtomicU64,
}

/// Snapshot of [`Dispatcher`] totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub units: u64,
    pub enqueued: u64,
    pub dropped: u64,
}

/// The fan-out dispatcher
///
/// Cheap to clone; every clone dispatches against the same pool.
#[derive(Clone)]
pub struct Dispatcher {
    pool: Arc<WorkerPool>,
    totals: Arc<DispatchTotals>,
}

impl Dispatcher {
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Self {
            pool,
            totals: Arc::new(DispatchTotals::default()),
        }
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Offer `buffer` to every destination of the current generation
    ///
    /// Never blocks: each destination gets one non-blocking queue attempt.
    /// Every clone is either enqueued or released, and the caller's handle
    /// is released before returning. With no destinations the unit is freed
    /// right here.
    pub fn dispatch(&self, buffer: SharedBuffer) -> DispatchOutcome {
        // One generation for the whole unit, held until every offer is made
        let generation = self.pool.load();

        let mut enqueued = 0;
        for destination in generation.destinations() {
            if destination.offer(buffer.clone()) {
                enqueued += 1;
            }
        }
        let dropped = generation.len() - enqueued;
        let number = generation.number();
        drop(generation);
        buffer.release();

        self.totals.units.fetch_add(1, Ordering::Relaxed);
        self.totals
            .enqueued
            .fetch_add(enqueued as u64, Ordering::Relaxed);
        self.totals.dropped.fetch_add(dropped as u64, Ordering::Relaxed);
        observability::record_dispatch(enqueued, dropped);
        trace!(generation = number, enqueued, dropped, "Unit dispatched");

        DispatchOutcome {
            generation: number,
            enqueued,
            dropped,
        }
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            units: self.totals.units.load(Ordering::Relaxed),
            enqueued: self.totals.enqueued.load(Ordering::Relaxed),
            dropped: self.totals.dropped.load(Ordering::Relaxed),
        }
    }
}

impl BufferSink for Dispatcher {
    fn submit(&self, buffer: SharedBuffer) {
        self.dispatch(buffer);
    }
}
