//! WorkerPool - versioned destination set with live reconfiguration

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use contracts::{ControlFlags, DestinationSpec, Protocol};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::error::DispatcherError;
use crate::handle::{Destination, DestinationSettings, WorkerHandle};
use crate::metrics::MetricsSnapshot;
use crate::transports::{DatagramTransport, StreamTransport};

/// How long a reconfigure waits for in-flight dispatches on the previous
/// generation before retiring its destinations anyway.
const RETIRE_GRACE: Duration = Duration::from_secs(1);

/// One published destination set
#[derive(Default)]
pub struct Generation {
    number: u64,
    destinations: Vec<Arc<Destination>>,
}

impl Generation {
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Destinations in configuration order
    pub fn destinations(&self) -> &[Arc<Destination>] {
        &self.destinations
    }

    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    fn find(&self, spec: &DestinationSpec) -> Option<&Arc<Destination>> {
        self.destinations.iter().find(|d| d.spec() == spec)
    }
}

/// Outcome of one [`WorkerPool::reconfigure`] call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadSummary {
    /// Generation number now published
    pub generation: u64,
    pub retained: Vec<DestinationSpec>,
    pub added: Vec<DestinationSpec>,
    pub removed: Vec<DestinationSpec>,
}

impl ReloadSummary {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// The versioned set of destinations and their workers
///
/// Readers (the dispatcher) see a generation through a single atomic load;
/// writers are serialized by the worker map lock.
pub struct WorkerPool {
    current: ArcSwap<Generation>,
    workers: Mutex<HashMap<DestinationSpec, WorkerHandle>>,
    settings: DestinationSettings,
    flags: Arc<ControlFlags>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl WorkerPool {
    /// Build a destination and worker per spec and publish generation 0
    ///
    /// Must be called from within a tokio runtime.
    #[instrument(name = "worker_pool_initialize", skip_all, fields(destinations = specs.len()))]
    pub fn initialize(
        specs: &[DestinationSpec],
        settings: DestinationSettings,
        flags: Arc<ControlFlags>,
    ) -> Self {
        let mut pool = Self {
            current: ArcSwap::from_pointee(Generation::default()),
            workers: Mutex::new(HashMap::new()),
            settings,
            flags,
            next_id: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        };

        let mut destinations = Vec::with_capacity(specs.len());
        for spec in dedup(specs) {
            let (destination, handle) = pool.spawn_destination(spec);
            destinations.push(destination);
            pool.workers.get_mut().insert(spec, handle);
        }
        pool.current.store(Arc::new(Generation {
            number: 0,
            destinations,
        }));

        let generation = pool.current.load();
        observability::record_generation(0, generation.len());
        info!(
            generation = 0,
            destinations = generation.len(),
            "Worker pool initialized"
        );
        drop(generation);
        pool
    }

    /// Swap in a new destination set
    ///
    /// Destinations whose spec appears in both sets are kept as-is (queue,
    /// connection and worker). New specs get a fresh destination. Specs no
    /// longer present are retired: their workers are stopped, drained and
    /// joined after the new generation has been published.
    #[instrument(name = "worker_pool_reconfigure", skip_all, fields(destinations = specs.len()))]
    pub async fn reconfigure(
        &self,
        specs: &[DestinationSpec],
    ) -> Result<ReloadSummary, DispatcherError> {
        let mut workers = self.workers.lock().await;
        if self.closed.load(Ordering::Acquire) {
            return Err(DispatcherError::ShutDown);
        }

        let previous = self.current.load_full();
        let wanted = dedup(specs);
        if wanted.len() != specs.len() {
            warn!(
                given = specs.len(),
                unique = wanted.len(),
                "Duplicate destinations ignored"
            );
        }

        let mut summary = ReloadSummary {
            generation: previous.number + 1,
            ..Default::default()
        };
        let mut destinations = Vec::with_capacity(wanted.len());
        for spec in &wanted {
            match previous.find(spec) {
                Some(existing) => {
                    destinations.push(Arc::clone(existing));
                    summary.retained.push(*spec);
                }
                None => {
                    let (destination, handle) = self.spawn_destination(*spec);
                    destinations.push(destination);
                    workers.insert(*spec, handle);
                    summary.added.push(*spec);
                }
            }
        }

        let keep: HashSet<&DestinationSpec> = wanted.iter().collect();
        summary.removed = previous
            .destinations
            .iter()
            .map(|d| *d.spec())
            .filter(|spec| !keep.contains(spec))
            .collect();

        self.current.store(Arc::new(Generation {
            number: summary.generation,
            destinations,
        }));
        observability::record_generation(summary.generation, wanted.len());

        // Dispatches that loaded the previous generation hold their own Arc;
        // wait for them before retiring its destinations.
        wait_until_unique(&previous, RETIRE_GRACE).await;
        drop(previous);

        let retiring: Vec<WorkerHandle> = summary
            .removed
            .iter()
            .filter_map(|spec| workers.remove(spec))
            .collect();
        retire(retiring).await;

        info!(
            generation = summary.generation,
            retained = summary.retained.len(),
            added = summary.added.len(),
            removed = summary.removed.len(),
            "Worker pool reconfigured"
        );
        Ok(summary)
    }

    /// Stop every worker, draining its queue, and publish an empty set
    ///
    /// Idempotent; a pool that was shut down rejects further reconfigures.
    #[instrument(name = "worker_pool_shutdown", skip(self))]
    pub async fn shutdown(&self) {
        let mut workers = self.workers.lock().await;
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let number = self.generation();
        let previous = self.current.swap(Arc::new(Generation {
            number,
            destinations: Vec::new(),
        }));
        wait_until_unique(&previous, RETIRE_GRACE).await;
        drop(previous);

        let handles: Vec<WorkerHandle> = workers.drain().map(|(_, h)| h).collect();
        let count = handles.len();
        retire(handles).await;

        info!(workers = count, "Worker pool shut down");
    }

    /// Currently published generation
    pub fn load(&self) -> Arc<Generation> {
        self.current.load_full()
    }

    pub fn generation(&self) -> u64 {
        self.current.load().number
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn flags(&self) -> &Arc<ControlFlags> {
        &self.flags
    }

    /// Specs of the current generation, in order
    pub fn specs(&self) -> Vec<DestinationSpec> {
        self.current
            .load()
            .destinations
            .iter()
            .map(|d| *d.spec())
            .collect()
    }

    /// Get metrics for all current destinations
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.current
            .load()
            .destinations
            .iter()
            .map(|d| (d.name().to_string(), d.metrics().snapshot()))
            .collect()
    }

    fn spawn_destination(&self, spec: DestinationSpec) -> (Arc<Destination>, WorkerHandle) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let name = spec.to_string();
        let flags = Arc::clone(&self.flags);
        debug!(destination = %name, id, "Spawning destination worker");

        match spec.protocol {
            Protocol::Datagram => {
                let transport = DatagramTransport::new(name, spec.addr);
                Destination::spawn(id, spec, transport, &self.settings, flags)
            }
            Protocol::Stream => {
                let transport = StreamTransport::new(
                    name,
                    spec.addr,
                    self.settings.connect_timeout,
                    self.settings.send_timeout,
                );
                Destination::spawn(id, spec, transport, &self.settings, flags)
            }
        }
    }
}

/// Keep the first occurrence of each spec
fn dedup(specs: &[DestinationSpec]) -> Vec<DestinationSpec> {
    let mut seen = HashSet::with_capacity(specs.len());
    specs.iter().copied().filter(|s| seen.insert(*s)).collect()
}

async fn wait_until_unique(generation: &Arc<Generation>, grace: Duration) {
    let started = Instant::now();
    while Arc::strong_count(generation) > 1 {
        if started.elapsed() >= grace {
            // late offers hit a closed queue and are released there
            warn!(
                generation = generation.number,
                "Previous generation still referenced, retiring anyway"
            );
            return;
        }
        tokio::task::yield_now().await;
    }
}

/// Stop all given workers concurrently, then join each
async fn retire(handles: Vec<WorkerHandle>) {
    for handle in &handles {
        handle.request_stop();
    }
    for handle in handles {
        let name = handle.name().to_string();
        match handle.join().await {
            Ok(()) => debug!(destination = %name, "Destination retired"),
            Err(e) => error!(destination = %name, error = %e, "Destination worker failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SharedBuffer;
    use tokio::net::UdpSocket;
    use tokio::time::timeout;

    async fn receiver() -> (UdpSocket, DestinationSpec) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let spec = DestinationSpec::datagram(socket.local_addr().unwrap());
        (socket, spec)
    }

    fn pool(specs: &[DestinationSpec]) -> WorkerPool {
        WorkerPool::initialize(
            specs,
            DestinationSettings::default(),
            Arc::new(ControlFlags::new()),
        )
    }

    #[tokio::test]
    async fn test_initialize_publishes_generation_zero() {
        let (_a, spec_a) = receiver().await;
        let (_b, spec_b) = receiver().await;

        let pool = pool(&[spec_a, spec_b, spec_a]);
        assert_eq!(pool.generation(), 0);
        assert_eq!(pool.specs(), vec![spec_a, spec_b]);

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_reconfigure_retains_adds_and_removes() {
        let (_a, spec_a) = receiver().await;
        let (_b, spec_b) = receiver().await;
        let (_c, spec_c) = receiver().await;

        let pool = pool(&[spec_a, spec_b]);
        let before = pool.load();
        let kept_id = before.find(&spec_a).unwrap().id();
        drop(before);

        let summary = pool.reconfigure(&[spec_a, spec_c]).await.unwrap();
        assert_eq!(summary.generation, 1);
        assert_eq!(summary.retained, vec![spec_a]);
        assert_eq!(summary.added, vec![spec_c]);
        assert_eq!(summary.removed, vec![spec_b]);

        // unchanged destination is the very same instance
        let after = pool.load();
        assert_eq!(after.find(&spec_a).unwrap().id(), kept_id);
        assert!(after.find(&spec_b).is_none());
        drop(after);

        assert_eq!(pool.workers.lock().await.len(), 2);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_reconfigure_same_set_is_noop() {
        let (_a, spec_a) = receiver().await;
        let pool = pool(&[spec_a]);

        let summary = pool.reconfigure(&[spec_a]).await.unwrap();
        assert!(summary.is_noop());
        assert_eq!(summary.generation, 1);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_removed_destination_drains_and_releases() {
        // unreachable stream destination: everything it holds stays queued
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let dead = DestinationSpec::stream(listener.local_addr().unwrap());
        drop(listener);

        let pool = pool(&[dead]);
        let generation = pool.load();
        let destination = Arc::clone(&generation.destinations()[0]);
        drop(generation);

        let watches: Vec<_> = (0..20u8)
            .map(|i| {
                let buffer = SharedBuffer::copy_from_slice(&[i]).unwrap();
                let watch = buffer.watch();
                destination.offer(buffer);
                watch
            })
            .collect();

        let summary = timeout(Duration::from_secs(5), pool.reconfigure(&[]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.removed, vec![dead]);
        assert!(watches.iter().all(|w| w.is_released()));
        assert!(pool.load().is_empty());

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_reconfigure_after_shutdown_fails() {
        let pool = pool(&[]);
        pool.shutdown().await;
        pool.shutdown().await;
        assert!(pool.is_closed());
        assert!(matches!(
            pool.reconfigure(&[]).await,
            Err(DispatcherError::ShutDown)
        ));
    }
}
