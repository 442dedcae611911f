//! Destination - one remote target with an isolated queue and worker task

use std::sync::Arc;
use std::time::Duration;

use contracts::{
    ControlFlags, DestinationSpec, RelayTuning, SharedBuffer, Transport, MAX_QUEUE_CAPACITY,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::backoff::Backoff;
use crate::error::DispatcherError;
use crate::metrics::{ConnectionState, DestinationMetrics};

/// Per-destination settings, derived from [`RelayTuning`]
#[derive(Debug, Clone)]
pub struct DestinationSettings {
    /// Bounded queue capacity (units)
    pub queue_capacity: usize,
    /// Stream connect timeout
    pub connect_timeout: Duration,
    /// Stream per-frame write timeout
    pub send_timeout: Duration,
    /// First reconnect delay
    pub reconnect_initial: Duration,
    /// Reconnect delay cap
    pub reconnect_max: Duration,
}

impl Default for DestinationSettings {
    fn default() -> Self {
        Self::from(&RelayTuning::default())
    }
}

impl From<&RelayTuning> for DestinationSettings {
    fn from(tuning: &RelayTuning) -> Self {
        Self {
            queue_capacity: tuning.queue_capacity.clamp(1, MAX_QUEUE_CAPACITY),
            connect_timeout: tuning.connect_timeout(),
            send_timeout: tuning.send_timeout(),
            reconnect_initial: tuning.reconnect_initial(),
            reconnect_max: tuning.reconnect_max(),
        }
    }
}

/// Data-path side of a destination: what the dispatcher pushes into.
pub struct Destination {
    /// Unique per pool, never reused
    id: u64,
    spec: DestinationSpec,
    /// `proto@addr`, used for logging/metrics
    name: String,
    /// Queue into the worker
    tx: mpsc::Sender<SharedBuffer>,
    /// Shared metrics
    metrics: Arc<DestinationMetrics>,
}

/// Control side of a destination: stop request and worker join handle.
pub struct WorkerHandle {
    name: String,
    stop_tx: watch::Sender<bool>,
    worker_handle: JoinHandle<()>,
}

impl Destination {
    /// Create a destination and spawn its worker task
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<T: Transport + 'static>(
        id: u64,
        spec: DestinationSpec,
        transport: T,
        settings: &DestinationSettings,
        flags: Arc<ControlFlags>,
    ) -> (Arc<Destination>, WorkerHandle) {
        let name = spec.to_string();
        let (tx, rx) = mpsc::channel(settings.queue_capacity.clamp(1, MAX_QUEUE_CAPACITY));
        let (stop_tx, stop_rx) = watch::channel(false);
        let metrics = Arc::new(DestinationMetrics::new());

        let worker = DestinationWorker {
            name: name.clone(),
            transport,
            rx,
            stop: stop_rx,
            flags,
            metrics: Arc::clone(&metrics),
            backoff: Backoff::new(settings.reconnect_initial, settings.reconnect_max),
        };
        let worker_handle = tokio::spawn(worker.run());

        let destination = Arc::new(Destination {
            id,
            spec,
            name: name.clone(),
            tx,
            metrics,
        });
        let handle = WorkerHandle {
            name,
            stop_tx,
            worker_handle,
        };
        (destination, handle)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn spec(&self) -> &DestinationSpec {
        &self.spec
    }

    /// Destination name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<DestinationMetrics> {
        &self.metrics
    }

    /// Units currently waiting in the queue
    pub fn queue_len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Offer a unit to the queue (non-blocking)
    ///
    /// Returns true if enqueued. On a full (or closed) queue the handle is
    /// released on the spot and the drop counter incremented.
    pub fn offer(&self, buffer: SharedBuffer) -> bool {
        match self.tx.try_send(buffer) {
            Ok(()) => {
                self.metrics.inc_enqueued_count();
                self.metrics.set_queue_len(self.queue_len());
                if self.metrics.swap_saturated(false) {
                    info!(
                        destination = %self.name,
                        dropped_total = self.metrics.dropped_count(),
                        "Queue accepting units again"
                    );
                }
                true
            }
            Err(mpsc::error::TrySendError::Full(buffer)) => {
                buffer.release();
                self.metrics.inc_dropped_count();
                observability::record_destination_dropped(&self.name);
                if !self.metrics.swap_saturated(true) {
                    warn!(
                        destination = %self.name,
                        capacity = self.tx.max_capacity(),
                        "Queue full, dropping newest units"
                    );
                }
                false
            }
            Err(mpsc::error::TrySendError::Closed(buffer)) => {
                buffer.release();
                self.metrics.inc_dropped_count();
                observability::record_destination_dropped(&self.name);
                debug!(destination = %self.name, "Destination worker closed, unit dropped");
                false
            }
        }
    }
}

impl WorkerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ask the worker to stop; idempotent
    pub fn request_stop(&self) {
        self.stop_tx.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.worker_handle.is_finished()
    }

    /// Wait for the worker to exit
    pub async fn join(self) -> Result<(), DispatcherError> {
        self.worker_handle
            .await
            .map_err(|e| DispatcherError::worker_failed(&self.name, e.to_string()))
    }

    /// Stop the worker and wait until its queue is drained and transport closed
    #[instrument(name = "worker_handle_shutdown", skip(self), fields(destination = %self.name))]
    pub async fn shutdown(self) -> Result<(), DispatcherError> {
        self.request_stop();
        let name = self.name.clone();
        let result = self.join().await;
        match &result {
            Ok(()) => debug!(destination = %name, "Worker shutdown complete"),
            Err(e) => error!(destination = %name, error = %e, "Worker task failed"),
        }
        result
    }
}

/// Resolves once a stop was requested or the handle was dropped
async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    while !*stop.borrow_and_update() {
        if stop.changed().await.is_err() {
            return;
        }
    }
}

/// Worker task that drains one destination's queue into its transport
struct DestinationWorker<T> {
    name: String,
    transport: T,
    rx: mpsc::Receiver<SharedBuffer>,
    stop: watch::Receiver<bool>,
    flags: Arc<ControlFlags>,
    metrics: Arc<DestinationMetrics>,
    backoff: Backoff,
}

impl<T: Transport> DestinationWorker<T> {
    async fn run(mut self) {
        debug!(destination = %self.name, "Destination worker started");

        while let Some(buffer) = self.next_buffer().await {
            self.metrics.set_queue_len(self.rx.len());

            if !self.ensure_connected().await {
                // stop requested while (re)connecting
                buffer.release();
                break;
            }
            self.transmit(&buffer).await;
            buffer.release();
        }

        self.finish().await;
    }

    /// Next unit, or None once stop / shutdown was requested
    async fn next_buffer(&mut self) -> Option<SharedBuffer> {
        if self.flags.is_shutdown() {
            return None;
        }
        let buffer = tokio::select! {
            biased;
            _ = stop_requested(&mut self.stop) => None,
            item = self.rx.recv() => item,
        }?;

        if self.flags.is_shutdown() {
            buffer.release();
            return None;
        }
        Some(buffer)
    }

    /// Connect with backoff; false if a stop arrived first
    async fn ensure_connected(&mut self) -> bool {
        while !self.transport.is_connected() {
            self.metrics
                .set_connection_state(ConnectionState::Connecting);

            match self.transport.connect().await {
                Ok(()) => {
                    if self.backoff.attempts() > 0 {
                        info!(
                            destination = %self.name,
                            attempts = self.backoff.attempts(),
                            "Reconnected"
                        );
                    }
                    self.backoff.reset();
                    self.metrics.set_connection_state(ConnectionState::Connected);
                }
                Err(e) => {
                    self.metrics
                        .set_connection_state(ConnectionState::Disconnected);
                    self.metrics.inc_reconnect_failures();
                    observability::record_reconnect_failure(&self.name);

                    let delay = self.backoff.next_delay();
                    warn!(
                        destination = %self.name,
                        error = %e,
                        attempt = self.backoff.attempts(),
                        retry_in_ms = delay.as_millis() as u64,
                        "Connect failed"
                    );

                    tokio::select! {
                        biased;
                        _ = stop_requested(&mut self.stop) => return false,
                        _ = tokio::time::sleep(delay) => {}
                    }
                    if self.flags.is_shutdown() {
                        return false;
                    }
                }
            }
        }
        true
    }

    async fn transmit(&mut self, buffer: &SharedBuffer) {
        match self.transport.send(buffer).await {
            Ok(()) => {
                self.metrics.inc_sent_count();
                observability::record_destination_sent(&self.name, true);
            }
            Err(e) => {
                self.metrics.inc_failure_count();
                observability::record_destination_sent(&self.name, false);
                warn!(
                    destination = %self.name,
                    len = buffer.len(),
                    error = %e,
                    "Send failed"
                );
                // Continue processing - don't crash on single failure
                if !self.transport.is_connected() {
                    self.metrics
                        .set_connection_state(ConnectionState::Disconnected);
                }
            }
        }
    }

    /// Release everything still queued and close the transport
    async fn finish(mut self) {
        self.rx.close();
        let mut discarded = 0u64;
        while let Ok(buffer) = self.rx.try_recv() {
            buffer.release();
            discarded += 1;
        }
        self.metrics.add_discarded_count(discarded);
        self.metrics.set_queue_len(0);

        if let Err(e) = self.transport.close().await {
            error!(destination = %self.name, error = %e, "Close failed on shutdown");
        }
        self.metrics
            .set_connection_state(ConnectionState::Disconnected);

        debug!(destination = %self.name, discarded, "Destination worker stopped");
    }
}
