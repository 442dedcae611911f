//! Listeners: turn inbound network input into `SharedBuffer`s

mod datagram;
mod stream;

use std::net::SocketAddr;
use std::sync::Arc;

use contracts::{BufferSink, ControlFlags, ListenSpec, Protocol};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

use crate::config::{ListenerConfig, ListenerMetrics};
use crate::error::{IngestionError, Result};

pub use self::datagram::DatagramListener;
pub use self::stream::StreamListener;

/// A bound listener of either protocol
pub enum Listener {
    Datagram(DatagramListener),
    Stream(StreamListener),
}

impl Listener {
    /// Bind the local endpoint described by `spec`
    ///
    /// # Errors
    /// Bind failure is returned as-is; at startup it is fatal.
    #[instrument(name = "listener_bind", skip(config), fields(listen = %spec))]
    pub async fn bind(spec: ListenSpec, config: &ListenerConfig) -> Result<Self> {
        let listener = match spec.protocol {
            Protocol::Datagram => Self::Datagram(DatagramListener::bind(spec.addr).await?),
            Protocol::Stream => Self::Stream(StreamListener::bind(spec.addr, config).await?),
        };
        info!(local_addr = %listener.local_addr(), "Listener bound");
        Ok(listener)
    }

    pub fn protocol(&self) -> Protocol {
        match self {
            Self::Datagram(_) => Protocol::Datagram,
            Self::Stream(_) => Protocol::Stream,
        }
    }

    /// Actual bound address (resolves port 0)
    pub fn local_addr(&self) -> SocketAddr {
        match self {
            Self::Datagram(l) => l.local_addr(),
            Self::Stream(l) => l.local_addr(),
        }
    }

    /// Start receiving; every unit is handed to `sink`
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<S: BufferSink>(self, sink: Arc<S>, flags: Arc<ControlFlags>) -> ListenerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let metrics = Arc::new(ListenerMetrics::new());
        let local_addr = self.local_addr();
        let protocol = self.protocol();

        let task_metrics = Arc::clone(&metrics);
        let join = match self {
            Self::Datagram(l) => tokio::spawn(l.run(sink, flags, stop_rx, task_metrics)),
            Self::Stream(l) => tokio::spawn(l.run(sink, flags, stop_rx, task_metrics)),
        };

        ListenerHandle {
            protocol,
            local_addr,
            stop_tx,
            join,
            metrics,
        }
    }
}

/// Running listener
pub struct ListenerHandle {
    protocol: Protocol,
    local_addr: SocketAddr,
    stop_tx: watch::Sender<bool>,
    join: JoinHandle<Result<()>>,
    metrics: Arc<ListenerMetrics>,
}

impl ListenerHandle {
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn metrics(&self) -> &Arc<ListenerMetrics> {
        &self.metrics
    }

    /// Whether the receive task already exited (stop, shutdown or failure)
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Ask the listener to stop; idempotent
    pub fn request_stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Stop receiving, close the socket(s) and wait for the task
    ///
    /// Returns the listener's own failure, if it ended with one.
    #[instrument(name = "listener_shutdown", skip(self), fields(local_addr = %self.local_addr))]
    pub async fn shutdown(self) -> Result<()> {
        self.request_stop();
        match self.join.await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Listener task failed");
                Err(IngestionError::TaskFailed(e.to_string()))
            }
        }
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
