//! Datagram listener: one received datagram is one unit

use std::net::SocketAddr;
use std::sync::Arc;

use contracts::{BufferSink, ControlFlags, SharedBuffer, MAX_DATAGRAM_SIZE};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, error, info, trace};

use super::stop_requested;
use crate::config::ListenerMetrics;
use crate::error::{IngestionError, Result};

pub struct DatagramListener {
    socket: UdpSocket,
    local_addr: SocketAddr,
}

impl DatagramListener {
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| IngestionError::bind(addr, e))?;
        let local_addr = socket.local_addr()?;
        Ok(Self { socket, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Receive loop
    ///
    /// A receive error ends ingestion for the whole relay, so it sets
    /// `SHUTDOWN` before returning. The socket is closed when this returns.
    pub(crate) async fn run<S: BufferSink>(
        self,
        sink: Arc<S>,
        flags: Arc<ControlFlags>,
        mut stop: watch::Receiver<bool>,
        metrics: Arc<ListenerMetrics>,
    ) -> Result<()> {
        info!(address = %self.local_addr, "Datagram listener started");
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            if flags.is_shutdown() {
                break;
            }

            let received = tokio::select! {
                biased;
                _ = stop_requested(&mut stop) => break,
                received = self.socket.recv_from(&mut buf) => received,
            };

            match received {
                Ok((0, peer)) => {
                    trace!(peer = %peer, "Empty datagram ignored");
                }
                Ok((len, peer)) => {
                    let buffer = SharedBuffer::copy_from_slice(&buf[..len])?;
                    metrics.record_unit(len);
                    observability::record_unit_received("udp", len);
                    trace!(peer = %peer, len, "Datagram received");
                    sink.submit(buffer);
                }
                Err(e) => {
                    error!(address = %self.local_addr, error = %e, "Datagram receive failed, shutting down");
                    flags.request_shutdown();
                    return Err(IngestionError::Receive(e));
                }
            }
        }

        debug!(address = %self.local_addr, "Datagram listener stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::listeners::Listener;
    use crate::testing::CollectingSink;
    use crate::ListenerConfig;
    use contracts::{ControlFlags, ListenSpec};
    use std::sync::Arc;
    use tokio::net::UdpSocket;

    #[tokio::test]
    async fn test_each_datagram_is_one_unit() {
        let spec = ListenSpec::datagram("127.0.0.1:0".parse().unwrap());
        let listener = Listener::bind(spec, &ListenerConfig::default()).await.unwrap();
        let sink = Arc::new(CollectingSink::default());
        let flags = Arc::new(ControlFlags::new());
        let handle = listener.spawn(Arc::clone(&sink), Arc::clone(&flags));

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(b"hello", handle.local_addr()).await.unwrap();
        client.send_to(b"", handle.local_addr()).await.unwrap();
        client.send_to(b"world", handle.local_addr()).await.unwrap();

        sink.wait_for(2).await;
        assert_eq!(sink.units(), vec![b"hello".to_vec(), b"world".to_vec()]);
        assert_eq!(handle.metrics().snapshot().bytes_received, 10);

        handle.shutdown().await.unwrap();
        assert!(!flags.is_shutdown());
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        let taken = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let spec = ListenSpec::datagram(taken.local_addr().unwrap());
        let err = Listener::bind(spec, &ListenerConfig::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, crate::IngestionError::Bind { .. }));
    }
}
