//! DatagramTransport - UDP fire-and-forget delivery

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use contracts::{ContractError, SharedBuffer, Transport};
use tokio::net::UdpSocket;
use tracing::{debug, instrument};

/// Transport that sends every unit as one UDP datagram
pub struct DatagramTransport {
    name: String,
    addr: SocketAddr,
    socket: Option<UdpSocket>,
}

impl DatagramTransport {
    /// Create a new, not yet bound, DatagramTransport
    pub fn new(name: impl Into<String>, addr: SocketAddr) -> Self {
        Self {
            name: name.into(),
            addr,
            socket: None,
        }
    }

    fn local_bind_addr(&self) -> SocketAddr {
        match self.addr {
            SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
        }
    }
}

impl Transport for DatagramTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    #[instrument(name = "datagram_transport_connect", skip(self), fields(destination = %self.name))]
    async fn connect(&mut self) -> Result<(), ContractError> {
        // Bind to any available port
        let socket = UdpSocket::bind(self.local_bind_addr())
            .await
            .map_err(|e| ContractError::transport_connect(&self.name, e.to_string()))?;
        socket
            .connect(self.addr)
            .await
            .map_err(|e| ContractError::transport_connect(&self.name, e.to_string()))?;

        debug!(destination = %self.name, target = %self.addr, "DatagramTransport ready");
        self.socket = Some(socket);
        Ok(())
    }

    async fn send(&mut self, buffer: &SharedBuffer) -> Result<(), ContractError> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| ContractError::not_connected(&self.name))?;

        // The socket stays open on error: datagram loss is tolerated and the
        // next unit is attempted as usual.
        let sent = socket
            .send(buffer.as_slice())
            .await
            .map_err(|e| ContractError::transport_write(&self.name, e.to_string()))?;

        if sent != buffer.as_slice().len() {
            return Err(ContractError::transport_write(
                &self.name,
                format!("short datagram: {sent} of {} bytes", buffer.len()),
            ));
        }
        Ok(())
    }

    #[instrument(name = "datagram_transport_close", skip(self), fields(destination = %self.name))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.socket = None;
        debug!(destination = %self.name, "DatagramTransport closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_one_datagram_per_unit() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = receiver.local_addr().unwrap();

        let mut transport = DatagramTransport::new("udp-test", addr);
        assert!(!transport.is_connected());
        transport.connect().await.unwrap();
        assert!(transport.is_connected());

        let buffer = SharedBuffer::copy_from_slice(b"hello").unwrap();
        transport.send(&buffer).await.unwrap();

        let mut buf = [0u8; 64];
        let n = receiver.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"hello");
    }

    #[tokio::test]
    async fn test_send_before_connect_fails() {
        let mut transport = DatagramTransport::new("udp-test", "127.0.0.1:9".parse().unwrap());
        let buffer = SharedBuffer::copy_from_slice(b"x").unwrap();
        let err = transport.send(&buffer).await.unwrap_err();
        assert!(matches!(err, ContractError::NotConnected { .. }));
    }

    #[tokio::test]
    async fn test_close_drops_socket() {
        let mut transport = DatagramTransport::new("udp-test", "127.0.0.1:9".parse().unwrap());
        transport.connect().await.unwrap();
        transport.close().await.unwrap();
        assert!(!transport.is_connected());
    }
}
