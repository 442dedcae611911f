//! StreamTransport - length-prefixed frames over a persistent TCP connection

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Buf;
use contracts::{encode_header, ContractError, SharedBuffer, Transport};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

/// Transport that re-emits every unit as `[len: u32 BE][payload]`
pub struct StreamTransport {
    name: String,
    addr: SocketAddr,
    connect_timeout: Duration,
    send_timeout: Duration,
    stream: Option<TcpStream>,
}

impl StreamTransport {
    pub fn new(
        name: impl Into<String>,
        addr: SocketAddr,
        connect_timeout: Duration,
        send_timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            addr,
            connect_timeout,
            send_timeout,
            stream: None,
        }
    }

    /// Drop the connection; the next unit triggers a reconnect.
    fn tear_down(&mut self, reason: &str) {
        if self.stream.take().is_some() {
            warn!(destination = %self.name, reason, "connection torn down");
        }
    }
}

impl Transport for StreamTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    #[instrument(name = "stream_transport_connect", skip(self), fields(destination = %self.name))]
    async fn connect(&mut self) -> Result<(), ContractError> {
        let stream = match timeout(self.connect_timeout, TcpStream::connect(self.addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(ContractError::transport_connect(&self.name, e.to_string())),
            Err(_) => {
                return Err(ContractError::transport_connect(
                    &self.name,
                    format!("timed out after {:?}", self.connect_timeout),
                ))
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!(destination = %self.name, error = %e, "failed to set TCP_NODELAY");
        }

        debug!(destination = %self.name, target = %self.addr, "StreamTransport connected");
        self.stream = Some(stream);
        Ok(())
    }

    async fn send(&mut self, buffer: &SharedBuffer) -> Result<(), ContractError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| ContractError::not_connected(&self.name))?;

        let header = encode_header(buffer.len());
        let mut frame = Buf::chain(&header[..], buffer.as_slice());

        // write_all_buf keeps writing until the whole frame is out, so short
        // writes are retried within the send timeout.
        let result = timeout(self.send_timeout, stream.write_all_buf(&mut frame)).await;

        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                self.tear_down("write failed");
                Err(ContractError::transport_write(&self.name, e.to_string()))
            }
            Err(_) => {
                self.tear_down("write timed out");
                Err(ContractError::transport_write(
                    &self.name,
                    format!("timed out after {:?}", self.send_timeout),
                ))
            }
        }
    }

    #[instrument(name = "stream_transport_close", skip(self), fields(destination = %self.name))]
    async fn close(&mut self) -> Result<(), ContractError> {
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown().await?;
        }
        debug!(destination = %self.name, "StreamTransport closed");
        Ok(())
    }
}
