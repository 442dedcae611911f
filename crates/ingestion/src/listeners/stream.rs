//! Stream listener: length-prefixed frames over accepted TCP connections

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use contracts::{
    check_frame_len, decode_header, BufferSink, ControlFlags, SharedBuffer, FRAME_HEADER_LEN,
};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, trace, warn};

use super::stop_requested;
use crate::config::{ListenerConfig, ListenerMetrics};
use crate::error::{IngestionError, Result};

pub struct StreamListener {
    listener: TcpListener,
    local_addr: SocketAddr,
    max_frame_size: u32,
}

impl StreamListener {
    pub async fn bind(addr: SocketAddr, config: &ListenerConfig) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| IngestionError::bind(addr, e))?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            max_frame_size: config.max_frame_size,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept loop
    ///
    /// Each connection is read by its own task. An accept error sets
    /// `SHUTDOWN`. On return every connection task has finished and the
    /// listening socket is closed.
    pub(crate) async fn run<S: BufferSink>(
        self,
        sink: Arc<S>,
        flags: Arc<ControlFlags>,
        mut stop: watch::Receiver<bool>,
        metrics: Arc<ListenerMetrics>,
    ) -> Result<()> {
        info!(
            address = %self.local_addr,
            max_frame_size = self.max_frame_size,
            "Stream listener started"
        );
        let mut connections = JoinSet::new();

        let result = loop {
            if flags.is_shutdown() {
                break Ok(());
            }

            tokio::select! {
                biased;
                _ = stop_requested(&mut stop) => break Ok(()),
                Some(finished) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = finished {
                        warn!(error = %e, "Connection task failed");
                    }
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        metrics.record_opened();
                        observability::record_connection_opened();
                        debug!(peer = %peer, "Connection accepted");
                        connections.spawn(serve_connection(
                            stream,
                            peer,
                            Arc::clone(&sink),
                            Arc::clone(&flags),
                            stop.clone(),
                            Arc::clone(&metrics),
                            self.max_frame_size,
                        ));
                    }
                    Err(e) => {
                        error!(address = %self.local_addr, error = %e, "Accept failed, shutting down");
                        flags.request_shutdown();
                        break Err(IngestionError::Accept(e));
                    }
                },
            }
        };

        drop(self.listener);
        // connection tasks observe the same stop signal; a listener that
        // failed on its own has to end them explicitly
        if result.is_err() {
            connections.abort_all();
        }
        while connections.join_next().await.is_some() {}

        debug!(address = %self.local_addr, "Stream listener stopped");
        result
    }
}

async fn serve_connection<S: BufferSink>(
    mut stream: TcpStream,
    peer: SocketAddr,
    sink: Arc<S>,
    flags: Arc<ControlFlags>,
    mut stop: watch::Receiver<bool>,
    metrics: Arc<ListenerMetrics>,
    max_frame_size: u32,
) {
    let result = tokio::select! {
        biased;
        _ = stop_requested(&mut stop) => Ok(()),
        result = read_frames(&mut stream, sink.as_ref(), &flags, &metrics, max_frame_size) => result,
    };

    match result {
        Ok(()) => debug!(peer = %peer, "Connection closed"),
        Err(e) => warn!(peer = %peer, error = %e, "Connection dropped"),
    }
    metrics.record_closed();
    observability::record_connection_closed();
}

/// Read frames until EOF, a protocol violation, or shutdown
///
/// The length header is checked before any payload storage is allocated.
/// A clean EOF on a frame boundary ends the connection without error; EOF
/// inside a header or payload counts as a rejected frame.
pub(crate) async fn read_frames<R, S>(
    reader: &mut R,
    sink: &S,
    flags: &ControlFlags,
    metrics: &ListenerMetrics,
    max_frame_size: u32,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    S: BufferSink + ?Sized,
{
    let mut header = [0u8; FRAME_HEADER_LEN];
    loop {
        if flags.is_shutdown() {
            return Ok(());
        }

        match read_header(reader, &mut header).await {
            Ok(true) => {}
            Ok(false) => return Ok(()),
            Err(e) => {
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    metrics.record_rejected();
                    observability::record_frame_rejected("truncated");
                }
                return Err(e.into());
            }
        }

        let len = decode_header(header);
        if let Err(e) = check_frame_len(len, max_frame_size) {
            metrics.record_rejected();
            observability::record_frame_rejected("oversized");
            return Err(e.into());
        }

        let mut payload = BytesMut::zeroed(len as usize);
        if let Err(e) = reader.read_exact(&mut payload).await {
            metrics.record_rejected();
            observability::record_frame_rejected("truncated");
            return Err(e.into());
        }

        let buffer = SharedBuffer::new(payload.freeze())?;
        metrics.record_unit(len as usize);
        observability::record_unit_received("tcp", len as usize);
        trace!(len, "Frame received");
        sink.submit(buffer);
    }
}

/// Fill `header`; `Ok(false)` when the peer closed before its first byte
async fn read_header<R: AsyncRead + Unpin>(
    reader: &mut R,
    header: &mut [u8; FRAME_HEADER_LEN],
) -> std::io::Result<bool> {
    let mut filled = 0;
    while filled < FRAME_HEADER_LEN {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(false);
            }
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("closed after {filled} of {FRAME_HEADER_LEN} header bytes"),
            ));
        }
        filled += n;
    }
    Ok(true)
}
