//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - Listener -> Dispatcher -> Destination 全链路（回环地址）
//! - 背压、热重载、关闭时的 buffer 生命周期验证

#[cfg(test)]
mod harness {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use contracts::{
        BufferSink, BufferWatch, ControlFlags, DestinationSpec, ListenSpec, RelayTuning,
        SharedBuffer,
    };
    use dispatcher::{DestinationSettings, Dispatcher, WorkerPool};
    use ingestion::{Listener, ListenerConfig, ListenerHandle};
    use tokio::net::UdpSocket;
    use tokio::time::timeout;

    /// Forwards to the dispatcher, keeping a watch on every ingested unit
    pub struct WatchingSink {
        inner: Dispatcher,
        watches: Mutex<Vec<BufferWatch>>,
    }

    impl WatchingSink {
        pub fn ingested(&self) -> usize {
            self.watches.lock().unwrap().len()
        }

        pub fn all_released(&self) -> bool {
            self.watches.lock().unwrap().iter().all(|w| w.is_released())
        }
    }

    impl BufferSink for WatchingSink {
        fn submit(&self, buffer: SharedBuffer) {
            self.watches.lock().unwrap().push(buffer.watch());
            self.inner.submit(buffer);
        }
    }

    pub struct Harness {
        pub flags: Arc<ControlFlags>,
        pub pool: Arc<WorkerPool>,
        pub sink: Arc<WatchingSink>,
        pub listener: ListenerHandle,
    }

    impl Harness {
        pub async fn start(
            listen: ListenSpec,
            destinations: &[DestinationSpec],
            tuning: RelayTuning,
        ) -> Self {
            let flags = Arc::new(ControlFlags::new());
            let listener = Listener::bind(listen, &ListenerConfig::from(&tuning))
                .await
                .unwrap();
            let pool = Arc::new(WorkerPool::initialize(
                destinations,
                DestinationSettings::from(&tuning),
                Arc::clone(&flags),
            ));
            let sink = Arc::new(WatchingSink {
                inner: Dispatcher::new(Arc::clone(&pool)),
                watches: Mutex::new(Vec::new()),
            });
            let listener = listener.spawn(Arc::clone(&sink), Arc::clone(&flags));
            Self {
                flags,
                pool,
                sink,
                listener,
            }
        }

        /// Same order as the relay's terminal cleanup
        pub async fn shutdown(self) -> Arc<WatchingSink> {
            self.flags.request_shutdown();
            timeout(Duration::from_secs(10), async {
                self.listener.shutdown().await.unwrap();
                self.pool.shutdown().await;
            })
            .await
            .expect("shutdown did not finish in time");
            self.sink
        }
    }

    pub fn tuning() -> RelayTuning {
        RelayTuning {
            connect_timeout_ms: 200,
            send_timeout_ms: 500,
            reconnect_initial_ms: 10,
            reconnect_max_ms: 50,
            ..Default::default()
        }
    }

    pub async fn udp_receiver() -> (UdpSocket, DestinationSpec) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let spec = DestinationSpec::datagram(socket.local_addr().unwrap());
        (socket, spec)
    }

    pub async fn recv(socket: &UdpSocket) -> Vec<u8> {
        let mut buf = [0u8; 2048];
        let n = timeout(Duration::from_secs(5), socket.recv(&mut buf))
            .await
            .expect("datagram not received")
            .unwrap();
        buf[..n].to_vec()
    }

    pub async fn assert_silent(socket: &UdpSocket) {
        let mut buf = [0u8; 2048];
        assert!(
            timeout(Duration::from_millis(200), socket.recv(&mut buf))
                .await
                .is_err(),
            "unexpected datagram"
        );
    }

    pub fn localhost(protocol_prefix: &str) -> ListenSpec {
        ListenSpec::parse(&format!("{protocol_prefix}127.0.0.1:0")).unwrap()
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::io::Write;
    use std::time::Duration;

    use config_loader::ConfigLoader;
    use contracts::{encode_header, DestinationSpec};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream, UdpSocket};
    use tokio::time::timeout;

    use crate::harness::*;

    /// 数据报监听 -> 两个数据报目的地，各收到一次 "hello"
    #[tokio::test]
    async fn test_datagram_fanout_to_two_destinations() {
        let (a, spec_a) = udp_receiver().await;
        let (b, spec_b) = udp_receiver().await;
        let harness = Harness::start(localhost(""), &[spec_a, spec_b], tuning()).await;

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client
            .send_to(b"hello", harness.listener.local_addr())
            .await
            .unwrap();

        assert_eq!(recv(&a).await, b"hello");
        assert_eq!(recv(&b).await, b"hello");
        assert_silent(&a).await;
        assert_silent(&b).await;

        let sink = harness.shutdown().await;
        assert_eq!(sink.ingested(), 1);
        assert!(sink.all_released());
    }

    /// 流式监听 -> 流式目的地，帧原样转发（9 字节）
    #[tokio::test]
    async fn test_stream_frame_reemitted_unmodified() {
        let target = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let spec = DestinationSpec::stream(target.local_addr().unwrap());
        let harness = Harness::start(localhost("tcp@"), &[spec], tuning()).await;

        let mut client = TcpStream::connect(harness.listener.local_addr())
            .await
            .unwrap();
        client.write_all(&encode_header(5)).await.unwrap();
        client.write_all(b"hello").await.unwrap();

        let (mut peer, _) = timeout(Duration::from_secs(5), target.accept())
            .await
            .unwrap()
            .unwrap();
        let mut frame = [0u8; 9];
        timeout(Duration::from_secs(5), peer.read_exact(&mut frame))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&frame, b"\x00\x00\x00\x05hello");

        drop(client);
        let sink = harness.shutdown().await;
        assert!(sink.all_released());

        // destination connection closed at teardown
        let mut rest = Vec::new();
        let n = timeout(Duration::from_secs(5), peer.read_to_end(&mut rest))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 0);
    }

    /// 不可达的流式目的地：只影响自身（丢弃计数增长），健康目的地不受影响
    #[tokio::test]
    async fn test_unreachable_destination_is_isolated() {
        let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let dead = DestinationSpec::stream(closed.local_addr().unwrap());
        drop(closed);
        let (healthy, healthy_spec) = udp_receiver().await;

        let mut tuning = tuning();
        tuning.queue_capacity = 4;
        let harness = Harness::start(localhost(""), &[dead, healthy_spec], tuning).await;

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = harness.listener.local_addr();
        for i in 0..40u8 {
            client.send_to(&[i], target).await.unwrap();
            // keep the healthy destination's queue from filling
            assert_eq!(recv(&healthy).await, vec![i]);
        }

        let metrics = harness.pool.metrics();
        let dead_metrics = &metrics
            .iter()
            .find(|(name, _)| name.starts_with("tcp@"))
            .unwrap()
            .1;
        let healthy_metrics = &metrics
            .iter()
            .find(|(name, _)| name.starts_with("udp@"))
            .unwrap()
            .1;
        assert!(dead_metrics.dropped_count > 0);
        assert_eq!(dead_metrics.sent_count, 0);
        assert_eq!(healthy_metrics.dropped_count, 0);
        assert_eq!(harness.listener.metrics().snapshot().units_received, 40);

        let sink = harness.shutdown().await;
        assert!(sink.all_released());
    }

    /// 热重载移除一个目的地：其 worker 退出，之后不再收到数据，其余不受影响
    #[tokio::test]
    async fn test_reload_removes_destination() {
        let (kept, kept_spec) = udp_receiver().await;
        let (removed, removed_spec) = udp_receiver().await;

        let mut file = tempfile::Builder::new().suffix(".conf").tempfile().unwrap();
        writeln!(file, "# relay").unwrap();
        writeln!(file, "127.0.0.1:0").unwrap();
        writeln!(file, "{kept_spec}").unwrap();
        writeln!(file, "{removed_spec}   # goes away").unwrap();
        file.flush().unwrap();

        let config = ConfigLoader::load_from_path(file.path()).unwrap();
        assert_eq!(config.destinations, vec![kept_spec, removed_spec]);
        let harness = Harness::start(config.listen, &config.destinations, tuning()).await;

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = harness.listener.local_addr();
        client.send_to(b"before", target).await.unwrap();
        assert_eq!(recv(&kept).await, b"before");
        assert_eq!(recv(&removed).await, b"before");

        std::fs::write(file.path(), format!("127.0.0.1:0\n{kept_spec}\n")).unwrap();
        let reloaded = ConfigLoader::reload(&config).unwrap();
        let summary = timeout(
            Duration::from_secs(5),
            harness.pool.reconfigure(&reloaded.destinations),
        )
        .await
        .expect("reconfigure did not finish")
        .unwrap();
        assert_eq!(summary.retained, vec![kept_spec]);
        assert_eq!(summary.removed, vec![removed_spec]);
        assert!(summary.added.is_empty());

        client.send_to(b"after", target).await.unwrap();
        assert_eq!(recv(&kept).await, b"after");
        assert_silent(&removed).await;

        let sink = harness.shutdown().await;
        assert!(sink.all_released());
    }

    /// 超长帧头：连接立即关闭，不分配 buffer
    #[tokio::test]
    async fn test_oversized_frame_closes_connection() {
        let (receiver, spec) = udp_receiver().await;
        let mut tuning = tuning();
        tuning.max_frame_size = 1024;
        let harness = Harness::start(localhost("tcp@"), &[spec], tuning).await;

        let mut client = TcpStream::connect(harness.listener.local_addr())
            .await
            .unwrap();
        client.write_all(&encode_header(1025)).await.unwrap();

        let mut byte = [0u8; 1];
        let closed = timeout(Duration::from_secs(5), client.read(&mut byte))
            .await
            .expect("connection not closed");
        assert!(matches!(closed, Ok(0) | Err(_)));

        assert_eq!(harness.sink.ingested(), 0);
        assert_eq!(harness.listener.metrics().snapshot().frames_rejected, 1);
        assert!(!harness.flags.is_shutdown());
        assert_silent(&receiver).await;

        harness.shutdown().await;
    }

    /// 关闭：有界时间内退出，所有 buffer 均已释放
    #[tokio::test]
    async fn test_shutdown_releases_every_buffer() {
        // a destination that never drains keeps units queued until teardown
        let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let dead = DestinationSpec::stream(closed.local_addr().unwrap());
        drop(closed);
        let (healthy, healthy_spec) = udp_receiver().await;

        let harness = Harness::start(localhost(""), &[dead, healthy_spec], tuning()).await;
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        for i in 0..20u8 {
            client
                .send_to(&[i], harness.listener.local_addr())
                .await
                .unwrap();
            recv(&healthy).await;
        }

        let pool = std::sync::Arc::clone(&harness.pool);
        let sink = harness.shutdown().await;
        assert_eq!(sink.ingested(), 20);
        assert!(sink.all_released());
        assert!(pool.is_closed());
        assert!(pool.load().is_empty());
    }
}
