//! # Dispatcher
//!
//! 数据分发模块。
//!
//! 负责：
//! - 接收 listener 交来的 `SharedBuffer`
//! - Fan-out 到当前代 (generation) 的所有 destination
//! - 每个 destination 独立队列 + worker，慢 destination 不阻塞主链路
//! - 热重载：保留未变化的 destination，只重建新增/移除的部分

pub mod backoff;
pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod pool;
pub mod transports;

pub use contracts::{BufferSink, SharedBuffer, Transport};
pub use dispatcher::{DispatchOutcome, DispatchStats, Dispatcher};
pub use error::DispatcherError;
pub use handle::{Destination, DestinationSettings, WorkerHandle};
pub use metrics::{ConnectionState, DestinationMetrics, MetricsSnapshot};
pub use pool::{Generation, ReloadSummary, WorkerPool};
pub use transports::{DatagramTransport, StreamTransport};
