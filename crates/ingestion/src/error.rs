//! Ingestion 错误类型

use std::io;

use contracts::ContractError;
use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 监听地址绑定失败
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// 监听地址
        address: String,
        #[source]
        source: io::Error,
    },

    /// Datagram 接收失败（监听器级别，触发全局 shutdown）
    #[error("datagram receive failed: {0}")]
    Receive(#[source] io::Error),

    /// Stream accept 失败（监听器级别，触发全局 shutdown）
    #[error("stream accept failed: {0}")]
    Accept(#[source] io::Error),

    /// 合约层错误（包括帧长度超限，仅关闭该连接）
    #[error(transparent)]
    Contract(#[from] ContractError),

    /// 连接级 IO 错误
    #[error(transparent)]
    Io(#[from] io::Error),

    /// 监听任务异常退出
    #[error("listener task failed: {0}")]
    TaskFailed(String),
}

impl IngestionError {
    /// 创建绑定错误
    pub fn bind(address: impl ToString, source: io::Error) -> Self {
        Self::Bind {
            address: address.to_string(),
            source,
        }
    }

    /// 连接被对端正常关闭（EOF）
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof)
    }
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
