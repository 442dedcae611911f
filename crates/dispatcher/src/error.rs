//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Pool already torn down
    #[error("worker pool has been shut down")]
    ShutDown,

    /// A destination worker task panicked or was cancelled
    #[error("worker for destination '{destination}' failed: {message}")]
    WorkerFailed {
        destination: String,
        message: String,
    },
}

impl DispatcherError {
    /// Create a worker failure error
    pub fn worker_failed(destination: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WorkerFailed {
            destination: destination.into(),
            message: message.into(),
        }
    }
}
