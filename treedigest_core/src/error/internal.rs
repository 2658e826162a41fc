//! Internal pipeline error types

use std::time::Duration;
use thiserror::Error;

/// Errors raised by the worker pool and the buffer ring
///
/// None of these are per-file conditions: once one is returned the pool may
/// hold workers in an unknown state and should be shut down.
#[derive(Error, Debug)]
pub enum InternalError {
    /// A worker did not answer within the configured wait
    #[error("Worker '{algorithm}' did not respond within {waited:?}")]
    WorkerHang { algorithm: String, waited: Duration },

    /// A worker's channel closed while the orchestrator still expected messages
    #[error("Worker '{algorithm}' disconnected")]
    WorkerDisconnected { algorithm: String },

    /// A worker rejected a command or sent an unexpected message
    #[error("Worker '{algorithm}' protocol violation: {message}")]
    WorkerProtocol { algorithm: String, message: String },

    /// A worker thread panicked before it could be joined
    #[error("Worker '{algorithm}' panicked")]
    WorkerPanicked { algorithm: String },

    /// Attempted to overwrite a buffer that a consumer still holds
    #[error("Buffer {index} is still in use")]
    BufferInUse { index: usize },
}

impl InternalError {
    /// Create a worker hang error
    pub fn worker_hang(algorithm: &str, waited: Duration) -> Self {
        Self::WorkerHang {
            algorithm: algorithm.to_string(),
            waited,
        }
    }

    /// Create a worker disconnected error
    pub fn worker_disconnected(algorithm: &str) -> Self {
        Self::WorkerDisconnected {
            algorithm: algorithm.to_string(),
        }
    }

    /// Create a worker protocol error
    pub fn worker_protocol(algorithm: &str, message: impl Into<String>) -> Self {
        Self::WorkerProtocol {
            algorithm: algorithm.to_string(),
            message: message.into(),
        }
    }

    /// Create a worker panicked error
    pub fn worker_panicked(algorithm: &str) -> Self {
        Self::WorkerPanicked {
            algorithm: algorithm.to_string(),
        }
    }

    /// Create a buffer in use error
    pub fn buffer_in_use(index: usize) -> Self {
        Self::BufferInUse { index }
    }
}
