//! Error types for workload signal sources

use std::time::Duration;
use taskguard_core::GuardError;
use thiserror::Error;

/// Work queue errors
#[derive(Debug, Error)]
pub enum QueueError {
    /// Receiving from the queue failed
    #[error("Receive failed: {0}")]
    Receive(String),

    /// Deleting a handled item failed
    #[error("Delete failed: {0}")]
    Delete(String),

    /// Receipt is unknown or its visibility window already lapsed
    #[error("Receipt not found: {0}")]
    ReceiptNotFound(String),
}

/// Workload-level errors
#[derive(Debug, Error)]
pub enum WorkloadError {
    /// Queue error
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Protection reconciler error
    #[error("Protection error: {0}")]
    Guard(#[from] GuardError),

    /// Protection was not reached in time
    #[error("Protection not acquired within {0:?}")]
    ProtectionTimeout(Duration),

    /// The work handler failed
    #[error("Handler error: {0}")]
    Handler(String),
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Result type for workload operations
pub type WorkloadResult<T> = Result<T, WorkloadError>;
