//! Workload signal sources for the task protection reconciler
//!
//! Two ways of telling the reconciler whether the task is busy:
//! - [`QueueWorker`] protects the task while a queue item is in progress
//! - [`ConnectionTracker`] protects it while any connection is open
//!
//! [`SqsQueue`] binds the worker to Amazon SQS; [`InMemoryQueue`] serves tests
//! and local runs.

pub mod connections;
pub mod error;
pub mod handler;
pub mod queue;
pub mod shutdown;
pub mod sqs;
pub mod worker;

pub use connections::{ConnectionGuard, ConnectionTracker};
pub use error::{QueueError, QueueResult, WorkloadError, WorkloadResult};
pub use handler::{processing_time, SleepHandler, WorkHandler};
pub use queue::{InMemoryQueue, QueueConfig, WorkItem, WorkQueue};
pub use shutdown::ShutdownSignal;
pub use sqs::SqsQueue;
pub use worker::{QueueWorker, WorkerConfig, WorkerReport};
