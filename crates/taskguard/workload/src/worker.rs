//! Queue worker that holds protection while it has work

use crate::error::WorkloadError;
use crate::handler::WorkHandler;
use crate::queue::{WorkItem, WorkQueue};
use crate::shutdown::ShutdownSignal;
use std::sync::Arc;
use std::time::Duration;
use taskguard_core::{GuardError, ProtectionState, Reconciler};
use tracing::Instrument;

/// Worker timing
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Longest wait for protection before giving up and exiting
    pub acquire_timeout: Duration,
    /// Pause after a failed receive
    pub receive_error_backoff: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            acquire_timeout: Duration::from_secs(30),
            receive_error_backoff: Duration::from_secs(1),
        }
    }
}

/// Counters returned when the worker stops
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    /// Items handled successfully
    pub processed: u64,
    /// Handled items that could not be deleted
    pub failed_deletes: u64,
    /// Failed receives
    pub receive_errors: u64,
    /// Items whose handler failed
    pub failed_items: u64,
}

/// Pulls work from a queue, protected while each item is in progress
pub struct QueueWorker {
    queue: Arc<dyn WorkQueue>,
    handler: Arc<dyn WorkHandler>,
    reconciler: Arc<Reconciler>,
    shutdown: ShutdownSignal,
    config: WorkerConfig,
}

impl QueueWorker {
    /// Create a worker
    pub fn new(
        queue: Arc<dyn WorkQueue>,
        handler: Arc<dyn WorkHandler>,
        reconciler: Arc<Reconciler>,
        shutdown: ShutdownSignal,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            handler,
            reconciler,
            shutdown,
            config,
        }
    }

    /// Run until shutdown is requested or protection cannot be acquired.
    ///
    /// Polling happens unprotected. Protection is acquired once an item is in
    /// hand and released after it is handled; the maintain window keeps the
    /// lease across back-to-back items.
    pub async fn run(self) -> WorkerReport {
        let mut report = WorkerReport::default();
        tracing::info!("Queue worker started");

        loop {
            if self.shutdown.is_requested() {
                break;
            }

            let item = match self.queue.receive().await {
                Ok(item) => item,
                Err(e) => {
                    report.receive_errors += 1;
                    tracing::warn!(error = %e, "Receive failed");
                    tokio::select! {
                        _ = tokio::time::sleep(self.config.receive_error_backoff) => {}
                        _ = self.shutdown.wait() => {}
                    }
                    continue;
                }
            };

            let Some(item) = item else {
                tracing::debug!("Queue empty");
                continue;
            };

            if let Err(e) = self.protect().await {
                tracing::error!(
                    error = %e,
                    message_id = %item.id,
                    "Could not protect task, leaving item for redelivery and stopping worker"
                );
                self.shutdown.request();
                break;
            }

            let span = tracing::info_span!("work_item", message_id = %item.id);
            self.process(&item, &mut report).instrument(span).await;

            self.reconciler.desire(ProtectionState::Unprotected);
            self.reconciler.trigger();
        }

        tracing::info!(
            processed = report.processed,
            failed_items = report.failed_items,
            failed_deletes = report.failed_deletes,
            receive_errors = report.receive_errors,
            "Queue worker stopped"
        );
        report
    }

    async fn protect(&self) -> Result<(), WorkloadError> {
        loop {
            let timeout = self.config.acquire_timeout;
            match tokio::time::timeout(timeout, self.reconciler.acquire()).await {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(GuardError::Superseded { .. })) => {
                    tracing::debug!("Protection request superseded, retrying");
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => return Err(WorkloadError::ProtectionTimeout(timeout)),
            }
        }
    }

    async fn process(&self, item: &WorkItem, report: &mut WorkerReport) {
        if let Err(e) = self.handler.handle(item).await {
            report.failed_items += 1;
            tracing::warn!(error = %e, "Handler failed, leaving item for redelivery");
            return;
        }

        match self.queue.delete(&item.receipt).await {
            Ok(()) => {
                report.processed += 1;
                tracing::info!("Work item done");
            }
            Err(e) => {
                report.failed_deletes += 1;
                tracing::warn!(error = %e, "Delete failed, item may be redelivered");
            }
        }
    }
}
