//! Queue worker service lifecycle

use crate::config::DaemonConfig;
use crate::error::{DaemonError, DaemonResult};
use crate::server::{protection_client, shutdown_signal};
use std::sync::Arc;
use taskguard_core::Reconciler;
use taskguard_workload::{
    QueueWorker, ShutdownSignal, SleepHandler, SqsQueue, WorkHandler, WorkQueue, WorkerConfig,
    WorkerReport,
};
use tokio::sync::mpsc;

/// Queue consumer whose in-progress items keep the task protected
pub struct WorkerService {
    queue: Arc<dyn WorkQueue>,
    handler: Arc<dyn WorkHandler>,
    reconciler: Arc<Reconciler>,
    reconcile_rx: mpsc::Receiver<()>,
    shutdown: ShutdownSignal,
    config: WorkerConfig,
}

impl WorkerService {
    /// Build the service against SQS and the ECS agent.
    ///
    /// Both the queue URI and the agent URI are required.
    pub async fn new(config: &DaemonConfig) -> DaemonResult<Self> {
        let queue_uri = config.queue.uri.clone().ok_or_else(|| {
            DaemonError::Config(
                "Queue URI is not set (--queue-uri or COPILOT_QUEUE_URI)".to_string(),
            )
        })?;

        let client = protection_client(config)?;
        let (reconciler, reconcile_rx) =
            Reconciler::new(config.protection.clone(), Arc::new(client))?;

        let queue = SqsQueue::from_env(queue_uri, config.queue.queue_config()).await;
        tracing::info!(queue_url = %queue.queue_url(), "Consuming work queue");

        Ok(Self::with_parts(
            Arc::new(queue),
            Arc::new(SleepHandler::default()),
            reconciler,
            reconcile_rx,
            config.worker.worker_config(),
        ))
    }

    /// Assemble the service from its parts
    pub fn with_parts(
        queue: Arc<dyn WorkQueue>,
        handler: Arc<dyn WorkHandler>,
        reconciler: Arc<Reconciler>,
        reconcile_rx: mpsc::Receiver<()>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            handler,
            reconciler,
            reconcile_rx,
            shutdown: ShutdownSignal::new(),
            config,
        }
    }

    /// Signal that stops the worker after its current item
    pub fn shutdown_handle(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Run until a shutdown signal arrives or protection cannot be acquired
    pub async fn run(self) -> DaemonResult<WorkerReport> {
        let scheduler = tokio::spawn(self.reconciler.clone().start(self.reconcile_rx));

        let signals = tokio::spawn({
            let shutdown = self.shutdown.clone();
            async move {
                shutdown_signal().await;
                shutdown.request();
            }
        });

        let worker = QueueWorker::new(
            self.queue,
            self.handler,
            self.reconciler.clone(),
            self.shutdown,
            self.config,
        );
        let report = worker.run().await;
        signals.abort();

        tracing::info!(
            protection = %self.reconciler.status().current,
            "Queue worker shutting down, leaving protection to expire"
        );

        self.reconciler.shutdown();
        if let Err(e) = scheduler.await {
            tracing::warn!(error = %e, "Scheduler task ended abnormally");
        }

        Ok(report)
    }
}
