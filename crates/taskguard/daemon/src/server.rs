//! Server setup and lifecycle management

use crate::api::{create_router, AppState};
use crate::config::DaemonConfig;
use crate::error::{DaemonError, DaemonResult};
use std::sync::Arc;
use taskguard_core::{AgentClient, Reconciler};
use taskguard_workload::{ConnectionTracker, ShutdownSignal};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Taskguard daemon server
pub struct Server {
    config: DaemonConfig,
    reconciler: Arc<Reconciler>,
    reconcile_rx: mpsc::Receiver<()>,
    connections: Arc<ConnectionTracker>,
    shutdown: ShutdownSignal,
}

impl Server {
    /// Create a new server with the given configuration
    pub fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let client = protection_client(&config)?;
        let (reconciler, reconcile_rx) =
            Reconciler::new(config.protection.clone(), Arc::new(client))?;
        let connections = ConnectionTracker::with_settle_timeout(
            reconciler.clone(),
            config.server.settle_timeout(),
        );

        Ok(Self {
            config,
            reconciler,
            reconcile_rx,
            connections,
            shutdown: ShutdownSignal::new(),
        })
    }

    /// Run the server until a shutdown signal arrives
    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;

        let state = AppState::new(
            self.reconciler.clone(),
            self.connections.clone(),
            self.shutdown.clone(),
        );
        let app = create_router(state);

        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Taskguard daemon listening on {}", addr);

        let scheduler = tokio::spawn(self.reconciler.clone().start(self.reconcile_rx));

        let shutdown = self.shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                shutdown.request();
            })
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        tracing::info!(
            connections = self.connections.count(),
            protection = %self.reconciler.status().current,
            "Taskguard daemon shutting down, leaving protection to expire"
        );

        self.reconciler.shutdown();
        if let Err(e) = scheduler.await {
            tracing::warn!(error = %e, "Scheduler task ended abnormally");
        }

        Ok(())
    }
}

/// Build the agent client, failing when no agent URI is configured
pub(crate) fn protection_client(config: &DaemonConfig) -> DaemonResult<AgentClient> {
    let agent_uri = config.agent.uri.as_deref().ok_or_else(|| {
        DaemonError::Config("ECS agent URI is not set (--agent-uri or ECS_AGENT_URI)".to_string())
    })?;

    let client = AgentClient::with_timeout(agent_uri, config.agent.request_timeout())?;
    tracing::info!(endpoint = %client.state_url(), "Using task protection endpoint");
    Ok(client)
}

/// Resolves on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
