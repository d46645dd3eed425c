//! Application state for API handlers

use std::sync::Arc;
use taskguard_core::Reconciler;
use taskguard_workload::{ConnectionTracker, ShutdownSignal};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Protection reconciler
    pub reconciler: Arc<Reconciler>,

    /// Live WebSocket connections
    pub connections: Arc<ConnectionTracker>,

    /// Graceful shutdown flag
    pub shutdown: ShutdownSignal,

    /// Daemon version
    pub version: String,

    /// Daemon start time
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        reconciler: Arc<Reconciler>,
        connections: Arc<ConnectionTracker>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            reconciler,
            connections,
            shutdown,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: chrono::Utc::now(),
        }
    }

    /// Seconds since start
    pub fn uptime_secs(&self) -> u64 {
        let secs = (chrono::Utc::now() - self.started_at).num_seconds();
        u64::try_from(secs).unwrap_or(0)
    }
}
