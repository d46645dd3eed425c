//! Health and status handlers

use crate::api::state::AppState;
use crate::error::ApiError;
use axum::{extract::State, http::Uri, Json};
use serde::Serialize;
use taskguard_core::ProtectionStatus;

/// Load balancer health check
pub async fn health_check() -> &'static str {
    "Healthy"
}

/// Daemon status response
#[derive(Debug, Serialize)]
pub struct DaemonStatusResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub connections: usize,
    pub protection: ProtectionStatus,
}

/// Daemon status endpoint
pub async fn daemon_status(State(state): State<AppState>) -> Json<DaemonStatusResponse> {
    let status = if state.shutdown.is_requested() {
        "draining"
    } else {
        "healthy"
    };

    Json(DaemonStatusResponse {
        status: status.to_string(),
        version: state.version.clone(),
        uptime_secs: state.uptime_secs(),
        connections: state.connections.count(),
        protection: state.reconciler.status(),
    })
}

/// Fallback for unknown routes
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}
