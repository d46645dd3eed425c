//! API Router configuration

use super::handlers;
use super::state::AppState;
use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::health_check))
        .route("/status", get(handlers::daemon_status))
        .route("/ws", get(handlers::ws_upgrade))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
