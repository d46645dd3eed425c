use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use std::sync::Arc;
use taskguard_core::{
    ProtectionClient, ProtectionRequest, ProtectionResult, Reconciler, ReconcilerConfig,
};
use taskguard_daemon::{create_router, AppState};
use taskguard_workload::{ConnectionTracker, ShutdownSignal};
use tower::ServiceExt;

struct AcceptingClient;

#[async_trait]
impl ProtectionClient for AcceptingClient {
    async fn set_protection(&self, _request: &ProtectionRequest) -> ProtectionResult<()> {
        Ok(())
    }
}

fn test_state() -> AppState {
    let (reconciler, _reconcile_rx) =
        Reconciler::new(ReconcilerConfig::default(), Arc::new(AcceptingClient)).unwrap();
    let connections = ConnectionTracker::new(reconciler.clone());
    AppState::new(reconciler, connections, ShutdownSignal::new())
}

async fn get(state: AppState, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = create_router(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn health_check_answers_healthy() {
    let (status, body) = get(test_state(), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"Healthy");
}

#[tokio::test]
async fn status_reports_connections_and_protection() {
    let state = test_state();
    let _guard = state.connections.open();

    let (status, body) = get(state.clone(), "/status").await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(json["connections"], 1);
    assert_eq!(json["protection"]["desired"], "protected");
    assert_eq!(json["protection"]["lease_minutes"], 60);
}

#[tokio::test]
async fn status_shows_draining_after_shutdown() {
    let state = test_state();
    state.shutdown.request();

    let (_, body) = get(state, "/status").await;
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "draining");
}

#[tokio::test]
async fn unknown_route_is_json_not_found() {
    let (status, body) = get(test_state(), "/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "Not found: /nope");
}

#[tokio::test]
async fn ws_requires_upgrade() {
    let (status, _) = get(test_state(), "/ws").await;
    assert!(status.is_client_error());
}
