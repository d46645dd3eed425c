//! WebSocket connections
//!
//! Every open socket counts as work in progress: the first one takes out
//! protection and the last one to close lets it go. Shutdown leaves open
//! sockets alone.

use crate::api::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use taskguard_workload::ConnectionGuard;

/// Upgrade to a WebSocket
pub async fn ws_upgrade(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> ApiResult<Response> {
    if state.shutdown.is_requested() {
        return Err(ApiError::ShuttingDown);
    }

    Ok(ws.on_upgrade(move |socket| async move {
        let guard = state.connections.open();
        handle_socket(socket, guard, state).await;
    }))
}

async fn handle_socket(socket: WebSocket, guard: ConnectionGuard, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let welcome = format!("Welcome! There are {} connections", guard.count());
    if sender.send(Message::Text(welcome)).await.is_err() {
        return;
    }

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) if text == "ping" => {
                if sender.send(Message::Text("pong".to_string())).await.is_err() {
                    break;
                }
            }
            Ok(Message::Text(text)) => {
                tracing::info!(message = %text, "Received message");
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(error = %e, "WebSocket error");
                break;
            }
        }
    }

    drop(guard);
    tracing::debug!(connections = state.connections.count(), "Socket closed");
}
