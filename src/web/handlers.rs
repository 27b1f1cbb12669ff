//! HTTP request handlers and the WebSocket transport adapter.

use super::AppState;
use crate::db::SpecStore;
use crate::hub::Hub;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;

pub async fn handle_healthz(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "subscribers": state.hub.subscriber_count(),
    }))
}

pub async fn handle_get_services(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.list_all() {
        Ok(services) => Json(services).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct ResultsQuery {
    #[serde(default)]
    pub limit: Option<u32>,
}

pub async fn handle_get_results(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<ResultsQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(50).min(500);
    match state.store.recent_results(id, limit) {
        Ok(results) => Json(results).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Upgrade the connection and stream status updates until the client goes
/// away.
pub async fn handle_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| stream_updates(socket, state.hub.clone()))
}

async fn stream_updates(socket: WebSocket, hub: Hub) {
    let mut sub = hub.subscribe();
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            update = sub.next() => {
                let Some(update) = update else { break };
                let frame = match serde_json::to_string(&update) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::error!("Failed to encode status update: {}", e);
                        continue;
                    }
                };
                if sender.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            inbound = receiver.next() => {
                // Inbound frames keep the connection readable; their content
                // is ignored.
                match inbound {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    sub.close();
    tracing::debug!(subscriber = sub.id(), "viewer disconnected");
}
