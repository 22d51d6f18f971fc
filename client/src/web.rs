//! HTTP/WebSocket surface for the dashboard page.
//!
//! One WebSocket per dashboard tab: telemetry snapshots and link-status
//! banners flow out, key transitions flow in. `/api/recent` back-fills a tab
//! that attaches mid-session.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;
use vehiclestation_shared::{KeyEvent, LinkStatus, TelemetryRow};

use crate::state::AppState;

const DEFAULT_RECENT_LIMIT: usize = 256;

/// Where the dashboard page lives. Overridable for packaged installs.
fn static_dir() -> PathBuf {
    if let Ok(path) = std::env::var("STATION_STATIC_DIR") {
        return PathBuf::from(path);
    }
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("static")
}

/// Public router constructor
pub fn router(state: Arc<AppState>) -> Router {
    let static_files = ServeDir::new(static_dir());

    Router::new()
        .layer(CompressionLayer::new())
        .route("/api/recent", get(get_recent))
        .route("/ws", get(ws_handler))
        // anything that doesn't match the above routes goes to the static files
        .fallback_service(static_files)
        .with_state(state)
}

/// Outgoing WebSocket messages. The page deserializes:
///   { "ty": "Telemetry", "data": { ...TelemetryRow... } }
///   { "ty": "Status",    "data": "connected" }
#[derive(Serialize)]
#[serde(tag = "ty", content = "data")]
enum WsOutMsg {
    Telemetry(TelemetryRow),
    Status(LinkStatus),
}

#[derive(Deserialize)]
struct RecentParams {
    limit: Option<usize>,
}

async fn get_recent(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RecentParams>,
) -> impl IntoResponse {
    let limit = params.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
    let rows = state
        .history
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .recent(limit);
    Json(rows)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn handle_ws(socket: WebSocket, state: Arc<AppState>) {
    let mut telemetry_rx = state.telemetry_tx.subscribe();
    let mut status_rx = state.status_tx.subscribe();
    let key_tx = state.key_tx.clone();
    let (mut sender, mut receiver) = socket.split();

    // A tab attaching mid-session needs the current banner immediately.
    let hello = WsOutMsg::Status(state.current_status());
    if send_msg(&mut sender, &hello).await.is_err() {
        return;
    }

    // Task: server -> client (telemetry + status multiplexed)
    let send_task = async move {
        loop {
            tokio::select! {
                recv = status_rx.recv() => {
                    match recv {
                        Ok(status) => {
                            if send_msg(&mut sender, &WsOutMsg::Status(status)).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => {}
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                recv = telemetry_rx.recv() => {
                    match recv {
                        Ok(row) => {
                            if send_msg(&mut sender, &WsOutMsg::Telemetry(row)).await.is_err() {
                                break;
                            }
                        }
                        // On lag, keep going and pick up the newest snapshots.
                        Err(broadcast::error::RecvError::Lagged(_)) => {}
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }
    };

    // Task: client -> server (key transitions)
    let recv_task = async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                match serde_json::from_str::<KeyEvent>(&text) {
                    Ok(event) => {
                        if key_tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, raw = %text, "invalid key message");
                    }
                }
            }
        }
    };

    // Run both directions until one side ends
    tokio::join!(send_task, recv_task);
}

async fn send_msg(
    sender: &mut SplitSink<WebSocket, Message>,
    msg: &WsOutMsg,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(msg).unwrap_or_default();
    sender.send(Message::Text(Utf8Bytes::from(text))).await
}
