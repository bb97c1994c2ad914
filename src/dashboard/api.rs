//! Dashboard HTTP API
//!
//! REST endpoints over the tracker plus a WebSocket outcome stream.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::{Any, CorsLayer};

use super::types::*;
use super::DashboardContext;
use crate::error::TrackerError;
use crate::types::{SignalEntry, TrackedSignal};

/// Create the API router with all endpoints
pub fn create_router(ctx: Arc<DashboardContext>) -> Router {
    Router::new()
        .route("/api/health", get(get_health))
        .route("/api/stats", get(get_stats))
        .route("/api/signals", axum::routing::post(post_signal))
        .route("/api/signals/active", get(get_active))
        .route("/api/signals/completed", get(get_completed))
        .route("/api/signals/:id", get(get_signal))
        .route("/ws", get(websocket_handler))
        .with_state(ctx)
        // CORS for frontend
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

// ─────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────

/// GET /api/health
async fn get_health(State(ctx): State<Arc<DashboardContext>>) -> impl IntoResponse {
    Json(ApiResponse::success(ctx.health()))
}

/// GET /api/stats - Lifetime and recent statistics
async fn get_stats(State(ctx): State<Arc<DashboardContext>>) -> impl IntoResponse {
    Json(ApiResponse::success(ctx.tracker.stats_report()))
}

/// GET /api/signals/active
async fn get_active(State(ctx): State<Arc<DashboardContext>>) -> impl IntoResponse {
    Json(ApiResponse::success(ctx.tracker.get_active_signals()))
}

/// GET /api/signals/completed?limit=20 - Newest first
async fn get_completed(
    Query(query): Query<CompletedQuery>,
    State(ctx): State<Arc<DashboardContext>>,
) -> impl IntoResponse {
    Json(ApiResponse::success(
        ctx.tracker.get_completed_signals(query.limit),
    ))
}

/// GET /api/signals/:id
async fn get_signal(
    Path(id): Path<String>,
    State(ctx): State<Arc<DashboardContext>>,
) -> (StatusCode, Json<ApiResponse<TrackedSignal>>) {
    match ctx.tracker.get_status(&id) {
        Some(signal) => (StatusCode::OK, Json(ApiResponse::success(signal))),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("Unknown signal: {}", id))),
        ),
    }
}

/// POST /api/signals - Start tracking. A missing id is generated.
async fn post_signal(
    State(ctx): State<Arc<DashboardContext>>,
    Json(mut entry): Json<SignalEntry>,
) -> (StatusCode, Json<ApiResponse<TrackedSignal>>) {
    if entry.id.trim().is_empty() {
        entry.id = uuid::Uuid::new_v4().to_string();
    }

    match ctx.tracker.record_entry(entry, None) {
        Ok(signal) => (StatusCode::CREATED, Json(ApiResponse::success(signal))),
        Err(e) => {
            let status = match e {
                TrackerError::AlreadyTracked(_) => StatusCode::CONFLICT,
                TrackerError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                TrackerError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, Json(ApiResponse::error(e.to_string())))
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// WebSocket Handler
// ─────────────────────────────────────────────────────────────────

async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(ctx): State<Arc<DashboardContext>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_websocket(socket, ctx))
}

fn encode(msg: &WsMessage) -> Option<Message> {
    serde_json::to_string(msg).ok().map(Message::Text)
}

/// Snapshot on connect, then one message per resolved signal
async fn handle_websocket(socket: WebSocket, ctx: Arc<DashboardContext>) {
    use futures_util::{SinkExt, StreamExt};

    tracing::info!("🖥️ New WebSocket connection");

    let (mut sender, mut receiver) = socket.split();
    // Subscribe before the snapshot so nothing resolves in between unseen
    let mut outcomes = ctx.tracker.subscribe();

    let snapshot = WsMessage::Snapshot(SnapshotPayload {
        active: ctx.tracker.get_active_signals(),
        stats: ctx.tracker.stats_report(),
    });
    if let Some(msg) = encode(&snapshot) {
        if sender.send(msg).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            outcome = outcomes.recv() => {
                let msg = match outcome {
                    Ok(outcome) => WsMessage::Outcome(outcome),
                    Err(RecvError::Lagged(missed)) => WsMessage::Lagged(LaggedPayload { missed }),
                    Err(RecvError::Closed) => break,
                };
                if let Some(msg) = encode(&msg) {
                    if sender.send(msg).await.is_err() {
                        break;
                    }
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received WebSocket message: {}", text);
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
        }
    }

    tracing::info!("🖥️ WebSocket connection closed");
}
