//! Worker event routes
//!
//! Deliver push, notification click, message and sync events to the worker,
//! and let pages register as window clients and collect broadcasts.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use lovevibes_core::{
    ClickOutcome, MessageOutcome, NotificationClick, NotificationDescriptor, SyncOutcome,
    WindowClient, WorkerBroadcast,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::AppState;

// ==================== Events ====================

/// POST /_worker/push
///
/// The body is the raw push payload, JSON or not.
async fn push(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<NotificationDescriptor>, ApiError> {
    metrics::counter!("lovevibes_push_events_total").increment(1);
    let notification = state.worker.handle_push(&body).await?;
    Ok(Json(notification))
}

/// POST /_worker/message
///
/// Bodies that are not JSON are ignored like any unrecognized message.
async fn message(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<MessageOutcome>, ApiError> {
    let payload = serde_json::from_slice::<Value>(&body).unwrap_or(Value::Null);
    let outcome = state.worker.handle_message(&payload).await?;

    let kind = match &outcome {
        MessageOutcome::SkipWaiting { .. } => "skip_waiting",
        MessageOutcome::Precached { .. } => "precache_resources",
        MessageOutcome::Ignored => "ignored",
    };
    metrics::counter!("lovevibes_message_events_total", "type" => kind).increment(1);

    Ok(Json(outcome))
}

/// POST /_worker/sync/{tag}
async fn sync(
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> Result<Json<SyncOutcome>, ApiError> {
    let result = state.worker.handle_sync(&tag).await;
    let status = if result.is_ok() { "ok" } else { "failed" };
    metrics::counter!("lovevibes_sync_events_total", "status" => status).increment(1);
    Ok(Json(result?))
}

/// POST /_worker/notifications/click
async fn notification_click(
    State(state): State<AppState>,
    Json(click): Json<NotificationClick>,
) -> Result<Json<ClickOutcome>, ApiError> {
    metrics::counter!("lovevibes_notification_clicks_total").increment(1);
    let outcome = state.worker.handle_notification_click(&click).await?;
    Ok(Json(outcome))
}

/// GET /_worker/notifications
async fn list_notifications(State(state): State<AppState>) -> Json<Vec<NotificationDescriptor>> {
    Json(state.notifications.list())
}

// ==================== Clients ====================

#[derive(Deserialize)]
pub struct RegisterClientRequest {
    pub url: String,
}

/// POST /_worker/clients
async fn register_client(
    State(state): State<AppState>,
    Json(request): Json<RegisterClientRequest>,
) -> Result<Response, ApiError> {
    let origin = &state.worker.config().origin;
    let url = origin
        .join(&request.url)
        .map_err(|e| ApiError::BadRequest(format!("invalid url {}: {}", request.url, e)))?;
    if url.origin() != origin.origin() {
        return Err(ApiError::BadRequest(format!(
            "client url {} is not on {}",
            url, origin
        )));
    }

    let client = state.clients.register(url.as_str());
    info!("Client {} connected at {}", client.id, client.url);
    Ok((StatusCode::CREATED, Json(client)).into_response())
}

/// GET /_worker/clients
async fn list_clients(State(state): State<AppState>) -> Json<Vec<WindowClient>> {
    Json(state.clients.all())
}

/// GET /_worker/clients/{id}/messages
async fn drain_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<WorkerBroadcast>>, ApiError> {
    state
        .clients
        .drain(&id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("client {}", id)))
}

/// DELETE /_worker/clients/{id}
async fn unregister_client(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.clients.unregister(&id) {
        debug!("Client {} disconnected", id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("client {}", id)))
    }
}

// ==================== Status ====================

#[derive(Serialize)]
pub struct WorkerStatusResponse {
    pub state: String,
    pub cache_name: String,
    /// Generation requests are served from
    pub active_generation: Option<String>,
    pub policy: String,
    pub origin: String,
    pub generations: Vec<String>,
    pub entry_count: i64,
    pub total_size: i64,
    pub total_size_human: String,
    pub hit_count: i64,
    pub miss_count: i64,
    pub hit_rate: f64,
    pub clients: usize,
}

/// GET /_worker/status
async fn status(State(state): State<AppState>) -> Result<Json<WorkerStatusResponse>, ApiError> {
    let worker = &state.worker;
    let stats = worker.cache().stats().await;
    let generations = worker.cache().keys().await?;

    let hit_rate = if stats.hit_count + stats.miss_count > 0 {
        stats.hit_count as f64 / (stats.hit_count + stats.miss_count) as f64
    } else {
        0.0
    };

    Ok(Json(WorkerStatusResponse {
        state: worker.state().to_string(),
        cache_name: worker.cache_name().to_string(),
        active_generation: worker.active_generation(),
        policy: worker.config().policy.to_string(),
        origin: worker.config().origin.to_string(),
        generations,
        entry_count: stats.entry_count,
        total_size: stats.total_size,
        total_size_human: human_size(stats.total_size),
        hit_count: stats.hit_count,
        miss_count: stats.miss_count,
        hit_rate,
        clients: state.clients.len(),
    }))
}

/// Size in binary units, one decimal above a kilobyte
fn human_size(bytes: i64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut size = bytes as f64 / 1024.0;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}

/// Create worker routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/_worker/push", post(push))
        .route("/_worker/message", post(message))
        .route("/_worker/sync/{tag}", post(sync))
        .route("/_worker/notifications", get(list_notifications))
        .route("/_worker/notifications/click", post(notification_click))
        .route("/_worker/clients", get(list_clients).post(register_client))
        .route("/_worker/clients/{id}", axum::routing::delete(unregister_client))
        .route("/_worker/clients/{id}/messages", get(drain_messages))
        .route("/_worker/status", get(status))
}
