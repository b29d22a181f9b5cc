//! API error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lovevibes_core::CoreError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("No response available for {0}")]
    NoResponse(String),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg.clone()),
            ApiError::NoResponse(msg) => (
                StatusCode::GATEWAY_TIMEOUT,
                "NO_RESPONSE",
                format!("offline and nothing cached for {}", msg),
            ),
            ApiError::Core(e) => match e {
                CoreError::InvalidUrl(msg) | CoreError::InvalidConfig(msg) => {
                    (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone())
                }
                CoreError::InvalidState(msg) => {
                    (StatusCode::CONFLICT, "INVALID_STATE", msg.clone())
                }
                CoreError::AssetFetch { .. } | CoreError::Fetch(_) => {
                    (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", e.to_string())
                }
                CoreError::Sync(msg) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "SYNC_FAILED", msg.clone())
                }
                CoreError::Host(msg) => (StatusCode::NOT_FOUND, "CLIENT_ERROR", msg.clone()),
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    e.to_string(),
                ),
            },
        };

        let body = axum::Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
