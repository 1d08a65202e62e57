//! HTTP status endpoint serving the most recent snapshot.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

use crate::monitor::{latest, SharedSnapshot, Snapshot};

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

pub fn create_router(shared: SharedSnapshot) -> Router {
    Router::new()
        .route("/", get(latest_handler))
        .route("/health", get(health_handler))
        .with_state(shared)
}

/// Latest combined reading, or 503 until the first sample lands.
pub async fn latest_handler(
    State(shared): State<SharedSnapshot>,
) -> Result<Json<Snapshot>, (StatusCode, Json<ApiError>)> {
    latest(&shared).map(Json).ok_or_else(|| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError {
                code: "NO_READING".to_string(),
                message: "no sensor reading has been taken yet".to_string(),
            }),
        )
    })
}

pub async fn health_handler() -> &'static str {
    "ok"
}
