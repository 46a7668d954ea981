// src/handlers/health.rs

use axum::response::IntoResponse;
use serde_json::json;

use crate::extract::Json;

/// Liveness probe. Never touches the database.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Process is alive"))
)]
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
