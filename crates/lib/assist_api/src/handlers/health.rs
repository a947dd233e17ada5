//! Liveness endpoint.

use axum::Json;

use crate::models::HealthResponse;

/// `GET /health` and `GET /api/health`.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
