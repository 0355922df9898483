//! Liveness endpoint.

use axum::Json;

use crate::models::HealthResponse;

/// `GET /health`: reports that the relay is up.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: leadchat_core::version().to_string(),
    })
}
