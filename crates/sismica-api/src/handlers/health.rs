use axum::{http::StatusCode, response::IntoResponse};

use sismica_core::defaults;

/// Liveness check. Touches no backend.
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, defaults::HEALTH_BODY)
}
