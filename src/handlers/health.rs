use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use tracing::warn;

use crate::{handlers::AppState, ApiResponse};

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub catalog: &'static str,
    pub version: &'static str,
}

/// Liveness plus a catalog read; a failing store reports `degraded` with 503.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let (code, status) = match state.catalog.snapshot().await {
        Ok(_) => (StatusCode::OK, "ok"),
        Err(e) => {
            warn!(error = %e, "Catalog unavailable during health check");
            (StatusCode::SERVICE_UNAVAILABLE, "degraded")
        }
    };

    let body = HealthResponse {
        status,
        catalog: state.catalog.backend_name(),
        version: env!("CARGO_PKG_VERSION"),
    };
    (code, Json(ApiResponse::success(body)))
}
