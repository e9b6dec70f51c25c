//! Health Routes
//!
//! Health check endpoints for monitoring and Kubernetes checks.
//!
//! - GET /health/live - Liveness check (process is alive)
//! - GET /health/ready - Readiness check (store answers a ping)
//! - GET /health - Full health status

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::HealthResponse;
use crate::api::state::AppState;

/// GET /health/live
///
/// Kubernetes liveness check.
/// Returns 200 if the process is alive, no dependency checks.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// Kubernetes readiness check.
/// Returns 200 if the metric store answers a ping with a success status.
pub async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    match check_store_health(&state).await {
        true => StatusCode::OK,
        false => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// GET /health
///
/// Full health status with component details.
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let store_ok = check_store_health(&state).await;

    Json(HealthResponse {
        status: if store_ok { "healthy" } else { "unhealthy" }.to_string(),
        store: if store_ok { "ok" } else { "error" }.to_string(),
        mode: state.mode().to_string(),
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn check_store_health(state: &AppState) -> bool {
    match state.store.ping().await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!("Store health check failed: {}", e);
            false
        }
    }
}
