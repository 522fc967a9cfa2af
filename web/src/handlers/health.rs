//! Liveness, readiness and metrics endpoints.

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use drivebook_runtime::{HealthCheck, HealthStatus};
use serde::Serialize;

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"`
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
}

/// `GET /health`: the process is up. Checks nothing else.
#[allow(clippy::unused_async)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /ready`: store health plus journal failure count.
///
/// `Degraded` still answers 200 so a busy instance keeps receiving traffic;
/// `Unhealthy` (shutting down) answers 503.
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<HealthCheck>) {
    let (journal_failures, revision) = state
        .store
        .state(|booking| (booking.journal_failures, booking.revision))
        .await;

    let mut health = state
        .store
        .health()
        .with_metadata("revision", revision.to_string())
        .with_metadata("journal_failures", journal_failures.to_string());
    if journal_failures > 0 && health.status == HealthStatus::Healthy {
        health.status = HealthStatus::Degraded;
        health.message = Some(format!("{journal_failures} event batches were not journalled"));
    }

    let status = match health.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(health))
}

/// `GET /metrics`: Prometheus text format.
#[allow(clippy::unused_async)]
pub async fn metrics(State(state): State<AppState>) -> (StatusCode, String) {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::NOT_FOUND,
            "metrics recorder not installed".to_string(),
        ),
    }
}
