//! HTTP handlers for order-payment-service.

pub mod payments;

use crate::services::get_metrics;
use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// Liveness probe.
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "order-payment-service",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// Readiness probe; pings the database when one is attached.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let Some(db) = state.db.as_ref() else {
        return (StatusCode::OK, Json(json!({ "status": "ready" })));
    };

    match db.health_check().await {
        Ok(_) => {
            tracing::debug!("Readiness check passed");
            (StatusCode::OK, Json(json!({ "status": "ready" })))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable", "error": e.to_string() })),
            )
        }
    }
}

pub async fn metrics() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}
