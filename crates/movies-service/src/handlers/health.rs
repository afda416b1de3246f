//! Health check handlers.
//!
//! - `/health`: liveness, returns OK while the process is serving
//! - `/ready`: readiness, pings the database

use crate::errors::ApiError;
use crate::models::ReadinessResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

/// Liveness check handler. Checks no dependencies.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness check handler.
///
/// Returns 503 when the database cannot answer within the store deadline.
/// The response never carries the underlying error; that is logged.
#[tracing::instrument(skip_all, name = "movies.health.readiness")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store = &state.store;
    let ping = store
        .run("health.ping", async {
            sqlx::query("SELECT 1")
                .fetch_one(store.pool())
                .await
                .map_err(ApiError::from)
        })
        .await;

    match ping {
        Ok(_) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready",
                database: "healthy",
                error: None,
            }),
        ),
        Err(e) => {
            tracing::warn!(target: "movies.health", error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    status: "not_ready",
                    database: "unhealthy",
                    error: Some("Service dependencies unavailable".to_string()),
                }),
            )
        }
    }
}
