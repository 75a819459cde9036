use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::warn;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn ready(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>, StatusCode> {
    state.bindings.ping().await.map_err(|e| {
        warn!(error = %e, "binding store not reachable");
        StatusCode::SERVICE_UNAVAILABLE
    })?;

    Ok(Json(HealthResponse { status: "ready" }))
}
