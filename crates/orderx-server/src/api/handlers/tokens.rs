use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use tracing::info;

use crate::domain::{Platform, TokenStatus};
use crate::error::{AppError, Result};
use crate::AppState;

fn platform(segment: &str) -> Result<Platform> {
    segment.parse().map_err(|e| AppError::NotFound(format!("{e}")))
}

pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(segment): Path<String>,
) -> Result<Json<TokenStatus>> {
    let platform = platform(&segment)?;
    Ok(Json(state.tokens.status(platform)))
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Path(segment): Path<String>,
) -> Result<Json<TokenStatus>> {
    let platform = platform(&segment)?;
    state.tokens.force_refresh(platform).await?;
    info!(platform = %platform, "platform token refreshed on request");
    Ok(Json(state.tokens.status(platform)))
}
