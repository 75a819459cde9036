use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::domain::Platform;
use crate::error::{AppError, Result};
use crate::verification::signature::sign;
use crate::AppState;

#[derive(Serialize)]
pub struct SignatureResponse {
    pub signature: String,
}

/// Signs the raw body with the platform's primary secret. Only routed
/// outside production.
pub async fn sign_webhook(
    State(state): State<Arc<AppState>>,
    Path(segment): Path<String>,
    body: Bytes,
) -> Result<Json<SignatureResponse>> {
    let platform: Platform = segment.parse().map_err(|e| AppError::NotFound(format!("{e}")))?;
    let secret = state
        .config
        .platform(platform)
        .webhook_secrets()
        .primary
        .ok_or_else(|| AppError::ConfigurationMissing(format!("{platform} webhook secret")))?;

    Ok(Json(SignatureResponse {
        signature: sign(&body, &secret),
    }))
}
