use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request};
use axum::middleware::Next;
use axum::response::Response;
use subtle::ConstantTimeEq;

use crate::error::AppError;
use crate::AppState;

/// Admin routes take `Authorization: Bearer <ADMIN_API_TOKEN>`. Without a
/// configured token every admin request is refused.
pub async fn middleware(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let expected = state
        .config
        .admin_api_token
        .as_deref()
        .ok_or_else(|| AppError::ConfigurationMissing("ADMIN_API_TOKEN".into()))?;

    let provided = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(AppError::InvalidAdminToken)?;

    if !bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
        return Err(AppError::InvalidAdminToken);
    }

    Ok(next.run(req).await)
}
