use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::adapters::PlatformApiError;
use crate::ingest::IngestError;
use crate::orchestrator::SyncError;
use crate::token_manager::TokenError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    PlatformApi(#[from] PlatformApiError),

    #[error("invalid admin token")]
    InvalidAdminToken,

    #[error("configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

fn token_status(error: &TokenError) -> (StatusCode, &'static str) {
    match error {
        TokenError::NotConfigured(_) => (StatusCode::INTERNAL_SERVER_ERROR, "configuration_missing"),
        TokenError::FetchFailed { .. } => (StatusCode::BAD_GATEWAY, "token_fetch_failed"),
    }
}

fn platform_status(error: &PlatformApiError) -> (StatusCode, &'static str) {
    match error {
        PlatformApiError::Token(e) => token_status(e),
        PlatformApiError::InvalidBinding { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "configuration_missing"),
        PlatformApiError::Timeout { .. } => (StatusCode::BAD_GATEWAY, "platform_timeout"),
        _ => (StatusCode::BAD_GATEWAY, "platform_api_error"),
    }
}

impl AppError {
    fn status(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Ingest(e) => match e {
                IngestError::SignatureMissing => (StatusCode::UNAUTHORIZED, "signature_missing"),
                IngestError::SignatureInvalid => (StatusCode::UNAUTHORIZED, "signature_invalid"),
                IngestError::ReplayTimestampExpired => (StatusCode::UNAUTHORIZED, "replay_timestamp_expired"),
                IngestError::DuplicateEvent(_) => (StatusCode::UNAUTHORIZED, "duplicate_event"),
                IngestError::MalformedPayload(_) => (StatusCode::BAD_REQUEST, "malformed_payload"),
                IngestError::ConfigurationMissing(_) => (StatusCode::INTERNAL_SERVER_ERROR, "configuration_missing"),
                IngestError::Platform(e) => platform_status(e),
                IngestError::Downstream(_) => (StatusCode::INTERNAL_SERVER_ERROR, "downstream_error"),
            },
            Self::Sync(e) => match e {
                SyncError::NoPlatformEnabled { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "no_platform_enabled"),
                SyncError::MenuNotFound { .. } => (StatusCode::NOT_FOUND, "menu_not_found"),
                SyncError::ConfigurationMissing(_) => (StatusCode::INTERNAL_SERVER_ERROR, "configuration_missing"),
                SyncError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            },
            Self::Token(e) => token_status(e),
            Self::PlatformApi(e) => platform_status(e),
            Self::InvalidAdminToken => (StatusCode::UNAUTHORIZED, "invalid_admin_token"),
            Self::ConfigurationMissing(_) => (StatusCode::INTERNAL_SERVER_ERROR, "configuration_missing"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Sync(SyncError::NoPlatformEnabled { brand_id, store_id })
            | Self::Sync(SyncError::MenuNotFound { brand_id, store_id }) => Some(serde_json::json!({
                "brand_id": brand_id,
                "store_id": store_id,
            })),
            Self::PlatformApi(e) | Self::Ingest(IngestError::Platform(e)) => {
                Some(serde_json::json!({ "retryable": e.is_retryable() }))
            }
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status();
        if status.is_server_error() {
            tracing::error!(code, error = %self, "request failed");
        }

        let body = ErrorResponse {
            error: ErrorBody {
                code,
                message: self.to_string(),
                details: self.details(),
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
