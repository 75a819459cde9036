//! Per-platform translation between the internal menu/order model and the
//! delivery platforms' REST and webhook schemas.

pub mod foodpanda;
pub mod ubereats;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::{
    EventEnvelope, InboundWebhookEvent, IngestOutcome, MenuSnapshot, Platform, PlatformStoreBinding,
    WebhookRoute,
};
use crate::ingest::IngestError;
use crate::token_manager::{TokenError, TokenManager};

pub use foodpanda::FoodpandaAdapter;
pub use ubereats::UberEatsAdapter;

#[derive(Debug, thiserror::Error)]
pub enum PlatformApiError {
    #[error("{platform} api returned {status}: {body}")]
    Status {
        platform: Platform,
        status: u16,
        body: String,
    },

    #[error("{platform} request failed: {message}")]
    Transport { platform: Platform, message: String },

    #[error("{platform} request timed out after {seconds}s")]
    Timeout { platform: Platform, seconds: u64 },

    #[error("{platform} response could not be decoded: {message}")]
    Decode { platform: Platform, message: String },

    #[error("binding {binding_id} has no {platform} settings")]
    InvalidBinding { platform: Platform, binding_id: Uuid },

    #[error(transparent)]
    Token(#[from] TokenError),
}

impl PlatformApiError {
    /// 5xx, transport failures and timeouts may succeed on a later attempt;
    /// 4xx responses will not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status >= 500,
            Self::Transport { .. } | Self::Timeout { .. } => true,
            Self::Token(TokenError::FetchFailed { .. }) => true,
            Self::Token(TokenError::NotConfigured(_)) => false,
            Self::Decode { .. } | Self::InvalidBinding { .. } => false,
        }
    }
}

#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Internal menu to the platform's full-menu payload.
    fn convert_menu(
        &self,
        menu: &MenuSnapshot,
        binding: &PlatformStoreBinding,
    ) -> Result<Value, PlatformApiError>;

    /// Replaces the platform's whole menu for the bound store.
    async fn push_menu(&self, binding: &PlatformStoreBinding, payload: &Value) -> Result<(), PlatformApiError>;

    /// Suspends an item until the far future, or clears the suspension.
    async fn set_item_availability(
        &self,
        binding: &PlatformStoreBinding,
        item_id: &str,
        suspended: bool,
    ) -> Result<(), PlatformApiError>;

    /// Event id, type and timestamp of a decoded webhook body.
    fn envelope(&self, route: WebhookRoute, payload: &Value) -> Result<EventEnvelope, IngestError>;

    /// Maps a verified webhook into the internal order shape. Unsupported
    /// event types come back as `IngestOutcome::Acknowledged`.
    async fn ingest_order(&self, event: &InboundWebhookEvent, payload: Value) -> Result<IngestOutcome, IngestError>;
}

#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<Platform, Arc<dyn PlatformAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, adapter: Arc<dyn PlatformAdapter>) -> Self {
        self.adapters.insert(adapter.platform(), adapter);
        self
    }

    pub fn get(&self, platform: Platform) -> Option<Arc<dyn PlatformAdapter>> {
        self.adapters.get(&platform).cloned()
    }
}

/// Authenticated JSON calls against one platform's REST API.
#[derive(Clone)]
pub struct ApiClient {
    platform: Platform,
    http: Client,
    tokens: TokenManager,
    base_url: String,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(platform: Platform, http: Client, tokens: TokenManager, base_url: &str, timeout: Duration) -> Self {
        Self {
            platform,
            http,
            tokens,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub async fn call(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value, PlatformApiError> {
        let platform = self.platform;
        let token = self.tokens.get_token(platform).await?;

        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .http
            .request(method, &url)
            .bearer_auth(token)
            .timeout(self.timeout);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                PlatformApiError::Timeout {
                    platform,
                    seconds: self.timeout.as_secs(),
                }
            } else {
                PlatformApiError::Transport {
                    platform,
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.tokens.invalidate(platform);
        }

        let text = response.text().await.map_err(|e| PlatformApiError::Transport {
            platform,
            message: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(PlatformApiError::Status {
                platform,
                status: status.as_u16(),
                body: text.chars().take(512).collect(),
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| PlatformApiError::Decode {
            platform,
            message: e.to_string(),
        })
    }
}

/// Accepts `"2"`, `2` or `2.0`.
pub(crate) fn lenient_quantity<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let quantity = match &value {
        Value::Number(n) => n.as_f64().unwrap_or(1.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(1.0),
        _ => 1.0,
    };
    Ok(quantity.max(0.0).round() as u32)
}

/// Accepts decimal strings or JSON numbers; anything else is `None`.
pub(crate) fn lenient_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => s.trim().parse().ok(),
        Some(Value::Number(n)) => n.to_string().parse().ok(),
        _ => None,
    })
}

pub(crate) fn string_field<'a>(payload: &'a Value, pointer: &str) -> Option<&'a str> {
    payload
        .pointer(pointer)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Line {
        #[serde(deserialize_with = "lenient_quantity")]
        quantity: u32,
        #[serde(default, deserialize_with = "lenient_decimal")]
        price: Option<Decimal>,
    }

    #[test]
    fn lenient_fields_accept_strings_and_numbers() {
        let line: Line = serde_json::from_str(r#"{"quantity":"3","price":"12.50"}"#).unwrap();
        assert_eq!(line.quantity, 3);
        assert_eq!(line.price, Some("12.50".parse().unwrap()));

        let line: Line = serde_json::from_str(r#"{"quantity":2,"price":7}"#).unwrap();
        assert_eq!(line.quantity, 2);
        assert_eq!(line.price, Some(Decimal::from(7)));

        let line: Line = serde_json::from_str(r#"{"quantity":1}"#).unwrap();
        assert_eq!(line.price, None);
    }

    #[test]
    fn retryability_follows_status_class() {
        let server_error = PlatformApiError::Status {
            platform: Platform::UberEats,
            status: 503,
            body: String::new(),
        };
        let client_error = PlatformApiError::Status {
            platform: Platform::UberEats,
            status: 422,
            body: String::new(),
        };
        assert!(server_error.is_retryable());
        assert!(!client_error.is_retryable());
        assert!(!PlatformApiError::Token(TokenError::NotConfigured(Platform::Foodpanda)).is_retryable());
    }
}
