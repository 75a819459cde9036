use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Platform, PlatformStoreBinding};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResult {
    pub platform: Platform,
    pub binding_id: Uuid,
    pub external_store_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether a caller-level retry could succeed (5xx, transport, timeout).
    pub retryable: bool,
    pub synced_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ItemAvailabilityRequest {
    pub suspended: bool,
}

impl SyncResult {
    pub fn succeeded(binding: &PlatformStoreBinding, synced_at: DateTime<Utc>) -> Self {
        Self {
            platform: binding.platform,
            binding_id: binding.id,
            external_store_id: binding.external_store_id.clone(),
            success: true,
            error: None,
            retryable: false,
            synced_at,
        }
    }

    pub fn failed(binding: &PlatformStoreBinding, error: impl Into<String>, retryable: bool) -> Self {
        Self {
            platform: binding.platform,
            binding_id: binding.id,
            external_store_id: binding.external_store_id.clone(),
            success: false,
            error: Some(error.into()),
            retryable,
            synced_at: Utc::now(),
        }
    }
}
