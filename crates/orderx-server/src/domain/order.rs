use axum::body::Bytes;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Platform;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookRoute {
    UberEats,
    Foodpanda,
    FoodpandaCatalogCallback,
}

impl WebhookRoute {
    pub fn platform(&self) -> Platform {
        match self {
            Self::UberEats => Platform::UberEats,
            Self::Foodpanda | Self::FoodpandaCatalogCallback => Platform::Foodpanda,
        }
    }

    pub fn signature_header(&self) -> &'static str {
        match self {
            Self::UberEats => "x-uber-signature",
            Self::Foodpanda | Self::FoodpandaCatalogCallback => "x-foodpanda-signature",
        }
    }
}

/// Identity of a webhook delivery, extracted from its decoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventEnvelope {
    pub event_id: Option<String>,
    pub event_type: String,
    /// Seconds or milliseconds since the epoch, as sent by the platform.
    pub timestamp: Option<i64>,
}

/// A webhook delivery for the duration of its processing. Never persisted.
#[derive(Debug, Clone)]
pub struct InboundWebhookEvent {
    pub route: WebhookRoute,
    pub event_id: Option<String>,
    pub event_type: String,
    pub timestamp: Option<i64>,
    pub raw_body: Bytes,
    pub signature: Option<String>,
}

impl InboundWebhookEvent {
    pub fn new(
        route: WebhookRoute,
        envelope: EventEnvelope,
        raw_body: Bytes,
        signature: Option<String>,
    ) -> Self {
        Self {
            route,
            event_id: envelope.event_id,
            event_type: envelope.event_type,
            timestamp: envelope.timestamp,
            raw_body,
            signature,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderEventKind {
    Placed,
    Cancelled,
}

impl OrderEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Placed => "placed",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedOrder {
    pub platform: Platform,
    pub kind: OrderEventKind,
    pub external_order_id: String,
    pub display_id: Option<String>,
    pub external_store_id: Option<String>,
    pub brand_id: Option<Uuid>,
    pub store_id: Option<Uuid>,
    pub auto_accept: bool,
    pub items: Vec<OrderLine>,
    #[serde(with = "rust_decimal::serde::str_option")]
    pub total: Option<Decimal>,
    pub currency: Option<String>,
    pub customer_note: Option<String>,
    pub placed_at: Option<DateTime<Utc>>,
    pub raw: serde_json::Value,
}

impl NormalizedOrder {
    pub fn cancellation(platform: Platform, external_order_id: String, raw: serde_json::Value) -> Self {
        Self {
            platform,
            kind: OrderEventKind::Cancelled,
            external_order_id,
            display_id: None,
            external_store_id: None,
            brand_id: None,
            store_id: None,
            auto_accept: false,
            items: Vec::new(),
            total: None,
            currency: None,
            customer_note: None,
            placed_at: None,
            raw,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub external_item_id: String,
    pub name: String,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::str")]
    pub unit_price: Decimal,
    pub note: Option<String>,
    pub modifiers: Vec<OrderModifier>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderModifier {
    pub external_item_id: String,
    pub name: String,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::str")]
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogImportState {
    Completed,
    Failed,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogImportStatus {
    pub import_id: Option<String>,
    pub state: CatalogImportState,
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
pub enum IngestOutcome {
    Order(NormalizedOrder),
    CatalogImport(CatalogImportStatus),
    /// Event type this service does not act on.
    Acknowledged { event_type: String },
}
