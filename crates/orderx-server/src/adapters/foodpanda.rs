use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use super::{lenient_decimal, lenient_quantity, string_field, ApiClient, PlatformAdapter, PlatformApiError};
use crate::domain::{
    far_future, is_dish_suspended, is_option_suspended, CatalogImportState, CatalogImportStatus,
    EventEnvelope, InboundWebhookEvent, IngestOutcome, LocalizedText, MenuSnapshot, NormalizedOrder,
    OrderEventKind, OrderLine, OrderModifier, Platform, PlatformStoreBinding, WebhookRoute,
};
use crate::ingest::IngestError;

const CANCELLED_STATUS: &str = "ORDER_CANCELLED";

fn title(text: &LocalizedText) -> Value {
    json!({ "default": text.primary(), "en_US": text.en, "zh_TW": text.zh })
}

fn reference(id: &str, kind: &str) -> (String, Value) {
    (id.to_string(), json!({ "id": id, "type": kind }))
}

/// Catalog document with every menu entity keyed by id, the shape of the
/// catalog import API. Options become standalone products referenced from
/// their topping group.
pub fn build_catalog(menu: &MenuSnapshot) -> Value {
    let mut items = Map::new();

    let category_refs: Map<String, Value> = menu
        .categories
        .iter()
        .map(|c| reference(&c.id, "Category"))
        .collect();
    items.insert(
        menu.menu_id.clone(),
        json!({
            "id": menu.menu_id,
            "type": "Menu",
            "menuType": "DELIVERY",
            "title": title(&menu.title),
            "categories": category_refs,
        }),
    );

    for category in &menu.categories {
        let products: Map<String, Value> = category
            .dish_ids
            .iter()
            .map(|id| reference(id, "Product"))
            .collect();
        items.insert(
            category.id.clone(),
            json!({
                "id": category.id,
                "type": "Category",
                "title": title(&category.name),
                "products": products,
            }),
        );
    }

    for dish in &menu.dishes {
        let mut seen = HashSet::new();
        let toppings: Map<String, Value> = dish
            .option_category_ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .map(|id| reference(id, "Topping"))
            .collect();
        items.insert(
            dish.id.clone(),
            json!({
                "id": dish.id,
                "type": "Product",
                "title": title(&dish.name),
                "description": title(&dish.description),
                "price": dish.price.to_string(),
                "active": !is_dish_suspended(dish),
                "toppings": toppings,
            }),
        );
    }

    for group in menu.referenced_option_categories() {
        let products: Map<String, Value> = group
            .options
            .iter()
            .map(|o| reference(&o.id, "Product"))
            .collect();
        items.insert(
            group.id.clone(),
            json!({
                "id": group.id,
                "type": "Topping",
                "title": title(&group.name),
                "quantity": { "minimum": group.min_select, "maximum": group.max_select },
                "products": products,
            }),
        );

        for option in &group.options {
            items.insert(
                option.id.clone(),
                json!({
                    "id": option.id,
                    "type": "Product",
                    "title": title(&option.name),
                    "price": option.price.to_string(),
                    "active": !is_option_suspended(option, menu),
                    "isTopping": true,
                }),
            );
        }
    }

    json!({ "items": items })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DispatchedOrder {
    token: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    platform_restaurant: Option<RestaurantRef>,
    #[serde(default)]
    comments: Option<Comments>,
    #[serde(default)]
    items: Vec<DispatchedItem>,
    #[serde(default)]
    price: Option<OrderPrice>,
    #[serde(default)]
    local_info: Option<LocalInfo>,
}

#[derive(Debug, Deserialize)]
struct RestaurantRef {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Comments {
    #[serde(default)]
    customer_comment: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DispatchedItem {
    #[serde(default)]
    remote_code: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default = "one", deserialize_with = "lenient_quantity")]
    quantity: u32,
    #[serde(default, deserialize_with = "lenient_decimal")]
    unit_price: Option<Decimal>,
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    selected_toppings: Vec<SelectedTopping>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectedTopping {
    #[serde(default)]
    remote_code: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default = "one", deserialize_with = "lenient_quantity")]
    quantity: u32,
    #[serde(default, deserialize_with = "lenient_decimal")]
    price: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderPrice {
    #[serde(default, deserialize_with = "lenient_decimal")]
    grand_total: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocalInfo {
    #[serde(default)]
    currency_code: Option<String>,
}

fn one() -> u32 {
    1
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn normalize_dispatch(order: DispatchedOrder, raw: Value) -> NormalizedOrder {
    let items = order
        .items
        .into_iter()
        .map(|item| OrderLine {
            external_item_id: item.remote_code.unwrap_or_default(),
            name: item.name,
            quantity: item.quantity,
            unit_price: item.unit_price.unwrap_or_default(),
            note: item.comment.filter(|c| !c.is_empty()),
            modifiers: item
                .selected_toppings
                .into_iter()
                .map(|t| OrderModifier {
                    external_item_id: t.remote_code.unwrap_or_default(),
                    name: t.name,
                    quantity: t.quantity,
                    unit_price: t.price.unwrap_or_default(),
                })
                .collect(),
        })
        .collect();

    NormalizedOrder {
        platform: Platform::Foodpanda,
        kind: OrderEventKind::Placed,
        external_order_id: order.token,
        display_id: order.code,
        external_store_id: order.platform_restaurant.map(|r| r.id),
        brand_id: None,
        store_id: None,
        auto_accept: false,
        items,
        total: order.price.and_then(|p| p.grand_total),
        currency: order.local_info.and_then(|l| l.currency_code),
        customer_note: order
            .comments
            .and_then(|c| c.customer_comment)
            .filter(|c| !c.is_empty()),
        placed_at: order.created_at.as_deref().and_then(parse_timestamp),
        raw,
    }
}

fn order_token(payload: &Value) -> Option<&str> {
    string_field(payload, "/orderToken").or_else(|| string_field(payload, "/order_token"))
}

fn catalog_import_id(payload: &Value) -> Option<&str> {
    string_field(payload, "/catalogImportId").or_else(|| string_field(payload, "/job_id"))
}

pub struct FoodpandaAdapter {
    api: ApiClient,
    callback_url: String,
}

impl FoodpandaAdapter {
    pub fn new(api: ApiClient, callback_url: impl Into<String>) -> Self {
        Self {
            api,
            callback_url: callback_url.into(),
        }
    }

    fn chain_code<'a>(&self, binding: &'a PlatformStoreBinding) -> Result<&'a str, PlatformApiError> {
        binding
            .foodpanda_chain_code()
            .ok_or(PlatformApiError::InvalidBinding {
                platform: Platform::Foodpanda,
                binding_id: binding.id,
            })
    }
}

#[async_trait]
impl PlatformAdapter for FoodpandaAdapter {
    fn platform(&self) -> Platform {
        Platform::Foodpanda
    }

    fn convert_menu(
        &self,
        menu: &MenuSnapshot,
        binding: &PlatformStoreBinding,
    ) -> Result<Value, PlatformApiError> {
        Ok(json!({
            "callbackUrl": self.callback_url,
            "vendors": [binding.external_store_id],
            "catalog": build_catalog(menu),
        }))
    }

    async fn push_menu(&self, binding: &PlatformStoreBinding, payload: &Value) -> Result<(), PlatformApiError> {
        let chain_code = self.chain_code(binding)?;
        let response = self
            .api
            .call(Method::PUT, &format!("/v2/chains/{chain_code}/catalog"), Some(payload))
            .await?;
        if let Some(import_id) = catalog_import_id(&response) {
            info!(
                chain_code,
                vendor = %binding.external_store_id,
                import_id,
                "foodpanda catalog import queued"
            );
        }
        Ok(())
    }

    async fn set_item_availability(
        &self,
        binding: &PlatformStoreBinding,
        item_id: &str,
        suspended: bool,
    ) -> Result<(), PlatformApiError> {
        let chain_code = self.chain_code(binding)?;
        let path = format!(
            "/v2/chains/{}/vendors/{}/items/{}/availability",
            chain_code, binding.external_store_id, item_id
        );
        let suspended_until = suspended.then(|| far_future().to_rfc3339());
        let body = json!({ "suspension": { "suspended_until": suspended_until } });
        self.api.call(Method::PUT, &path, Some(&body)).await?;
        Ok(())
    }

    fn envelope(&self, route: WebhookRoute, payload: &Value) -> Result<EventEnvelope, IngestError> {
        if route == WebhookRoute::FoodpandaCatalogCallback {
            let status = string_field(payload, "/status")
                .ok_or_else(|| IngestError::MalformedPayload("missing status".into()))?;
            return Ok(EventEnvelope {
                event_id: catalog_import_id(payload).map(|id| format!("catalog:{id}:{status}")),
                event_type: "catalog.import".to_string(),
                timestamp: None,
            });
        }

        if let (Some(token), Some(status)) = (order_token(payload), string_field(payload, "/status")) {
            return Ok(EventEnvelope {
                event_id: Some(format!("{token}:{status}")),
                event_type: format!("order.status.{}", status.to_ascii_lowercase()),
                timestamp: string_field(payload, "/timestamp")
                    .and_then(parse_timestamp)
                    .map(|t| t.timestamp()),
            });
        }

        let token = string_field(payload, "/token")
            .ok_or_else(|| IngestError::MalformedPayload("missing order token".into()))?;
        Ok(EventEnvelope {
            event_id: Some(token.to_string()),
            event_type: "order.dispatch".to_string(),
            timestamp: string_field(payload, "/createdAt")
                .and_then(parse_timestamp)
                .map(|t| t.timestamp()),
        })
    }

    async fn ingest_order(&self, event: &InboundWebhookEvent, payload: Value) -> Result<IngestOutcome, IngestError> {
        if event.route == WebhookRoute::FoodpandaCatalogCallback {
            let state = match string_field(&payload, "/status") {
                Some("COMPLETED") => CatalogImportState::Completed,
                Some("FAILED") => CatalogImportState::Failed,
                _ => CatalogImportState::Other,
            };
            let status = CatalogImportStatus {
                import_id: catalog_import_id(&payload).map(str::to_string),
                state,
                message: string_field(&payload, "/message").map(str::to_string),
            };
            if state == CatalogImportState::Failed {
                warn!(import_id = ?status.import_id, message = ?status.message, "foodpanda catalog import failed");
            } else {
                info!(import_id = ?status.import_id, state = ?state, "foodpanda catalog import callback");
            }
            return Ok(IngestOutcome::CatalogImport(status));
        }

        match event.event_type.as_str() {
            "order.dispatch" => {
                let order: DispatchedOrder = serde_json::from_value(payload.clone())
                    .map_err(|e| IngestError::MalformedPayload(e.to_string()))?;
                Ok(IngestOutcome::Order(normalize_dispatch(order, payload)))
            }
            _ if string_field(&payload, "/status") == Some(CANCELLED_STATUS) => {
                let token = order_token(&payload)
                    .ok_or_else(|| IngestError::MalformedPayload("missing order token".into()))?
                    .to_string();
                Ok(IngestOutcome::Order(NormalizedOrder::cancellation(
                    Platform::Foodpanda,
                    token,
                    payload,
                )))
            }
            other => {
                debug!(event_type = other, "foodpanda event type not handled");
                Ok(IngestOutcome::Acknowledged {
                    event_type: other.to_string(),
                })
            }
        }
    }
}
