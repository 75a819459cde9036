use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{string_field, ApiClient, PlatformAdapter, PlatformApiError};
use crate::domain::{
    is_dish_suspended, is_option_suspended, to_minor_units, EventEnvelope, InboundWebhookEvent,
    IngestOutcome, LocalizedText, MenuSnapshot, NormalizedOrder, OrderEventKind, OrderLine,
    OrderModifier, Platform, PlatformStoreBinding, WebhookRoute, FAR_FUTURE_EPOCH_MS,
};
use crate::ingest::IngestError;

const DAYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiLanguageText {
    pub translations: Translations,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Translations {
    pub en_us: String,
    pub zh_tw: String,
}

impl From<&LocalizedText> for MultiLanguageText {
    fn from(text: &LocalizedText) -> Self {
        Self {
            translations: Translations {
                en_us: text.en.clone(),
                zh_tw: text.zh.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuPayload {
    pub menus: Vec<Menu>,
    pub categories: Vec<Category>,
    pub items: Vec<Item>,
    pub modifier_groups: Vec<ModifierGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Menu {
    pub id: String,
    pub title: MultiLanguageText,
    pub service_availability: Vec<ServiceAvailability>,
    pub category_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAvailability {
    pub day_of_week: String,
    pub time_periods: Vec<TimePeriod>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimePeriod {
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub title: MultiLanguageText,
    pub entities: Vec<EntityRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl EntityRef {
    fn item(id: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: "ITEM".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub title: MultiLanguageText,
    pub description: MultiLanguageText,
    pub price_info: PriceInfo,
    pub modifier_group_ids: ModifierGroupIds,
    pub suspension_info: SuspensionInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceInfo {
    pub price: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifierGroupIds {
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspensionInfo {
    pub suspension: Suspension,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suspension {
    /// Epoch milliseconds; `None` means not suspended.
    pub suspend_until: Option<i64>,
    pub reason: Option<String>,
}

impl SuspensionInfo {
    pub fn new(suspended: bool) -> Self {
        Self {
            suspension: Suspension {
                suspend_until: suspended.then_some(FAR_FUTURE_EPOCH_MS),
                reason: None,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifierGroup {
    pub id: String,
    pub title: MultiLanguageText,
    pub quantity_info: QuantityInfo,
    pub modifier_options: Vec<EntityRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantityInfo {
    pub quantity: QuantityConstraint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantityConstraint {
    pub min_permitted: u32,
    pub max_permitted: u32,
}

pub fn build_menu(menu: &MenuSnapshot, binding: &PlatformStoreBinding) -> MenuPayload {
    let menu_id = binding
        .ubereats_menu_id()
        .unwrap_or(menu.menu_id.as_str())
        .to_string();

    let service_availability = DAYS
        .iter()
        .map(|day| ServiceAvailability {
            day_of_week: day.to_string(),
            time_periods: vec![TimePeriod {
                start_time: "00:00".into(),
                end_time: "23:59".into(),
            }],
        })
        .collect();

    let categories: Vec<Category> = menu
        .categories
        .iter()
        .map(|c| Category {
            id: c.id.clone(),
            title: (&c.name).into(),
            entities: c.dish_ids.iter().map(|id| EntityRef::item(id)).collect(),
        })
        .collect();

    let mut items: Vec<Item> = menu
        .dishes
        .iter()
        .map(|dish| {
            let mut seen = HashSet::new();
            let group_ids = dish
                .option_category_ids
                .iter()
                .filter(|id| seen.insert(id.as_str()))
                .cloned()
                .collect();
            Item {
                id: dish.id.clone(),
                title: (&dish.name).into(),
                description: (&dish.description).into(),
                price_info: PriceInfo {
                    price: to_minor_units(dish.price),
                },
                modifier_group_ids: ModifierGroupIds { ids: group_ids },
                suspension_info: SuspensionInfo::new(is_dish_suspended(dish)),
            }
        })
        .collect();

    let mut modifier_groups = Vec::new();
    for group in menu.referenced_option_categories() {
        modifier_groups.push(ModifierGroup {
            id: group.id.clone(),
            title: (&group.name).into(),
            quantity_info: QuantityInfo {
                quantity: QuantityConstraint {
                    min_permitted: group.min_select,
                    max_permitted: group.max_select,
                },
            },
            modifier_options: group.options.iter().map(|o| EntityRef::item(&o.id)).collect(),
        });

        // Options must also exist as sellable items.
        for option in &group.options {
            items.push(Item {
                id: option.id.clone(),
                title: (&option.name).into(),
                description: (&LocalizedText::default()).into(),
                price_info: PriceInfo {
                    price: to_minor_units(option.price),
                },
                modifier_group_ids: ModifierGroupIds { ids: Vec::new() },
                suspension_info: SuspensionInfo::new(is_option_suspended(option, menu)),
            });
        }
    }

    MenuPayload {
        menus: vec![Menu {
            id: menu_id,
            title: (&menu.title).into(),
            service_availability,
            category_ids: categories.iter().map(|c| c.id.clone()).collect(),
        }],
        categories,
        items,
        modifier_groups,
    }
}

#[derive(Debug, Deserialize)]
struct OrderDetails {
    id: String,
    #[serde(default)]
    display_id: Option<String>,
    #[serde(default)]
    store: Option<StoreRef>,
    #[serde(default)]
    cart: Cart,
    #[serde(default)]
    payment: Option<Payment>,
    #[serde(default)]
    placed_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StoreRef {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct Cart {
    #[serde(default)]
    items: Vec<CartItem>,
    #[serde(default)]
    special_instructions: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CartItem {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default = "one")]
    quantity: u32,
    #[serde(default)]
    price: Option<ItemPrice>,
    #[serde(default)]
    selected_modifier_groups: Vec<SelectedGroup>,
    #[serde(default)]
    special_instructions: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SelectedGroup {
    #[serde(default)]
    selected_items: Vec<SelectedItem>,
}

#[derive(Debug, Deserialize)]
struct SelectedItem {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default = "one")]
    quantity: u32,
    #[serde(default)]
    price: Option<ItemPrice>,
}

#[derive(Debug, Deserialize)]
struct ItemPrice {
    #[serde(default)]
    unit_price: Option<Money>,
}

#[derive(Debug, Deserialize)]
struct Payment {
    #[serde(default)]
    charges: Option<Charges>,
}

#[derive(Debug, Deserialize)]
struct Charges {
    #[serde(default)]
    total: Option<Money>,
}

#[derive(Debug, Deserialize)]
struct Money {
    amount: i64,
    #[serde(default)]
    currency_code: Option<String>,
}

fn one() -> u32 {
    1
}

fn minor_to_decimal(money: Option<&Money>) -> Decimal {
    money.map(|m| Decimal::new(m.amount, 2)).unwrap_or_default()
}

fn unit_price(price: &Option<ItemPrice>) -> Decimal {
    minor_to_decimal(price.as_ref().and_then(|p| p.unit_price.as_ref()))
}

fn normalize_order(details: OrderDetails, raw: Value) -> NormalizedOrder {
    let total = details
        .payment
        .as_ref()
        .and_then(|p| p.charges.as_ref())
        .and_then(|c| c.total.as_ref());

    let items = details
        .cart
        .items
        .iter()
        .map(|item| OrderLine {
            external_item_id: item.id.clone(),
            name: item.title.clone(),
            quantity: item.quantity,
            unit_price: unit_price(&item.price),
            note: item.special_instructions.clone(),
            modifiers: item
                .selected_modifier_groups
                .iter()
                .flat_map(|g| g.selected_items.iter())
                .map(|m| OrderModifier {
                    external_item_id: m.id.clone(),
                    name: m.title.clone(),
                    quantity: m.quantity,
                    unit_price: unit_price(&m.price),
                })
                .collect(),
        })
        .collect();

    NormalizedOrder {
        platform: Platform::UberEats,
        kind: OrderEventKind::Placed,
        external_order_id: details.id,
        display_id: details.display_id,
        external_store_id: details.store.map(|s| s.id),
        brand_id: None,
        store_id: None,
        auto_accept: false,
        items,
        total: total.map(|m| Decimal::new(m.amount, 2)),
        currency: total.and_then(|m| m.currency_code.clone()),
        customer_note: details.cart.special_instructions,
        placed_at: details
            .placed_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc)),
        raw,
    }
}

pub struct UberEatsAdapter {
    api: ApiClient,
}

impl UberEatsAdapter {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl PlatformAdapter for UberEatsAdapter {
    fn platform(&self) -> Platform {
        Platform::UberEats
    }

    fn convert_menu(
        &self,
        menu: &MenuSnapshot,
        binding: &PlatformStoreBinding,
    ) -> Result<Value, PlatformApiError> {
        serde_json::to_value(build_menu(menu, binding)).map_err(|e| PlatformApiError::Decode {
            platform: Platform::UberEats,
            message: e.to_string(),
        })
    }

    async fn push_menu(&self, binding: &PlatformStoreBinding, payload: &Value) -> Result<(), PlatformApiError> {
        let path = format!("/v2/eats/stores/{}/menus", binding.external_store_id);
        self.api.call(Method::PUT, &path, Some(payload)).await?;
        Ok(())
    }

    async fn set_item_availability(
        &self,
        binding: &PlatformStoreBinding,
        item_id: &str,
        suspended: bool,
    ) -> Result<(), PlatformApiError> {
        let path = format!(
            "/v2/eats/stores/{}/menus/items/{}",
            binding.external_store_id, item_id
        );
        let body = serde_json::json!({ "suspension_info": SuspensionInfo::new(suspended) });
        self.api.call(Method::POST, &path, Some(&body)).await?;
        Ok(())
    }

    fn envelope(&self, _route: WebhookRoute, payload: &Value) -> Result<EventEnvelope, IngestError> {
        let event_type = string_field(payload, "/event_type")
            .ok_or_else(|| IngestError::MalformedPayload("missing event_type".into()))?;

        Ok(EventEnvelope {
            event_id: string_field(payload, "/event_id").map(str::to_string),
            event_type: event_type.to_string(),
            timestamp: payload.get("event_time").and_then(Value::as_i64),
        })
    }

    async fn ingest_order(&self, event: &InboundWebhookEvent, payload: Value) -> Result<IngestOutcome, IngestError> {
        match event.event_type.as_str() {
            "orders.notification" => {
                let order_id = string_field(&payload, "/meta/resource_id")
                    .ok_or_else(|| IngestError::MalformedPayload("missing meta.resource_id".into()))?
                    .to_string();

                let raw = self
                    .api
                    .call(Method::GET, &format!("/v2/eats/order/{order_id}"), None)
                    .await?;
                let details: OrderDetails = serde_json::from_value(raw.clone()).map_err(|e| {
                    IngestError::Platform(PlatformApiError::Decode {
                        platform: Platform::UberEats,
                        message: e.to_string(),
                    })
                })?;

                let mut order = normalize_order(details, raw);
                if order.external_store_id.is_none() {
                    order.external_store_id = string_field(&payload, "/meta/user_id").map(str::to_string);
                }
                Ok(IngestOutcome::Order(order))
            }
            "orders.cancel" => {
                let order_id = string_field(&payload, "/meta/resource_id")
                    .ok_or_else(|| IngestError::MalformedPayload("missing meta.resource_id".into()))?
                    .to_string();
                let mut order = NormalizedOrder::cancellation(Platform::UberEats, order_id, payload.clone());
                order.external_store_id = string_field(&payload, "/meta/user_id").map(str::to_string);
                Ok(IngestOutcome::Order(order))
            }
            other => {
                debug!(event_type = other, "ubereats event type not handled");
                Ok(IngestOutcome::Acknowledged {
                    event_type: other.to_string(),
                })
            }
        }
    }
}
