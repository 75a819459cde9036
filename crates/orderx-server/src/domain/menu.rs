use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedText {
    #[serde(default)]
    pub en: String,
    #[serde(default)]
    pub zh: String,
}

impl LocalizedText {
    pub fn new(en: impl Into<String>, zh: impl Into<String>) -> Self {
        Self {
            en: en.into(),
            zh: zh.into(),
        }
    }

    /// English text, falling back to Chinese when no translation exists.
    pub fn primary(&self) -> &str {
        if self.en.is_empty() {
            &self.zh
        } else {
            &self.en
        }
    }
}

/// Read-only copy of a store's menu as served by the menu service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuSnapshot {
    pub brand_id: Uuid,
    pub store_id: Uuid,
    pub menu_id: String,
    pub title: LocalizedText,
    #[serde(default)]
    pub categories: Vec<MenuCategory>,
    #[serde(default)]
    pub dishes: Vec<Dish>,
    #[serde(default)]
    pub option_categories: Vec<OptionCategory>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuCategory {
    pub id: String,
    pub name: LocalizedText,
    #[serde(default)]
    pub dish_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dish {
    pub id: String,
    pub name: LocalizedText,
    #[serde(default)]
    pub description: LocalizedText,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    #[serde(default)]
    pub option_category_ids: Vec<String>,
    #[serde(default)]
    pub inventory: Inventory,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub sold_out: bool,
    #[serde(default)]
    pub track_stock: bool,
    #[serde(default)]
    pub available_quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionCategory {
    pub id: String,
    pub name: LocalizedText,
    #[serde(default)]
    pub min_select: u32,
    #[serde(default = "default_max_select")]
    pub max_select: u32,
    #[serde(default)]
    pub options: Vec<DishOption>,
}

fn default_max_select() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DishOption {
    pub id: String,
    pub name: LocalizedText,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    /// Dish this option sells, for combo-style upsells.
    #[serde(default)]
    pub reference_dish_id: Option<String>,
}

impl MenuSnapshot {
    pub fn dish(&self, id: &str) -> Option<&Dish> {
        self.dishes.iter().find(|d| d.id == id)
    }

    /// Option categories referenced by any dish, each exactly once, in first
    /// reference order.
    pub fn referenced_option_categories(&self) -> Vec<&OptionCategory> {
        let by_id: HashMap<&str, &OptionCategory> = self
            .option_categories
            .iter()
            .map(|c| (c.id.as_str(), c))
            .collect();

        let mut seen = HashSet::new();
        let mut ordered = Vec::new();
        for dish in &self.dishes {
            for id in &dish.option_category_ids {
                if !seen.insert(id.as_str()) {
                    continue;
                }
                if let Some(category) = by_id.get(id.as_str()) {
                    ordered.push(*category);
                }
            }
        }
        ordered
    }

    pub fn find_option(&self, id: &str) -> Option<&DishOption> {
        self.option_categories
            .iter()
            .flat_map(|c| c.options.iter())
            .find(|o| o.id == id)
    }
}

/// Decimal price to minor currency units (cents).
pub fn to_minor_units(price: Decimal) -> i64 {
    use rust_decimal::prelude::ToPrimitive;

    (price * Decimal::ONE_HUNDRED).round().to_i64().unwrap_or(0)
}
