use chrono::{DateTime, TimeZone, Utc};

use super::{Dish, DishOption, Inventory, MenuSnapshot};

/// Suspensions are expressed as "suspended until" this instant
/// (2100-01-01T00:00:00Z) since not every platform has a boolean flag.
pub const FAR_FUTURE_EPOCH_MS: i64 = 4_102_444_800_000;

pub fn far_future() -> DateTime<Utc> {
    Utc.timestamp_millis_opt(FAR_FUTURE_EPOCH_MS)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Manual sold-out wins over computed stock.
pub fn is_inventory_suspended(inventory: &Inventory) -> bool {
    if inventory.sold_out {
        return true;
    }
    inventory.track_stock && inventory.available_quantity <= 0
}

pub fn is_dish_suspended(dish: &Dish) -> bool {
    is_inventory_suspended(&dish.inventory)
}

/// An option follows its reference dish; options without one are never
/// suspended by inventory.
pub fn is_option_suspended(option: &DishOption, menu: &MenuSnapshot) -> bool {
    option
        .reference_dish_id
        .as_deref()
        .and_then(|id| menu.dish(id))
        .map(is_dish_suspended)
        .unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemAvailability {
    pub item_id: String,
    pub suspended: bool,
}

/// Availability of every sellable item on a menu: dishes first, then each
/// option of each referenced option category once.
pub fn menu_availability(menu: &MenuSnapshot) -> Vec<ItemAvailability> {
    let dishes = menu.dishes.iter().map(|dish| ItemAvailability {
        item_id: dish.id.clone(),
        suspended: is_dish_suspended(dish),
    });

    let options = menu
        .referenced_option_categories()
        .into_iter()
        .flat_map(|category| category.options.iter())
        .map(|option| ItemAvailability {
            item_id: option.id.clone(),
            suspended: is_option_suspended(option, menu),
        });

    dishes.chain(options).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::menu::fixtures;

    fn inventory(sold_out: bool, track_stock: bool, available_quantity: i64) -> Inventory {
        Inventory {
            sold_out,
            track_stock,
            available_quantity,
        }
    }

    #[test]
    fn manual_sold_out_overrides_stock() {
        assert!(is_inventory_suspended(&inventory(true, true, 50)));
        assert!(is_inventory_suspended(&inventory(true, false, 0)));
    }

    #[test]
    fn stock_only_counts_when_tracked() {
        assert!(is_inventory_suspended(&inventory(false, true, 0)));
        assert!(is_inventory_suspended(&inventory(false, true, -3)));
        assert!(!is_inventory_suspended(&inventory(false, true, 1)));
        assert!(!is_inventory_suspended(&inventory(false, false, 0)));
    }

    #[test]
    fn options_follow_their_reference_dish() {
        let mut menu = fixtures::menu();
        let fries_side = menu.find_option("side-fries").unwrap().clone();
        let salad_side = menu.find_option("side-salad").unwrap().clone();

        assert!(!is_option_suspended(&fries_side, &menu));

        menu.dishes[1].inventory = inventory(false, true, 0);
        assert!(is_option_suspended(&fries_side, &menu));
        assert!(!is_option_suspended(&salad_side, &menu));
    }

    #[test]
    fn menu_availability_lists_each_item_once() {
        let mut menu = fixtures::menu();
        menu.dishes[1].inventory.sold_out = true;

        let items = menu_availability(&menu);
        let ids: Vec<&str> = items.iter().map(|i| i.item_id.as_str()).collect();
        assert_eq!(ids, ["dish-combo", "dish-fries", "side-fries", "side-salad"]);

        let suspended: Vec<bool> = items.iter().map(|i| i.suspended).collect();
        assert_eq!(suspended, [false, true, true, false]);
    }

    #[test]
    fn far_future_is_year_2100() {
        assert_eq!(far_future().timestamp_millis(), FAR_FUTURE_EPOCH_MS);
        assert_eq!(far_future().format("%Y").to_string(), "2100");
    }
}
