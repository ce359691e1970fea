//! Inventory-wide summary counters.

use serde::{Deserialize, Serialize};

use crate::item::InventoryItem;

/// Summary figures over a set of items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryStats {
    pub total_items: usize,
    pub low_stock_count: usize,
    pub out_of_stock_count: usize,
    pub total_value_cents: i64,
}

impl InventoryStats {
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a InventoryItem>) -> Self {
        items.into_iter().fold(Self::default(), |mut acc, item| {
            acc.total_items += 1;
            if item.is_low_stock() {
                acc.low_stock_count += 1;
            }
            if item.is_out_of_stock() {
                acc.out_of_stock_count += 1;
            }
            acc.total_value_cents = acc.total_value_cents.saturating_add(item.total_value_cents());
            acc
        })
    }
}
