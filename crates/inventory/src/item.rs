//! Stock items and their descriptive details.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use clinic_core::{DomainError, DomainResult, Entity, InventoryItemId};

use crate::status::{StockStatus, derive_status_within};
use crate::transaction::InventoryTransaction;

pub const DEFAULT_UNIT: &str = "pieces";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Medicine,
    Supplies,
    Equipment,
    Other,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Medicine,
        Category::Supplies,
        Category::Equipment,
        Category::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Medicine => "medicine",
            Category::Supplies => "supplies",
            Category::Equipment => "equipment",
            Category::Other => "other",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Category::Medicine => "Medicine",
            Category::Supplies => "Supplies",
            Category::Equipment => "Equipment",
            Category::Other => "Other",
        }
    }
}

impl core::str::FromStr for Category {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| {
                DomainError::validation(
                    "category",
                    "category must be one of: medicine, supplies, equipment, other",
                )
            })
    }
}

/// Descriptive attributes of an item: everything except its quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDetails {
    pub name: String,
    pub category: Category,
    pub unit: String,
    /// Reorder threshold: at or below this quantity the item is low on stock.
    pub threshold: i64,
    /// Cost per unit in smallest currency unit (cents).
    pub cost_per_unit_cents: i64,
    pub supplier: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl ItemDetails {
    /// Validate and normalize (trim, default unit, drop blank optionals).
    pub fn validate(self, today: NaiveDate) -> DomainResult<ItemDetails> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("name", "Item name is required."));
        }
        let name_len = name.chars().count();
        if name_len < 2 {
            return Err(DomainError::validation(
                "name",
                "Item name must be at least 2 characters long.",
            ));
        }
        if name_len > 100 {
            return Err(DomainError::validation(
                "name",
                "Item name must be less than 100 characters.",
            ));
        }

        let unit = match self.unit.trim() {
            "" => DEFAULT_UNIT.to_string(),
            u => u.to_string(),
        };

        if self.threshold < 0 {
            return Err(DomainError::validation("threshold", "Threshold cannot be negative."));
        }
        if self.cost_per_unit_cents < 0 {
            return Err(DomainError::validation(
                "cost_per_unit",
                "Cost per unit cannot be negative.",
            ));
        }
        if matches!(self.expiry_date, Some(expiry) if expiry < today) {
            return Err(DomainError::validation(
                "expiry_date",
                "Expiry date cannot be in the past.",
            ));
        }

        Ok(ItemDetails {
            name,
            unit,
            supplier: non_blank(self.supplier),
            notes: non_blank(self.notes),
            ..self
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A stock item with its ledger-derived quantity.
///
/// `quantity` is a cache of the item's ledger sum. It has no setter: it only
/// moves through [`InventoryItem::apply`], one ledger entry at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    id: InventoryItemId,
    #[serde(flatten)]
    pub details: ItemDetails,
    quantity: i64,
    pub updated_at: NaiveDateTime,
}

impl Entity for InventoryItem {
    type Id = InventoryItemId;

    fn id(&self) -> InventoryItemId {
        self.id
    }
}

impl InventoryItem {
    /// A newly created item with an empty ledger.
    pub fn new(id: InventoryItemId, details: ItemDetails, created_at: NaiveDateTime) -> Self {
        Self {
            id,
            details,
            quantity: 0,
            updated_at: created_at,
        }
    }

    /// Rehydrate from storage. `quantity` must be the stored ledger sum.
    pub fn restore(
        id: InventoryItemId,
        details: ItemDetails,
        quantity: i64,
        updated_at: NaiveDateTime,
    ) -> Self {
        Self {
            id,
            details,
            quantity,
            updated_at,
        }
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn name(&self) -> &str {
        &self.details.name
    }

    pub fn unit(&self) -> &str {
        &self.details.unit
    }

    /// Evolve the cached quantity by one committed ledger entry.
    pub fn apply(&mut self, entry: &InventoryTransaction) {
        debug_assert_eq!(entry.item_id, self.id, "ledger entry applied to the wrong item");
        self.quantity += entry.delta;
        self.updated_at = entry.occurred_at;
    }

    pub fn status(&self, today: NaiveDate, expiring_window_days: i64) -> StockStatus {
        derive_status_within(
            self.quantity,
            self.details.threshold,
            self.details.expiry_date,
            today,
            expiring_window_days,
        )
    }

    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.details.threshold
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.quantity <= 0
    }

    pub fn total_value_cents(&self) -> i64 {
        self.details.cost_per_unit_cents.saturating_mul(self.quantity)
    }

    /// "Gauze (10 pieces)".
    pub fn display_name(&self) -> String {
        format!("{} ({} {})", self.details.name, self.quantity, self.details.unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Reason;
    use clinic_core::TransactionId;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn details(name: &str) -> ItemDetails {
        ItemDetails {
            name: name.to_string(),
            category: Category::Supplies,
            unit: "  ".to_string(),
            threshold: 5,
            cost_per_unit_cents: 250,
            supplier: Some("   ".to_string()),
            expiry_date: None,
            notes: None,
        }
    }

    #[test]
    fn validate_normalizes_fields() {
        let d = details("  Gauze ").validate(today()).unwrap();
        assert_eq!(d.name, "Gauze");
        assert_eq!(d.unit, DEFAULT_UNIT);
        assert_eq!(d.supplier, None);
    }

    #[test]
    fn validate_rejects_bad_input_per_field() {
        let cases = [
            (ItemDetails { name: " ".into(), ..details("x") }, "name"),
            (ItemDetails { name: "G".into(), ..details("x") }, "name"),
            (ItemDetails { name: "G".repeat(101), ..details("x") }, "name"),
            (ItemDetails { threshold: -1, ..details("Gauze") }, "threshold"),
            (ItemDetails { cost_per_unit_cents: -1, ..details("Gauze") }, "cost_per_unit"),
            (
                ItemDetails {
                    expiry_date: today().pred_opt(),
                    ..details("Gauze")
                },
                "expiry_date",
            ),
        ];
        for (input, field) in cases {
            let err = input.validate(today()).unwrap_err();
            assert_eq!(err.field(), Some(field));
        }
    }

    #[test]
    fn apply_moves_quantity_and_timestamp() {
        let created = today().and_hms_opt(8, 0, 0).unwrap();
        let details = details("Gauze").validate(today()).unwrap();
        let mut item = InventoryItem::new(InventoryItemId::new(1), details, created);
        let later = today().and_hms_opt(9, 30, 0).unwrap();
        item.apply(&InventoryTransaction {
            id: TransactionId::new(1),
            item_id: InventoryItemId::new(1),
            delta: 12,
            reason: Reason::Restock,
            appointment_id: None,
            occurred_at: later,
            notes: None,
        });
        assert_eq!(item.quantity(), 12);
        assert_eq!(item.updated_at, later);
        assert_eq!(item.total_value_cents(), 3_000);
        assert_eq!(item.display_name(), "Gauze (12 pieces)");
    }

    #[test]
    fn category_parses_case_insensitively() {
        assert_eq!("Medicine".parse::<Category>().unwrap(), Category::Medicine);
        assert!("food".parse::<Category>().is_err());
    }
}
