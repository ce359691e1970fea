//! Inventory façade: item catalogue, ledger-backed stock movements, reports.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use clinic_core::{AppointmentId, Clock, DomainError, InventoryItemId};
use clinic_infra::{ClinicStore, MovementOutcome};
use clinic_inventory::{
    Category, InventoryItem, InventoryStats, InventoryTransaction, ItemDetails, LedgerDrift,
    NewTransaction, Reason, StockMovement, StockStatus, verify_ledger,
};

use crate::outcome::{ServiceError, ServiceResult, Success};
use crate::traced;

/// Input for [`InventoryService::create_item`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    #[serde(flatten)]
    pub details: ItemDetails,
    /// Opening stock, recorded as a `restock` ledger entry when positive.
    #[serde(default)]
    pub initial_quantity: i64,
}

pub struct InventoryService {
    store: Arc<dyn ClinicStore>,
    clock: Arc<dyn Clock>,
    expiring_soon_days: i64,
}

impl InventoryService {
    pub fn new(store: Arc<dyn ClinicStore>, clock: Arc<dyn Clock>, expiring_soon_days: i64) -> Self {
        Self {
            store,
            clock,
            expiring_soon_days,
        }
    }

    fn require_item(&self, id: InventoryItemId) -> Result<InventoryItem, ServiceError> {
        self.store
            .get_item(id)?
            .ok_or_else(|| DomainError::not_found("Inventory item", id).into())
    }

    fn movement(&self, id: InventoryItemId, movement: StockMovement) -> Result<MovementOutcome, ServiceError> {
        Ok(self.store.apply_movement(id, &movement, self.clock.now())?)
    }

    #[instrument(skip(self, input), fields(name = %input.details.name))]
    pub fn create_item(&self, input: NewItem) -> ServiceResult<InventoryItem> {
        traced("create_item", || {
            let details = input.details.validate(self.clock.today())?;
            if input.initial_quantity < 0 {
                return Err(DomainError::validation("quantity", "Initial quantity cannot be negative.").into());
            }
            let opening = (input.initial_quantity > 0).then(|| NewTransaction {
                delta: input.initial_quantity,
                reason: Reason::Restock,
                appointment_id: None,
                notes: Some("Initial stock".to_string()),
            });
            let item = self.store.create_item(details, opening, self.clock.now())?;
            Ok(Success::with_message(item, "Item created successfully."))
        })
    }

    /// Edit descriptive fields. Quantity is untouched.
    #[instrument(skip(self, details), fields(item_id = %id))]
    pub fn update_item_details(&self, id: InventoryItemId, details: ItemDetails) -> ServiceResult<InventoryItem> {
        traced("update_item_details", || {
            let details = details.validate(self.clock.today())?;
            let item = self.store.update_item_details(id, details, self.clock.now())?;
            Ok(Success::with_message(item, "Item updated successfully."))
        })
    }

    #[instrument(skip(self, notes), fields(item_id = %id))]
    pub fn add_stock(
        &self,
        id: InventoryItemId,
        quantity: i64,
        reason: Option<Reason>,
        notes: Option<String>,
    ) -> ServiceResult<InventoryItem> {
        traced("add_stock", || {
            let outcome = self.movement(
                id,
                StockMovement::Add {
                    quantity,
                    reason,
                    notes,
                },
            )?;
            let message = format!("Added {} {} to {}", quantity, outcome.item.unit(), outcome.item.name());
            Ok(Success::with_message(outcome.item, message))
        })
    }

    #[instrument(skip(self, notes), fields(item_id = %id))]
    pub fn remove_stock(
        &self,
        id: InventoryItemId,
        quantity: i64,
        reason: Reason,
        appointment_id: Option<AppointmentId>,
        notes: Option<String>,
    ) -> ServiceResult<InventoryItem> {
        traced("remove_stock", || {
            let outcome = self.movement(
                id,
                StockMovement::Remove {
                    quantity,
                    reason,
                    appointment_id,
                    notes,
                },
            )?;
            let message = format!("Removed {} {} from {}", quantity, outcome.item.unit(), outcome.item.name());
            Ok(Success::with_message(outcome.item, message))
        })
    }

    /// Set the count to a physically observed quantity. Writes nothing when
    /// the count is already right.
    #[instrument(skip(self, reason), fields(item_id = %id))]
    pub fn adjust_stock(
        &self,
        id: InventoryItemId,
        new_quantity: i64,
        reason: Option<String>,
    ) -> ServiceResult<InventoryItem> {
        traced("adjust_stock", || {
            let outcome = self.movement(id, StockMovement::Adjust { new_quantity, reason })?;
            let message = match outcome.transaction {
                None => "No adjustment needed - quantity is already correct.".to_string(),
                Some(_) => format!(
                    "Adjusted {} quantity from {} to {}",
                    outcome.item.name(),
                    outcome.previous_quantity,
                    outcome.item.quantity()
                ),
            };
            Ok(Success::with_message(outcome.item, message))
        })
    }

    /// Record a raw signed movement.
    #[instrument(skip(self, notes), fields(item_id = %id))]
    pub fn apply_transaction(
        &self,
        id: InventoryItemId,
        delta: i64,
        reason: Reason,
        appointment_id: Option<AppointmentId>,
        notes: Option<String>,
    ) -> ServiceResult<InventoryTransaction> {
        traced("apply_transaction", || {
            let outcome = self.movement(
                id,
                StockMovement::Apply {
                    delta,
                    reason,
                    appointment_id,
                    notes,
                },
            )?;
            let entry = outcome.transaction.ok_or_else(|| {
                DomainError::validation("quantity", "Quantity change cannot be zero.")
            })?;
            let message = entry.describe(outcome.item.name(), outcome.item.unit());
            Ok(Success::with_message(entry, message))
        })
    }

    #[instrument(skip(self), fields(item_id = %id))]
    pub fn delete_item(&self, id: InventoryItemId) -> ServiceResult<()> {
        traced("delete_item", || {
            self.store.delete_item(id)?;
            Ok(Success::with_message((), "Item deleted successfully."))
        })
    }

    pub fn get_item(&self, id: InventoryItemId) -> ServiceResult<InventoryItem> {
        traced("get_item", || self.require_item(id).map(Success::new))
    }

    /// Display status under the configured expiring-soon window.
    pub fn item_status(&self, id: InventoryItemId) -> ServiceResult<StockStatus> {
        traced("item_status", || {
            let item = self.require_item(id)?;
            Ok(Success::new(item.status(self.clock.today(), self.expiring_soon_days)))
        })
    }

    fn select(
        &self,
        operation: &'static str,
        keep: impl Fn(&InventoryItem) -> bool,
    ) -> ServiceResult<Vec<InventoryItem>> {
        traced(operation, || {
            let items = self.store.list_items()?.into_iter().filter(|item| keep(item)).collect();
            Ok(Success::new(items))
        })
    }

    pub fn list_items(&self) -> ServiceResult<Vec<InventoryItem>> {
        self.select("list_items", |_| true)
    }

    pub fn items_by_category(&self, category: Category) -> ServiceResult<Vec<InventoryItem>> {
        self.select("items_by_category", |item| item.details.category == category)
    }

    /// Case-insensitive match on name or supplier. A blank query lists everything.
    pub fn search(&self, query: &str) -> ServiceResult<Vec<InventoryItem>> {
        let needle = query.trim().to_lowercase();
        self.select("search_items", |item| {
            needle.is_empty()
                || item.name().to_lowercase().contains(&needle)
                || item
                    .details
                    .supplier
                    .as_deref()
                    .is_some_and(|s| s.to_lowercase().contains(&needle))
        })
    }

    /// Items at or below their threshold, out-of-stock ones included.
    pub fn low_stock(&self) -> ServiceResult<Vec<InventoryItem>> {
        self.select("low_stock_items", InventoryItem::is_low_stock)
    }

    /// Items whose expiry date has passed.
    pub fn expired(&self) -> ServiceResult<Vec<InventoryItem>> {
        let today = self.clock.today();
        self.select("expired_items", |item| item.details.expiry_date.is_some_and(|d| d < today))
    }

    /// Items that report [`StockStatus::ExpiringSoon`].
    pub fn expiring_soon(&self) -> ServiceResult<Vec<InventoryItem>> {
        let today = self.clock.today();
        let window = self.expiring_soon_days;
        self.select("expiring_soon_items", |item| {
            item.status(today, window) == StockStatus::ExpiringSoon
        })
    }

    /// One item's ledger, oldest first.
    pub fn item_history(&self, id: InventoryItemId) -> ServiceResult<Vec<InventoryTransaction>> {
        traced("item_history", || {
            self.require_item(id)?;
            Ok(Success::new(self.store.item_transactions(id)?))
        })
    }

    pub fn recent_transactions(&self, limit: usize) -> ServiceResult<Vec<InventoryTransaction>> {
        traced("recent_transactions", || {
            Ok(Success::new(self.store.recent_transactions(limit)?))
        })
    }

    pub fn stats(&self) -> ServiceResult<InventoryStats> {
        traced("inventory_stats", || {
            let items = self.store.list_items()?;
            Ok(Success::new(InventoryStats::from_items(&items)))
        })
    }

    /// Compare every cached quantity with its ledger sum. Empty when consistent.
    pub fn audit_ledger(&self) -> ServiceResult<Vec<LedgerDrift>> {
        traced("audit_ledger", || {
            let drift: Vec<LedgerDrift> = self
                .store
                .ledger_snapshot()?
                .iter()
                .filter_map(|(item, entries)| verify_ledger(item, entries))
                .collect();
            for d in &drift {
                warn!(item_id = %d.item_id, cached = d.cached, ledger = d.ledger, "ledger drift detected");
            }
            Ok(Success::new(drift))
        })
    }
}
