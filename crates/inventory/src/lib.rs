//! Inventory domain module (ledger-backed stock).
//!
//! This crate contains business rules for inventory, implemented purely as
//! deterministic domain logic (no IO, no storage). An item's quantity is the
//! sum of its ledger entries; the only way to change it is to apply a new
//! entry.

pub mod item;
pub mod ledger;
pub mod stats;
pub mod status;
pub mod transaction;

pub use item::{Category, InventoryItem, ItemDetails};
pub use ledger::{LedgerDecision, LedgerDrift, StockMovement, ledger_sum, plan_movement, verify_ledger};
pub use stats::InventoryStats;
pub use status::{EXPIRING_SOON_DAYS, StockStatus, derive_status, derive_status_within};
pub use transaction::{InventoryTransaction, NewTransaction, Reason, TransactionKind};
