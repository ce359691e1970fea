//! Ledger entries.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use clinic_core::{AppointmentId, DomainError, Entity, InventoryItemId, TransactionId};

/// Why stock moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    Restock,
    Purchase,
    Return,
    Damage,
    Expiry,
    Use,
    PatientUse,
    Expired,
    Damaged,
    Lost,
    Adjustment,
    Other,
}

impl Reason {
    pub const ALL: [Reason; 12] = [
        Reason::Restock,
        Reason::Purchase,
        Reason::Return,
        Reason::Damage,
        Reason::Expiry,
        Reason::Use,
        Reason::PatientUse,
        Reason::Expired,
        Reason::Damaged,
        Reason::Lost,
        Reason::Adjustment,
        Reason::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Reason::Restock => "restock",
            Reason::Purchase => "purchase",
            Reason::Return => "return",
            Reason::Damage => "damage",
            Reason::Expiry => "expiry",
            Reason::Use => "use",
            Reason::PatientUse => "patient_use",
            Reason::Expired => "expired",
            Reason::Damaged => "damaged",
            Reason::Lost => "lost",
            Reason::Adjustment => "adjustment",
            Reason::Other => "other",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Reason::Restock => "Restock",
            Reason::Purchase => "Purchase",
            Reason::Return => "Return",
            Reason::Damage => "Damage",
            Reason::Expiry => "Expiry",
            Reason::Use => "Use",
            Reason::PatientUse => "Patient Use",
            Reason::Expired => "Expired",
            Reason::Damaged => "Damaged",
            Reason::Lost => "Lost",
            Reason::Adjustment => "Adjustment",
            Reason::Other => "Other",
        }
    }
}

impl core::fmt::Display for Reason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.display_name())
    }
}

impl core::str::FromStr for Reason {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        Reason::ALL
            .into_iter()
            .find(|r| r.as_str() == normalized)
            .ok_or_else(|| DomainError::validation("reason", format!("unknown stock movement reason: {s}")))
    }
}

/// Coarse classification of an entry, derived from its reason and sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Add,
    Remove,
    Adjust,
    Expired,
    Damaged,
}

impl TransactionKind {
    pub fn classify(delta: i64, reason: Reason) -> Self {
        match reason {
            Reason::Adjustment => TransactionKind::Adjust,
            Reason::Expired | Reason::Expiry if delta < 0 => TransactionKind::Expired,
            Reason::Damaged | Reason::Damage if delta < 0 => TransactionKind::Damaged,
            _ if delta > 0 => TransactionKind::Add,
            _ => TransactionKind::Remove,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            TransactionKind::Add => "Stock Added",
            TransactionKind::Remove => "Stock Removed",
            TransactionKind::Adjust => "Stock Adjusted",
            TransactionKind::Expired => "Expired Items Removed",
            TransactionKind::Damaged => "Damaged Items Removed",
        }
    }
}

/// A ledger entry that has been decided but not yet written.
///
/// The store assigns the id, the item reference and the timestamp when it
/// appends the entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    /// Signed quantity change: positive adds stock, negative removes it.
    pub delta: i64,
    pub reason: Reason,
    /// Set when the removal is attributable to patient care.
    pub appointment_id: Option<AppointmentId>,
    pub notes: Option<String>,
}

/// An immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryTransaction {
    pub id: TransactionId,
    pub item_id: InventoryItemId,
    pub delta: i64,
    pub reason: Reason,
    pub appointment_id: Option<AppointmentId>,
    pub occurred_at: NaiveDateTime,
    pub notes: Option<String>,
}

impl Entity for InventoryTransaction {
    type Id = TransactionId;

    fn id(&self) -> TransactionId {
        self.id
    }
}

impl InventoryTransaction {
    pub fn kind(&self) -> TransactionKind {
        TransactionKind::classify(self.delta, self.reason)
    }

    pub fn is_addition(&self) -> bool {
        self.delta > 0
    }

    /// One-line description, e.g. "Removed 7 boxes of Gloves (Use)".
    pub fn describe(&self, item_name: &str, unit: &str) -> String {
        let verb = if self.is_addition() { "Added" } else { "Removed" };
        format!(
            "{verb} {} {unit} of {item_name} ({})",
            self.delta.abs(),
            self.reason.display_name()
        )
    }
}
