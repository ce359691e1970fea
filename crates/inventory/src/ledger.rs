//! Stock movements and the ledger-sum invariant.
//!
//! A movement request is turned into a ledger entry by [`plan_movement`], a
//! pure decision over the item's current state. The store runs that decision
//! while holding the item's lock and writes the entry and the new quantity
//! together.

use serde::{Deserialize, Serialize};

use clinic_core::{AppointmentId, DomainError, DomainResult, Entity, InventoryItemId};

use crate::item::InventoryItem;
use crate::transaction::{InventoryTransaction, NewTransaction, Reason};

/// A requested change to one item's stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StockMovement {
    /// Receive stock. Reason defaults to `Restock`.
    Add {
        quantity: i64,
        reason: Option<Reason>,
        notes: Option<String>,
    },
    /// Consume or write off stock.
    Remove {
        quantity: i64,
        reason: Reason,
        appointment_id: Option<AppointmentId>,
        notes: Option<String>,
    },
    /// Correct the count to a physically observed quantity.
    Adjust {
        new_quantity: i64,
        reason: Option<String>,
    },
    /// Raw signed delta.
    Apply {
        delta: i64,
        reason: Reason,
        appointment_id: Option<AppointmentId>,
        notes: Option<String>,
    },
}

/// Outcome of planning a movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerDecision {
    Record(NewTransaction),
    /// Nothing to write; the item is already at the requested quantity.
    NoChange,
}

pub fn plan_movement(item: &InventoryItem, movement: &StockMovement) -> DomainResult<LedgerDecision> {
    let entry = match movement {
        StockMovement::Add {
            quantity,
            reason,
            notes,
        } => {
            if *quantity <= 0 {
                return Err(DomainError::validation(
                    "quantity",
                    "Quantity to add must be greater than 0.",
                ));
            }
            NewTransaction {
                delta: *quantity,
                reason: reason.unwrap_or(Reason::Restock),
                appointment_id: None,
                notes: notes.clone(),
            }
        }
        StockMovement::Remove {
            quantity,
            reason,
            appointment_id,
            notes,
        } => {
            if *quantity <= 0 {
                return Err(DomainError::validation(
                    "quantity",
                    "Quantity to remove must be greater than 0.",
                ));
            }
            NewTransaction {
                delta: -*quantity,
                reason: *reason,
                appointment_id: *appointment_id,
                notes: notes.clone(),
            }
        }
        StockMovement::Adjust {
            new_quantity,
            reason,
        } => {
            if *new_quantity < 0 {
                return Err(DomainError::validation(
                    "quantity",
                    "New quantity cannot be negative.",
                ));
            }
            let delta = new_quantity - item.quantity();
            if delta == 0 {
                return Ok(LedgerDecision::NoChange);
            }
            NewTransaction {
                delta,
                reason: Reason::Adjustment,
                appointment_id: None,
                notes: Some(adjustment_note(item.quantity(), *new_quantity, reason.as_deref())),
            }
        }
        StockMovement::Apply {
            delta,
            reason,
            appointment_id,
            notes,
        } => {
            if *delta == 0 {
                return Err(DomainError::validation(
                    "quantity",
                    "Quantity change cannot be zero.",
                ));
            }
            NewTransaction {
                delta: *delta,
                reason: *reason,
                appointment_id: *appointment_id,
                notes: notes.clone(),
            }
        }
    };

    if entry.delta < 0 {
        let requested = entry.delta.checked_neg().ok_or_else(quantity_out_of_range)?;
        ensure_available(item.quantity(), requested)?;
    }
    if item.quantity().checked_add(entry.delta).is_none() {
        return Err(quantity_out_of_range());
    }
    Ok(LedgerDecision::Record(entry))
}

fn quantity_out_of_range() -> DomainError {
    DomainError::validation("quantity", "Quantity is too large.")
}

fn ensure_available(available: i64, requested: i64) -> DomainResult<()> {
    if available < requested {
        return Err(DomainError::InsufficientStock {
            available,
            requested,
        });
    }
    Ok(())
}

fn adjustment_note(from: i64, to: i64, reason: Option<&str>) -> String {
    let base = format!("Stock adjustment: {from} -> {to}");
    match reason.map(str::trim).filter(|r| !r.is_empty()) {
        Some(reason) => format!("{base}. Reason: {reason}"),
        None => base,
    }
}

/// Sum of deltas across an item's ledger.
pub fn ledger_sum<'a>(entries: impl IntoIterator<Item = &'a InventoryTransaction>) -> i64 {
    entries.into_iter().map(|e| e.delta).sum()
}

/// An item whose cached quantity disagrees with its ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerDrift {
    pub item_id: InventoryItemId,
    pub cached: i64,
    pub ledger: i64,
}

/// Compare the cached quantity against the ledger sum.
pub fn verify_ledger(item: &InventoryItem, entries: &[InventoryTransaction]) -> Option<LedgerDrift> {
    let ledger = ledger_sum(entries.iter().filter(|e| e.item_id == item.id()));
    (ledger != item.quantity()).then(|| LedgerDrift {
        item_id: item.id(),
        cached: item.quantity(),
        ledger,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{Category, ItemDetails};
    use chrono::{NaiveDate, NaiveDateTime};
    use clinic_core::TransactionId;
    use proptest::prelude::*;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn item() -> InventoryItem {
        InventoryItem::new(
            InventoryItemId::new(1),
            ItemDetails {
                name: "Gloves".into(),
                category: Category::Supplies,
                unit: "boxes".into(),
                threshold: 5,
                cost_per_unit_cents: 1_200,
                supplier: None,
                expiry_date: None,
                notes: None,
            },
            at(),
        )
    }

    /// Plan and, when recorded, apply: the same sequence a store runs.
    fn commit(
        item: &mut InventoryItem,
        ledger: &mut Vec<InventoryTransaction>,
        movement: &StockMovement,
    ) -> DomainResult<LedgerDecision> {
        let decision = plan_movement(item, movement)?;
        if let LedgerDecision::Record(new) = &decision {
            let entry = InventoryTransaction {
                id: TransactionId::new(ledger.len() as i64 + 1),
                item_id: item.id(),
                delta: new.delta,
                reason: new.reason,
                appointment_id: new.appointment_id,
                occurred_at: at(),
                notes: new.notes.clone(),
            };
            item.apply(&entry);
            ledger.push(entry);
        }
        Ok(decision)
    }

    fn add(quantity: i64) -> StockMovement {
        StockMovement::Add {
            quantity,
            reason: None,
            notes: None,
        }
    }

    fn remove(quantity: i64) -> StockMovement {
        StockMovement::Remove {
            quantity,
            reason: Reason::Use,
            appointment_id: None,
            notes: None,
        }
    }

    #[test]
    fn add_defaults_to_restock() {
        match plan_movement(&item(), &add(5)).unwrap() {
            LedgerDecision::Record(new) => {
                assert_eq!(new.delta, 5);
                assert_eq!(new.reason, Reason::Restock);
            }
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[test]
    fn removal_beyond_stock_is_rejected_with_amounts() {
        let (mut it, mut ledger) = (item(), Vec::new());
        commit(&mut it, &mut ledger, &add(3)).unwrap();

        let err = commit(&mut it, &mut ledger, &remove(5)).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                available: 3,
                requested: 5
            }
        );
        assert_eq!(err.to_string(), "Insufficient stock (available: 3, requested: 5)");
        assert_eq!(it.quantity(), 3);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn overflowing_movements_are_rejected_before_any_write() {
        let (mut it, mut ledger) = (item(), Vec::new());
        commit(&mut it, &mut ledger, &add(10)).unwrap();

        let err = commit(&mut it, &mut ledger, &add(i64::MAX)).unwrap_err();
        assert_eq!(err.field(), Some("quantity"));
        assert_eq!(err.to_string(), "Quantity is too large.");

        let err = commit(
            &mut it,
            &mut ledger,
            &StockMovement::Apply {
                delta: i64::MIN,
                reason: Reason::Use,
                appointment_id: None,
                notes: None,
            },
        )
        .unwrap_err();
        assert_eq!(err.field(), Some("quantity"));

        assert_eq!(it.quantity(), 10);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn non_positive_quantities_are_validation_errors() {
        for movement in [add(0), add(-2), remove(0)] {
            let err = plan_movement(&item(), &movement).unwrap_err();
            assert_eq!(err.field(), Some("quantity"));
        }
        let err = plan_movement(
            &item(),
            &StockMovement::Adjust {
                new_quantity: -1,
                reason: None,
            },
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "New quantity cannot be negative.");
    }

    #[test]
    fn zero_adjustment_writes_nothing() {
        let (mut it, mut ledger) = (item(), Vec::new());
        commit(&mut it, &mut ledger, &add(4)).unwrap();
        let decision = commit(
            &mut it,
            &mut ledger,
            &StockMovement::Adjust {
                new_quantity: 4,
                reason: Some("count".into()),
            },
        )
        .unwrap();
        assert_eq!(decision, LedgerDecision::NoChange);
        assert_eq!(ledger.len(), 1);
        assert_eq!(it.quantity(), 4);
    }

    #[test]
    fn adjustment_records_difference_and_note() {
        let (mut it, mut ledger) = (item(), Vec::new());
        commit(&mut it, &mut ledger, &add(3)).unwrap();
        commit(
            &mut it,
            &mut ledger,
            &StockMovement::Adjust {
                new_quantity: 10,
                reason: Some("cycle count".into()),
            },
        )
        .unwrap();
        let last = ledger.last().unwrap();
        assert_eq!(last.delta, 7);
        assert_eq!(last.reason, Reason::Adjustment);
        assert_eq!(
            last.notes.as_deref(),
            Some("Stock adjustment: 3 -> 10. Reason: cycle count")
        );
        assert_eq!(it.quantity(), 10);
    }

    #[test]
    fn verify_ledger_reports_drift() {
        let it = InventoryItem::restore(InventoryItemId::new(1), item().details, 9, at());
        let drift = verify_ledger(&it, &[]).unwrap();
        assert_eq!(drift.cached, 9);
        assert_eq!(drift.ledger, 0);
        assert!(verify_ledger(&item(), &[]).is_none());
    }

    fn movement() -> impl Strategy<Value = StockMovement> {
        prop_oneof![
            (-3i64..20).prop_map(add),
            (-3i64..20).prop_map(remove),
            (-3i64..30).prop_map(|q| StockMovement::Adjust {
                new_quantity: q,
                reason: None
            }),
            (-20i64..20).prop_map(|d| StockMovement::Apply {
                delta: d,
                reason: Reason::Other,
                appointment_id: None,
                notes: None
            }),
        ]
    }

    proptest! {
        #[test]
        fn quantity_always_equals_ledger_sum_and_never_goes_negative(
            movements in proptest::collection::vec(movement(), 0..60)
        ) {
            let (mut it, mut ledger) = (item(), Vec::new());
            for m in &movements {
                let before = (it.quantity(), ledger.len());
                if commit(&mut it, &mut ledger, m).is_err() {
                    prop_assert_eq!(before, (it.quantity(), ledger.len()));
                }
                prop_assert!(it.quantity() >= 0);
                prop_assert_eq!(it.quantity(), ledger_sum(&ledger));
            }
        }
    }
}
