//! Inventory façade over the in-memory store.

mod common;

use chrono::Duration;

use clinic_core::{Entity, InventoryItemId};
use clinic_inventory::{Category, Reason, StockStatus, TransactionKind};
use clinic_service::ErrorKind;

use common::*;

#[test]
fn removal_leaves_item_low_on_stock() {
    let clinic = clinic();
    let gloves = clinic
        .inventory()
        .create_item(new_item("Gloves", "boxes", 10, 5))
        .unwrap()
        .data;

    let removed = clinic
        .inventory()
        .remove_stock(gloves.id(), 7, Reason::Use, None, None)
        .unwrap();
    assert_eq!(removed.message.as_deref(), Some("Removed 7 boxes from Gloves"));
    assert_eq!(removed.data.quantity(), 3);
    assert_eq!(
        clinic.inventory().item_status(gloves.id()).unwrap().data,
        StockStatus::LowStock
    );
}

#[test]
fn oversell_is_rejected_and_writes_nothing() {
    let clinic = clinic();
    let gloves = clinic
        .inventory()
        .create_item(new_item("Gloves", "boxes", 3, 1))
        .unwrap()
        .data;

    let err = clinic
        .inventory()
        .remove_stock(gloves.id(), 5, Reason::Use, None, None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientStock);
    assert_eq!(err.to_string(), "Insufficient stock (available: 3, requested: 5)");

    assert_eq!(clinic.inventory().get_item(gloves.id()).unwrap().data.quantity(), 3);
    assert_eq!(clinic.inventory().item_history(gloves.id()).unwrap().data.len(), 1);
    assert!(clinic.inventory().audit_ledger().unwrap().data.is_empty());
}

#[test]
fn item_close_to_expiry_reports_expiring_soon() {
    let clinic = clinic();
    let mut input = new_item("Lidocaine", "vials", 20, 5);
    input.details.expiry_date = Some(today() + Duration::days(10));
    let item = clinic.inventory().create_item(input).unwrap().data;

    assert_eq!(
        clinic.inventory().item_status(item.id()).unwrap().data,
        StockStatus::ExpiringSoon
    );
    let soon = clinic.inventory().expiring_soon().unwrap().data;
    assert_eq!(soon.len(), 1);
    assert!(clinic.inventory().expired().unwrap().data.is_empty());
}

#[test]
fn item_with_history_cannot_be_deleted() {
    let clinic = clinic();
    let gauze = clinic
        .inventory()
        .create_item(new_item("Gauze", "pieces", 0, 5))
        .unwrap()
        .data;
    let added = clinic.inventory().add_stock(gauze.id(), 5, None, None).unwrap();
    assert_eq!(added.message.as_deref(), Some("Added 5 pieces to Gauze"));

    let err = clinic.inventory().delete_item(gauze.id()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HasHistory);
    assert_eq!(err.code(), "HAS_HISTORY");
    assert!(clinic.inventory().get_item(gauze.id()).is_ok());
}

#[test]
fn item_without_history_can_be_deleted() {
    let clinic = clinic();
    let gauze = clinic
        .inventory()
        .create_item(new_item("Gauze", "pieces", 0, 5))
        .unwrap()
        .data;

    clinic.inventory().delete_item(gauze.id()).unwrap();
    assert_eq!(
        clinic.inventory().get_item(gauze.id()).unwrap_err().to_string(),
        "Inventory item not found."
    );
}

#[test]
fn zero_adjustment_writes_nothing() {
    let clinic = clinic();
    let gloves = clinic
        .inventory()
        .create_item(new_item("Gloves", "boxes", 3, 5))
        .unwrap()
        .data;

    let adjusted = clinic
        .inventory()
        .adjust_stock(gloves.id(), 10, Some("cycle count".into()))
        .unwrap();
    assert_eq!(
        adjusted.message.as_deref(),
        Some("Adjusted Gloves quantity from 3 to 10")
    );
    assert_eq!(adjusted.data.quantity(), 10);

    let before = clinic.inventory().item_history(gloves.id()).unwrap().data;
    let again = clinic.inventory().adjust_stock(gloves.id(), 10, None).unwrap();
    assert_eq!(
        again.message.as_deref(),
        Some("No adjustment needed - quantity is already correct.")
    );
    assert_eq!(again.data, adjusted.data);
    assert_eq!(clinic.inventory().item_history(gloves.id()).unwrap().data, before);

    let last = before.last().unwrap();
    assert_eq!(last.kind(), TransactionKind::Adjust);
    assert_eq!(last.delta, 7);
}

#[test]
fn raw_transactions_are_described() {
    let clinic = clinic();
    let gloves = clinic
        .inventory()
        .create_item(new_item("Gloves", "boxes", 10, 5))
        .unwrap()
        .data;

    let entry = clinic
        .inventory()
        .apply_transaction(gloves.id(), -2, Reason::Expired, None, None)
        .unwrap();
    assert_eq!(entry.message.as_deref(), Some("Removed 2 boxes of Gloves (Expired)"));
    assert_eq!(entry.data.kind(), TransactionKind::Expired);

    let err = clinic
        .inventory()
        .apply_transaction(gloves.id(), 0, Reason::Other, None, None)
        .unwrap_err();
    assert_eq!(err.field(), Some("quantity"));
}

#[test]
fn non_positive_quantities_are_rejected() {
    let clinic = clinic();
    let gloves = clinic
        .inventory()
        .create_item(new_item("Gloves", "boxes", 10, 5))
        .unwrap()
        .data;

    let err = clinic.inventory().add_stock(gloves.id(), 0, None, None).unwrap_err();
    assert_eq!(err.to_string(), "Quantity to add must be greater than 0.");
    let err = clinic
        .inventory()
        .remove_stock(gloves.id(), -1, Reason::Use, None, None)
        .unwrap_err();
    assert_eq!(err.to_string(), "Quantity to remove must be greater than 0.");
    let err = clinic.inventory().adjust_stock(gloves.id(), -4, None).unwrap_err();
    assert_eq!(err.to_string(), "New quantity cannot be negative.");

    let err = clinic
        .inventory()
        .create_item(new_item("Masks", "boxes", -1, 5))
        .unwrap_err();
    assert_eq!(err.field(), Some("quantity"));
}

#[test]
fn movements_on_missing_items_are_not_found() {
    let clinic = clinic();
    let err = clinic
        .inventory()
        .add_stock(InventoryItemId::new(77), 1, None, None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(
        clinic.inventory().item_history(InventoryItemId::new(77)).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn create_validates_and_records_opening_stock() {
    let clinic = clinic();
    let err = clinic
        .inventory()
        .create_item(new_item(" G ", "boxes", 1, 1))
        .unwrap_err();
    assert_eq!(err.to_string(), "Item name must be at least 2 characters long.");

    let mut input = new_item("Bandages", "  ", 12, 2);
    input.details.expiry_date = Some(today() - Duration::days(1));
    assert_eq!(
        clinic.inventory().create_item(input.clone()).unwrap_err().field(),
        Some("expiry_date")
    );

    input.details.expiry_date = None;
    let created = clinic.inventory().create_item(input).unwrap();
    assert_eq!(created.message.as_deref(), Some("Item created successfully."));
    assert_eq!(created.data.unit(), "pieces");

    let history = clinic.inventory().item_history(created.data.id()).unwrap().data;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].delta, 12);
    assert_eq!(history[0].reason, Reason::Restock);
    assert_eq!(history[0].notes.as_deref(), Some("Initial stock"));
}

#[test]
fn updating_details_keeps_quantity() {
    let clinic = clinic();
    let gloves = clinic
        .inventory()
        .create_item(new_item("Gloves", "boxes", 10, 5))
        .unwrap()
        .data;

    let mut details = gloves.details.clone();
    details.name = "Nitrile Gloves".into();
    details.threshold = 20;
    let updated = clinic
        .inventory()
        .update_item_details(gloves.id(), details)
        .unwrap()
        .data;
    assert_eq!(updated.name(), "Nitrile Gloves");
    assert_eq!(updated.quantity(), 10);
    assert!(updated.is_low_stock());
}

#[test]
fn listing_search_and_stats() {
    let clinic = clinic();
    let mut gloves = new_item("Gloves", "boxes", 10, 5);
    gloves.details.supplier = Some("Henry Schein".into());
    clinic.inventory().create_item(gloves).unwrap();
    clinic.inventory().create_item(new_item("Gauze", "pieces", 2, 5)).unwrap();
    let mut drill = new_item("Drill Bits", "pieces", 0, 1);
    drill.details.category = Category::Instruments;
    clinic.inventory().create_item(drill).unwrap();

    let names = |items: Vec<clinic_inventory::InventoryItem>| -> Vec<String> {
        items.iter().map(|i| i.name().to_string()).collect()
    };

    assert_eq!(
        names(clinic.inventory().list_items().unwrap().data),
        vec!["Drill Bits", "Gauze", "Gloves"]
    );
    assert_eq!(names(clinic.inventory().search("schein").unwrap().data), vec!["Gloves"]);
    assert_eq!(names(clinic.inventory().search("  ").unwrap().data).len(), 3);
    assert_eq!(
        names(clinic.inventory().items_by_category(Category::Instruments).unwrap().data),
        vec!["Drill Bits"]
    );
    assert_eq!(
        names(clinic.inventory().low_stock().unwrap().data),
        vec!["Drill Bits", "Gauze"]
    );

    let stats = clinic.inventory().stats().unwrap().data;
    assert_eq!(stats.total_items, 3);
    assert_eq!(stats.low_stock_count, 2);
    assert_eq!(stats.out_of_stock_count, 1);
    assert_eq!(stats.total_value_cents, 12 * 250);
}

#[test]
fn recent_transactions_are_newest_first() {
    let clinic = clinic();
    let gloves = clinic
        .inventory()
        .create_item(new_item("Gloves", "boxes", 10, 5))
        .unwrap()
        .data;
    clinic.inventory().add_stock(gloves.id(), 1, None, None).unwrap();
    clinic
        .inventory()
        .remove_stock(gloves.id(), 2, Reason::PatientUse, None, None)
        .unwrap();

    let recent = clinic.inventory().recent_transactions(2).unwrap().data;
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].delta, -2);
    assert_eq!(recent[1].delta, 1);
}

#[test]
fn oversized_movements_are_rejected_and_store_stays_usable() {
    let clinic = clinic();
    let gloves = clinic
        .inventory()
        .create_item(new_item("Gloves", "boxes", 10, 5))
        .unwrap()
        .data;

    let err = clinic
        .inventory()
        .add_stock(gloves.id(), i64::MAX, None, None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.field(), Some("quantity"));

    let err = clinic
        .inventory()
        .apply_transaction(gloves.id(), i64::MIN, Reason::Use, None, None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(!err.is_retryable());

    assert_eq!(clinic.inventory().get_item(gloves.id()).unwrap().data.quantity(), 10);
    assert_eq!(clinic.inventory().list_items().unwrap().data.len(), 1);
    assert_eq!(clinic.inventory().item_history(gloves.id()).unwrap().data.len(), 1);
    assert!(clinic.inventory().audit_ledger().unwrap().data.is_empty());
}
