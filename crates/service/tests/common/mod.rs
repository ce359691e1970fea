//! Shared fixtures for façade integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};

use clinic_core::{FixedClock, PatientId};
use clinic_infra::{CatalogStore, ClinicConfig, InMemoryClinicStore, NewServiceOffering};
use clinic_inventory::{Category, ItemDetails};
use clinic_scheduling::{AppointmentRequest, ServiceOffering};
use clinic_service::{Clinic, NewItem};

/// Monday 2026-03-02, 08:00.
pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

pub fn tomorrow() -> NaiveDate {
    today().succ_opt().unwrap()
}

pub fn at(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

pub fn clinic() -> Clinic {
    clinic_observability::init_for_tests();
    let store = Arc::new(InMemoryClinicStore::new());
    let clock = Arc::new(FixedClock::at(today(), at(8, 0)));
    Clinic::with_store(store, clock, &ClinicConfig::default())
}

pub fn patient(clinic: &Clinic, name: &str) -> PatientId {
    clinic.store().add_patient(name).unwrap().id
}

pub fn service(clinic: &Clinic, name: &str, minutes: u32, active: bool) -> ServiceOffering {
    clinic
        .store()
        .add_service(NewServiceOffering {
            name: name.to_string(),
            duration_minutes: minutes,
            price_cents: 5_000,
            active,
        })
        .unwrap()
}

pub fn booking(patient_id: PatientId, date: NaiveDate, time: NaiveTime, minutes: u32) -> AppointmentRequest {
    AppointmentRequest {
        patient_id,
        service_id: None,
        date,
        time,
        duration_minutes: Some(minutes),
        notes: None,
    }
}

pub fn details(name: &str, unit: &str, threshold: i64) -> ItemDetails {
    ItemDetails {
        name: name.to_string(),
        category: Category::Supplies,
        unit: unit.to_string(),
        threshold,
        cost_per_unit_cents: 250,
        supplier: None,
        expiry_date: None,
        notes: None,
    }
}

pub fn new_item(name: &str, unit: &str, quantity: i64, threshold: i64) -> NewItem {
    NewItem {
        details: details(name, unit, threshold),
        initial_quantity: quantity,
    }
}
