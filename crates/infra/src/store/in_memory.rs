use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{NaiveDate, NaiveDateTime};
use tracing::debug;

use clinic_core::{
    AppointmentId, DomainError, Entity, InventoryItemId, PatientId, ServiceId, TransactionId,
};
use clinic_inventory::{
    InventoryItem, InventoryTransaction, ItemDetails, LedgerDecision, NewTransaction, StockMovement,
    plan_movement,
};
use clinic_scheduling::{Appointment, AppointmentCommand, Patient, ServiceOffering};

use super::r#trait::{
    AppointmentFilter, AppointmentStore, CatalogStore, ClinicStore, InventoryStore, MovementOutcome,
    NewServiceOffering, StoreError, StoreResult, WriteResult,
};
use crate::locks::KeyedLocks;

#[derive(Debug, Default)]
struct Stock {
    items: BTreeMap<InventoryItemId, InventoryItem>,
    ledger: Vec<InventoryTransaction>,
}

impl Stock {
    fn entries_for(&self, id: InventoryItemId) -> impl Iterator<Item = &InventoryTransaction> {
        self.ledger.iter().filter(move |e| e.item_id == id)
    }
}

#[derive(Debug, Default)]
struct Catalog {
    patients: BTreeMap<PatientId, Patient>,
    services: BTreeMap<ServiceId, ServiceOffering>,
}

#[derive(Debug)]
struct Sequence(AtomicI64);

impl Sequence {
    fn new() -> Self {
        Self(AtomicI64::new(1))
    }

    fn next(&self) -> i64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

/// In-process store.
///
/// Data lives behind `RwLock`s that are only held for the duration of a
/// copy-in or copy-out. Read-decide-write sequences are serialized by
/// [`KeyedLocks`]: one calendar date, or one item, at a time. A unit of work
/// stages its result and writes it in a single critical section, so a
/// rejected decision leaves nothing behind.
#[derive(Debug)]
pub struct InMemoryClinicStore {
    calendar: RwLock<BTreeMap<AppointmentId, Appointment>>,
    stock: RwLock<Stock>,
    catalog: RwLock<Catalog>,
    date_locks: KeyedLocks<NaiveDate>,
    item_locks: KeyedLocks<InventoryItemId>,
    appointment_ids: Sequence,
    item_ids: Sequence,
    transaction_ids: Sequence,
    patient_ids: Sequence,
    service_ids: Sequence,
    closed: AtomicBool,
}

impl Default for InMemoryClinicStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryClinicStore {
    pub fn new() -> Self {
        Self {
            calendar: RwLock::new(BTreeMap::new()),
            stock: RwLock::new(Stock::default()),
            catalog: RwLock::new(Catalog::default()),
            date_locks: KeyedLocks::new("calendar date"),
            item_locks: KeyedLocks::new("inventory item"),
            appointment_ids: Sequence::new(),
            item_ids: Sequence::new(),
            transaction_ids: Sequence::new(),
            patient_ids: Sequence::new(),
            service_ids: Sequence::new(),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Unavailable("store has been closed".to_string()));
        }
        Ok(())
    }

    fn calendar(&self) -> StoreResult<RwLockReadGuard<'_, BTreeMap<AppointmentId, Appointment>>> {
        self.ensure_open()?;
        self.calendar
            .read()
            .map_err(|_| StoreError::LockPoisoned("calendar"))
    }

    fn calendar_mut(&self) -> StoreResult<RwLockWriteGuard<'_, BTreeMap<AppointmentId, Appointment>>> {
        self.ensure_open()?;
        self.calendar
            .write()
            .map_err(|_| StoreError::LockPoisoned("calendar"))
    }

    fn stock(&self) -> StoreResult<RwLockReadGuard<'_, Stock>> {
        self.ensure_open()?;
        self.stock.read().map_err(|_| StoreError::LockPoisoned("stock"))
    }

    fn stock_mut(&self) -> StoreResult<RwLockWriteGuard<'_, Stock>> {
        self.ensure_open()?;
        self.stock.write().map_err(|_| StoreError::LockPoisoned("stock"))
    }

    fn catalog(&self) -> StoreResult<RwLockReadGuard<'_, Catalog>> {
        self.ensure_open()?;
        self.catalog.read().map_err(|_| StoreError::LockPoisoned("catalog"))
    }

    fn catalog_mut(&self) -> StoreResult<RwLockWriteGuard<'_, Catalog>> {
        self.ensure_open()?;
        self.catalog.write().map_err(|_| StoreError::LockPoisoned("catalog"))
    }

    fn current_date_of(&self, id: AppointmentId) -> StoreResult<Option<NaiveDate>> {
        Ok(self.calendar()?.get(&id).map(|a| a.date))
    }
}

impl AppointmentStore for InMemoryClinicStore {
    fn get_appointment(&self, id: AppointmentId) -> StoreResult<Option<Appointment>> {
        Ok(self.calendar()?.get(&id).cloned())
    }

    fn list_appointments(&self, filter: AppointmentFilter) -> StoreResult<Vec<Appointment>> {
        let mut found: Vec<Appointment> = self
            .calendar()?
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        found.sort_by_key(|a| (a.date, a.start, a.id));
        Ok(found)
    }

    fn execute(&self, command: &AppointmentCommand, at: NaiveDateTime) -> WriteResult<Appointment> {
        let slot_date = command.slot().map(|s| s.date);

        loop {
            // The target's date is read before locking; if another writer
            // moves it in between, the check below retries with fresh keys.
            let peeked = match command.target() {
                Some(id) => self.current_date_of(id)?,
                None => None,
            };
            let _guard = self.date_locks.lock_all(peeked.into_iter().chain(slot_date))?;

            let (existing, same_day) = {
                let calendar = self.calendar()?;
                let existing = command.target().and_then(|id| calendar.get(&id)).cloned();
                let same_day: Vec<Appointment> = match slot_date {
                    Some(date) => calendar.values().filter(|a| a.date == date).cloned().collect(),
                    None => Vec::new(),
                };
                (existing, same_day)
            };
            if existing.as_ref().map(|a| a.date) != peeked {
                debug!(target_id = ?command.target(), "appointment moved while locking; retrying");
                continue;
            }

            let draft = command.decide(existing.as_ref(), &same_day)?;
            let appointment = match existing {
                Some(current) => draft.into_appointment(current.id, current.created_at, at),
                None => draft.into_appointment(AppointmentId::new(self.appointment_ids.next()), at, at),
            };
            self.calendar_mut()?.insert(appointment.id, appointment.clone());
            return Ok(appointment);
        }
    }

    fn delete_appointment(&self, id: AppointmentId) -> WriteResult<()> {
        loop {
            let peeked = self
                .current_date_of(id)?
                .ok_or_else(|| DomainError::not_found("Appointment", id))?;
            let _guard = self.date_locks.lock(peeked)?;

            let mut calendar = self.calendar_mut()?;
            match calendar.get(&id).map(|a| a.date) {
                None => return Err(DomainError::not_found("Appointment", id).into()),
                Some(date) if date != peeked => continue,
                Some(_) => {
                    calendar.remove(&id);
                    return Ok(());
                }
            }
        }
    }
}

impl InventoryStore for InMemoryClinicStore {
    fn get_item(&self, id: InventoryItemId) -> StoreResult<Option<InventoryItem>> {
        Ok(self.stock()?.items.get(&id).cloned())
    }

    fn list_items(&self) -> StoreResult<Vec<InventoryItem>> {
        let mut items: Vec<InventoryItem> = self.stock()?.items.values().cloned().collect();
        items.sort_by(|a, b| {
            a.name()
                .to_lowercase()
                .cmp(&b.name().to_lowercase())
                .then(a.id().cmp(&b.id()))
        });
        Ok(items)
    }

    fn create_item(
        &self,
        details: ItemDetails,
        opening: Option<NewTransaction>,
        at: NaiveDateTime,
    ) -> StoreResult<InventoryItem> {
        let id = InventoryItemId::new(self.item_ids.next());
        let mut item = InventoryItem::new(id, details, at);
        let entry = opening.map(|new| self.materialize(id, new, at));
        if let Some(entry) = &entry {
            item.apply(entry);
        }

        let mut stock = self.stock_mut()?;
        stock.items.insert(id, item.clone());
        stock.ledger.extend(entry);
        Ok(item)
    }

    fn update_item_details(
        &self,
        id: InventoryItemId,
        details: ItemDetails,
        at: NaiveDateTime,
    ) -> WriteResult<InventoryItem> {
        let _guard = self.item_locks.lock(id)?;
        let mut stock = self.stock_mut()?;
        let item = stock
            .items
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("Inventory item", id))?;
        item.details = details;
        item.updated_at = at;
        Ok(item.clone())
    }

    fn apply_movement(
        &self,
        id: InventoryItemId,
        movement: &StockMovement,
        at: NaiveDateTime,
    ) -> WriteResult<MovementOutcome> {
        let _guard = self.item_locks.lock(id)?;

        let current = self
            .get_item(id)?
            .ok_or_else(|| DomainError::not_found("Inventory item", id))?;
        let previous_quantity = current.quantity();

        let new = match plan_movement(&current, movement)? {
            LedgerDecision::NoChange => {
                return Ok(MovementOutcome {
                    item: current,
                    previous_quantity,
                    transaction: None,
                });
            }
            LedgerDecision::Record(new) => new,
        };

        let entry = self.materialize(id, new, at);
        let mut stock = self.stock_mut()?;
        let item = stock.items.get_mut(&id).ok_or_else(|| {
            StoreError::Corrupted(format!("inventory item {id} vanished while locked"))
        })?;
        item.apply(&entry);
        let item = item.clone();
        stock.ledger.push(entry.clone());

        Ok(MovementOutcome {
            item,
            previous_quantity,
            transaction: Some(entry),
        })
    }

    fn delete_item(&self, id: InventoryItemId) -> WriteResult<()> {
        let _guard = self.item_locks.lock(id)?;
        let mut stock = self.stock_mut()?;
        if !stock.items.contains_key(&id) {
            return Err(DomainError::not_found("Inventory item", id).into());
        }
        let transactions = stock.entries_for(id).count() as u64;
        if transactions > 0 {
            return Err(DomainError::HasHistory { transactions }.into());
        }
        stock.items.remove(&id);
        Ok(())
    }

    fn item_transactions(&self, id: InventoryItemId) -> StoreResult<Vec<InventoryTransaction>> {
        Ok(self.stock()?.entries_for(id).cloned().collect())
    }

    fn recent_transactions(&self, limit: usize) -> StoreResult<Vec<InventoryTransaction>> {
        let mut entries = self.stock()?.ledger.clone();
        entries.sort_by(|a, b| (b.occurred_at, b.id).cmp(&(a.occurred_at, a.id)));
        entries.truncate(limit);
        Ok(entries)
    }

    fn ledger_snapshot(&self) -> StoreResult<Vec<(InventoryItem, Vec<InventoryTransaction>)>> {
        let stock = self.stock()?;
        Ok(stock
            .items
            .values()
            .map(|item| (item.clone(), stock.entries_for(item.id()).cloned().collect()))
            .collect())
    }
}

impl InMemoryClinicStore {
    fn materialize(&self, item_id: InventoryItemId, new: NewTransaction, at: NaiveDateTime) -> InventoryTransaction {
        InventoryTransaction {
            id: TransactionId::new(self.transaction_ids.next()),
            item_id,
            delta: new.delta,
            reason: new.reason,
            appointment_id: new.appointment_id,
            occurred_at: at,
            notes: new.notes,
        }
    }
}

impl CatalogStore for InMemoryClinicStore {
    fn get_patient(&self, id: PatientId) -> StoreResult<Option<Patient>> {
        Ok(self.catalog()?.patients.get(&id).cloned())
    }

    fn get_service(&self, id: ServiceId) -> StoreResult<Option<ServiceOffering>> {
        Ok(self.catalog()?.services.get(&id).cloned())
    }

    fn add_patient(&self, name: &str) -> StoreResult<Patient> {
        let patient = Patient {
            id: PatientId::new(self.patient_ids.next()),
            name: name.trim().to_string(),
        };
        self.catalog_mut()?.patients.insert(patient.id, patient.clone());
        Ok(patient)
    }

    fn add_service(&self, service: NewServiceOffering) -> StoreResult<ServiceOffering> {
        let offering = ServiceOffering {
            id: ServiceId::new(self.service_ids.next()),
            name: service.name,
            duration_minutes: service.duration_minutes,
            price_cents: service.price_cents,
            active: service.active,
        };
        self.catalog_mut()?.services.insert(offering.id, offering.clone());
        Ok(offering)
    }
}

impl ClinicStore for InMemoryClinicStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn close(&self) -> StoreResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
