use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

use clinic_core::{AppointmentId, DomainError, InventoryItemId, PatientId, ServiceId};
use clinic_inventory::{InventoryItem, InventoryTransaction, ItemDetails, NewTransaction, StockMovement};
use clinic_scheduling::{Appointment, AppointmentCommand, Patient, ServiceOffering};

/// Infrastructure failure.
///
/// These are storage/runtime problems, as opposed to [`DomainError`]s which
/// are deterministic business rejections. They are the only retryable class.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store could not be reached (pool closed, no runtime, I/O).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A statement or commit failed inside a unit of work.
    #[error("transaction failed: {0}")]
    Transaction(String),

    /// Stored data could not be decoded into domain types.
    #[error("corrupted record: {0}")]
    Corrupted(String),

    /// A writer panicked while holding an in-process lock.
    #[error("lock poisoned: {0}")]
    LockPoisoned(&'static str),

    /// Schema setup failed.
    #[error("schema migration failed: {0}")]
    Migration(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure of a unit of work: either the decision rejected the write, or the
/// store failed. Either way nothing was written.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WriteError {
    #[error(transparent)]
    Rejected(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type WriteResult<T> = Result<T, WriteError>;

/// Which appointments to list. Results are ordered by date, start time, id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentFilter {
    All,
    OnDate(NaiveDate),
    ForPatient(PatientId),
    /// Inclusive on both ends.
    Between(NaiveDate, NaiveDate),
}

impl AppointmentFilter {
    pub fn matches(&self, appointment: &Appointment) -> bool {
        match *self {
            AppointmentFilter::All => true,
            AppointmentFilter::OnDate(date) => appointment.date == date,
            AppointmentFilter::ForPatient(patient) => appointment.patient_id == patient,
            AppointmentFilter::Between(from, to) => appointment.date >= from && appointment.date <= to,
        }
    }
}

/// Result of a committed (or no-op) stock movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementOutcome {
    /// Item state after the unit of work.
    pub item: InventoryItem,
    /// Quantity before the movement.
    pub previous_quantity: i64,
    /// The appended ledger entry; `None` when nothing needed writing.
    pub transaction: Option<InventoryTransaction>,
}

/// New service offering (reference data).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewServiceOffering {
    pub name: String,
    pub duration_minutes: u32,
    pub price_cents: i64,
    pub active: bool,
}

/// Calendar persistence.
///
/// Writes go through [`AppointmentStore::execute`], which runs the command's
/// decision inside one unit of work serialized per calendar date: every date
/// the command touches (the target's current date and the slot's date) is
/// locked before the calendar is read, and released after commit/rollback.
pub trait AppointmentStore: Send + Sync {
    fn get_appointment(&self, id: AppointmentId) -> StoreResult<Option<Appointment>>;

    fn list_appointments(&self, filter: AppointmentFilter) -> StoreResult<Vec<Appointment>>;

    /// Decide `command` against the locked calendar and persist the result.
    ///
    /// `at` becomes `updated_at` (and `created_at` for new bookings).
    fn execute(&self, command: &AppointmentCommand, at: NaiveDateTime) -> WriteResult<Appointment>;

    /// Remove an appointment. `NotFound` if absent.
    fn delete_appointment(&self, id: AppointmentId) -> WriteResult<()>;
}

/// Inventory persistence.
///
/// There is deliberately no way to write an item's quantity: it only moves
/// when a ledger entry is appended, inside the same unit of work.
pub trait InventoryStore: Send + Sync {
    fn get_item(&self, id: InventoryItemId) -> StoreResult<Option<InventoryItem>>;

    /// All items ordered by name.
    fn list_items(&self) -> StoreResult<Vec<InventoryItem>>;

    /// Insert an item and, if given, its opening ledger entry atomically.
    fn create_item(
        &self,
        details: ItemDetails,
        opening: Option<NewTransaction>,
        at: NaiveDateTime,
    ) -> StoreResult<InventoryItem>;

    /// Replace descriptive fields. Never touches quantity.
    fn update_item_details(
        &self,
        id: InventoryItemId,
        details: ItemDetails,
        at: NaiveDateTime,
    ) -> WriteResult<InventoryItem>;

    /// Plan `movement` against the locked item and append the entry.
    ///
    /// Concurrent movements on the same item are serialized.
    fn apply_movement(
        &self,
        id: InventoryItemId,
        movement: &StockMovement,
        at: NaiveDateTime,
    ) -> WriteResult<MovementOutcome>;

    /// Remove an item. `HasHistory` if any ledger entry references it.
    fn delete_item(&self, id: InventoryItemId) -> WriteResult<()>;

    /// One item's ledger, oldest first.
    fn item_transactions(&self, id: InventoryItemId) -> StoreResult<Vec<InventoryTransaction>>;

    /// Latest entries across all items, newest first.
    fn recent_transactions(&self, limit: usize) -> StoreResult<Vec<InventoryTransaction>>;

    /// Every item with its full ledger, read as one consistent snapshot.
    fn ledger_snapshot(&self) -> StoreResult<Vec<(InventoryItem, Vec<InventoryTransaction>)>>;
}

/// Patient and service reference data used by booking validation.
pub trait CatalogStore: Send + Sync {
    fn get_patient(&self, id: PatientId) -> StoreResult<Option<Patient>>;

    fn get_service(&self, id: ServiceId) -> StoreResult<Option<ServiceOffering>>;

    fn add_patient(&self, name: &str) -> StoreResult<Patient>;

    fn add_service(&self, service: NewServiceOffering) -> StoreResult<ServiceOffering>;
}

/// A complete store handle: opened at startup, injected, closed at shutdown.
pub trait ClinicStore: AppointmentStore + InventoryStore + CatalogStore {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// Release connections. Further calls fail with `Unavailable`.
    fn close(&self) -> StoreResult<()>;
}

impl<S> AppointmentStore for Arc<S>
where
    S: AppointmentStore + ?Sized,
{
    fn get_appointment(&self, id: AppointmentId) -> StoreResult<Option<Appointment>> {
        (**self).get_appointment(id)
    }

    fn list_appointments(&self, filter: AppointmentFilter) -> StoreResult<Vec<Appointment>> {
        (**self).list_appointments(filter)
    }

    fn execute(&self, command: &AppointmentCommand, at: NaiveDateTime) -> WriteResult<Appointment> {
        (**self).execute(command, at)
    }

    fn delete_appointment(&self, id: AppointmentId) -> WriteResult<()> {
        (**self).delete_appointment(id)
    }
}

impl<S> InventoryStore for Arc<S>
where
    S: InventoryStore + ?Sized,
{
    fn get_item(&self, id: InventoryItemId) -> StoreResult<Option<InventoryItem>> {
        (**self).get_item(id)
    }

    fn list_items(&self) -> StoreResult<Vec<InventoryItem>> {
        (**self).list_items()
    }

    fn create_item(
        &self,
        details: ItemDetails,
        opening: Option<NewTransaction>,
        at: NaiveDateTime,
    ) -> StoreResult<InventoryItem> {
        (**self).create_item(details, opening, at)
    }

    fn update_item_details(
        &self,
        id: InventoryItemId,
        details: ItemDetails,
        at: NaiveDateTime,
    ) -> WriteResult<InventoryItem> {
        (**self).update_item_details(id, details, at)
    }

    fn apply_movement(
        &self,
        id: InventoryItemId,
        movement: &StockMovement,
        at: NaiveDateTime,
    ) -> WriteResult<MovementOutcome> {
        (**self).apply_movement(id, movement, at)
    }

    fn delete_item(&self, id: InventoryItemId) -> WriteResult<()> {
        (**self).delete_item(id)
    }

    fn item_transactions(&self, id: InventoryItemId) -> StoreResult<Vec<InventoryTransaction>> {
        (**self).item_transactions(id)
    }

    fn recent_transactions(&self, limit: usize) -> StoreResult<Vec<InventoryTransaction>> {
        (**self).recent_transactions(limit)
    }

    fn ledger_snapshot(&self) -> StoreResult<Vec<(InventoryItem, Vec<InventoryTransaction>)>> {
        (**self).ledger_snapshot()
    }
}

impl<S> CatalogStore for Arc<S>
where
    S: CatalogStore + ?Sized,
{
    fn get_patient(&self, id: PatientId) -> StoreResult<Option<Patient>> {
        (**self).get_patient(id)
    }

    fn get_service(&self, id: ServiceId) -> StoreResult<Option<ServiceOffering>> {
        (**self).get_service(id)
    }

    fn add_patient(&self, name: &str) -> StoreResult<Patient> {
        (**self).add_patient(name)
    }

    fn add_service(&self, service: NewServiceOffering) -> StoreResult<ServiceOffering> {
        (**self).add_service(service)
    }
}

impl<S> ClinicStore for Arc<S>
where
    S: ClinicStore + ?Sized,
{
    fn backend(&self) -> &'static str {
        (**self).backend()
    }

    fn close(&self) -> StoreResult<()> {
        (**self).close()
    }
}
