//! Persistence boundary for the calendar, the stock ledger and reference data.
//!
//! The traits are backend-agnostic: [`InMemoryClinicStore`] for tests and
//! single-process use, [`PostgresClinicStore`] for shared deployments. Both
//! run each write as one atomic read-decide-write unit of work, serialized
//! per calendar date or per inventory item.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryClinicStore;
pub use postgres::{PostgresClinicStore, PostgresSettings};
pub use r#trait::{
    AppointmentFilter, AppointmentStore, CatalogStore, ClinicStore, InventoryStore, MovementOutcome,
    NewServiceOffering, StoreError, StoreResult, WriteError, WriteResult,
};
