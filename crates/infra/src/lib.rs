//! Infrastructure layer: stores, locking, configuration.

pub mod config;
pub mod locks;
pub mod store;

pub use config::{ClinicConfig, InventoryConfig, SchedulingConfig, StoreConfig};
pub use store::{
    AppointmentFilter, AppointmentStore, CatalogStore, ClinicStore, InMemoryClinicStore,
    InventoryStore, MovementOutcome, NewServiceOffering, PostgresClinicStore, PostgresSettings,
    StoreError, StoreResult, WriteError, WriteResult,
};

use std::sync::Arc;

/// Open the store selected by `config`.
pub fn open_store(config: &StoreConfig) -> StoreResult<Arc<dyn ClinicStore>> {
    match config.postgres_settings() {
        None => Ok(Arc::new(InMemoryClinicStore::new())),
        Some(settings) => Ok(Arc::new(PostgresClinicStore::connect(&settings)?)),
    }
}
