//! `clinic-service`: the application façade.
//!
//! Every operation returns a [`ServiceResult`]: data plus an optional message
//! on success, a typed [`ServiceError`] otherwise. The store handle is opened
//! once by [`Clinic::open`], shared by both services, and closed by
//! [`Clinic::shutdown`].

pub mod appointments;
pub mod inventory;
pub mod outcome;

pub use appointments::{AppointmentService, AppointmentStats};
pub use inventory::{InventoryService, NewItem};
pub use outcome::{ErrorKind, ServiceError, ServiceResult, Success};

use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, error, info};

use clinic_core::{Clock, SystemClock};
use clinic_infra::{ClinicConfig, ClinicStore, open_store};

/// Run one façade operation and log how it ended.
pub(crate) fn traced<T>(
    operation: &'static str,
    run: impl FnOnce() -> ServiceResult<T>,
) -> ServiceResult<T> {
    let result = run();
    match &result {
        Ok(_) => debug!(operation, "completed"),
        Err(e) if e.is_retryable() => error!(operation, error = %e, "infrastructure failure"),
        Err(e) => info!(operation, code = e.code(), error = %e, "rejected"),
    }
    result
}

/// Both services over one shared store handle.
pub struct Clinic {
    store: Arc<dyn ClinicStore>,
    appointments: AppointmentService,
    inventory: InventoryService,
}

impl Clinic {
    /// Open the configured store and build the services on the system clock.
    pub fn open(config: &ClinicConfig) -> anyhow::Result<Self> {
        let store = open_store(&config.store).context("failed to open clinic store")?;
        info!(backend = store.backend(), "clinic store opened");
        Ok(Self::with_store(store, Arc::new(SystemClock), config))
    }

    /// Build the services over an existing store and clock.
    pub fn with_store(store: Arc<dyn ClinicStore>, clock: Arc<dyn Clock>, config: &ClinicConfig) -> Self {
        let appointments = AppointmentService::new(store.clone(), clock.clone(), config.scheduling.policy());
        let inventory = InventoryService::new(store.clone(), clock, config.inventory.expiring_soon_days);
        Self {
            store,
            appointments,
            inventory,
        }
    }

    pub fn appointments(&self) -> &AppointmentService {
        &self.appointments
    }

    pub fn inventory(&self) -> &InventoryService {
        &self.inventory
    }

    /// The underlying store, for reference data (patients, services).
    pub fn store(&self) -> &Arc<dyn ClinicStore> {
        &self.store
    }

    /// Close the store. Later calls through any clone of the handle fail
    /// with an infrastructure error.
    pub fn shutdown(self) -> Result<(), ServiceError> {
        self.store.close()?;
        info!(backend = self.store.backend(), "clinic store closed");
        Ok(())
    }
}
