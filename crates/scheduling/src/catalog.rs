//! Reference data consulted by scheduling validation.
//!
//! Patients and services are maintained elsewhere (plain CRUD); this core only
//! needs to know that they exist, whether a service is bookable, and how long
//! it usually takes.

use serde::{Deserialize, Serialize};

use clinic_core::{Entity, PatientId, ServiceId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub id: PatientId,
    pub name: String,
}

impl Entity for Patient {
    type Id = PatientId;

    fn id(&self) -> PatientId {
        self.id
    }
}

/// A bookable clinic service (consultation, treatment, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceOffering {
    pub id: ServiceId,
    pub name: String,
    /// Default appointment length when the caller gives no explicit duration.
    pub duration_minutes: u32,
    /// Price in smallest currency unit (cents).
    pub price_cents: i64,
    pub active: bool,
}

impl Entity for ServiceOffering {
    type Id = ServiceId;

    fn id(&self) -> ServiceId {
        self.id
    }
}
