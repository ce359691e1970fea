//! `clinic-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the domain error model, and wall-clock/interval arithmetic.

pub mod entity;
pub mod error;
pub mod id;
pub mod time;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{AppointmentId, InventoryItemId, PatientId, ServiceId, TransactionId};
pub use time::{Clock, FixedClock, SystemClock, TimeRange};
pub use value_object::ValueObject;
