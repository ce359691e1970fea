//! Scheduling domain module.
//!
//! Appointment lifecycle and calendar conflict detection, implemented purely
//! as deterministic domain logic (no IO, no storage, no wall clock reads:
//! "now" is always passed in).

pub mod appointment;
pub mod catalog;
pub mod conflict;

pub use appointment::{
    Appointment, AppointmentCommand, AppointmentDraft, AppointmentRequest, AppointmentStatus,
    SchedulingPolicy, Slot,
};
pub use catalog::{Patient, ServiceOffering};
pub use conflict::{ensure_no_conflicts, find_conflicts};
