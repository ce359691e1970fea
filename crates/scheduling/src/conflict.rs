//! Calendar conflict detection.
//!
//! The practice keeps a single shared calendar: an appointment conflicts with
//! every other non-cancelled appointment on the same date whose `[start, end)`
//! interval overlaps its own, regardless of patient or service.

use chrono::NaiveDate;

use clinic_core::{AppointmentId, DomainError, DomainResult, TimeRange};

use crate::appointment::Appointment;

/// Every appointment in `appointments` that blocks `proposed` on `date`.
///
/// - cancelled appointments never conflict
/// - `exclude` drops one appointment from consideration (an appointment being
///   edited must not conflict with itself)
/// - the result is ordered by start time, then id
///
/// The input may contain appointments from other dates; they are ignored.
pub fn find_conflicts<'a>(
    appointments: &'a [Appointment],
    date: NaiveDate,
    proposed: TimeRange,
    exclude: Option<AppointmentId>,
) -> Vec<&'a Appointment> {
    let mut conflicts: Vec<&Appointment> = appointments
        .iter()
        .filter(|a| a.date == date)
        .filter(|a| a.status.occupies_calendar())
        .filter(|a| Some(a.id) != exclude)
        .filter(|a| a.range().overlaps(&proposed))
        .collect();
    conflicts.sort_by_key(|a| (a.start, a.id));
    conflicts
}

/// Reject `proposed` if [`find_conflicts`] returns anything.
///
/// Any conflict is a hard rejection; the error names the earliest one and
/// carries the ids of all of them.
pub fn ensure_no_conflicts(
    appointments: &[Appointment],
    date: NaiveDate,
    proposed: TimeRange,
    exclude: Option<AppointmentId>,
) -> DomainResult<()> {
    let conflicts = find_conflicts(appointments, date, proposed, exclude);
    match conflicts.first() {
        None => Ok(()),
        Some(first) => Err(DomainError::SchedulingConflict {
            first_start: first.start,
            conflicting: conflicts.iter().map(|a| a.id).collect(),
        }),
    }
}
