//! Appointment lifecycle: booking requests, validation policy and the
//! decisions a store runs inside its unit of work.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use clinic_core::time::{BusinessHours, is_weekday, relative_day_label};
use clinic_core::{
    AppointmentId, DomainError, DomainResult, Entity, PatientId, ServiceId, TimeRange,
};

use crate::catalog::ServiceOffering;
use crate::conflict::ensure_no_conflicts;

/// Appointment status.
///
/// `Scheduled` is the only non-terminal state. Terminal states can be
/// re-written to themselves (a second cancel is accepted) but never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 4] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::NoShow,
    ];

    /// Stable storage/wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "Scheduled",
            AppointmentStatus::Completed => "Completed",
            AppointmentStatus::Cancelled => "Cancelled",
            AppointmentStatus::NoShow => "No Show",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, AppointmentStatus::Scheduled)
    }

    /// Whether an appointment in this state holds its slot on the calendar.
    pub fn occupies_calendar(self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }

    pub fn can_transition_to(self, next: AppointmentStatus) -> bool {
        match self {
            AppointmentStatus::Scheduled => true,
            terminal => terminal == next,
        }
    }

    pub fn transition_to(self, next: AppointmentStatus) -> DomainResult<AppointmentStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::InvalidTransition {
                from: self.display_name(),
                to: next.display_name(),
            })
        }
    }
}

impl core::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.display_name())
    }
}

impl core::str::FromStr for AppointmentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        AppointmentStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == normalized)
            .ok_or_else(|| {
                DomainError::validation(
                    "status",
                    "status must be one of: scheduled, completed, cancelled, no_show",
                )
            })
    }
}

/// A persisted appointment (snapshot as last committed).
///
/// Only the store creates these, from an [`AppointmentDraft`] accepted inside
/// a unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub patient_id: PatientId,
    pub service_id: Option<ServiceId>,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub duration_minutes: u32,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Entity for Appointment {
    type Id = AppointmentId;

    fn id(&self) -> AppointmentId {
        self.id
    }
}

impl Appointment {
    /// Occupied interval on `self.date`.
    pub fn range(&self) -> TimeRange {
        TimeRange::saturating(self.start, self.duration_minutes)
    }

    pub fn end_time(&self) -> NaiveTime {
        self.range().end()
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start)
    }

    pub fn is_today(&self, now: NaiveDateTime) -> bool {
        self.date == now.date()
    }

    pub fn is_past(&self, now: NaiveDateTime) -> bool {
        self.starts_at() < now
    }

    /// Still scheduled and not yet started.
    pub fn is_upcoming(&self, now: NaiveDateTime) -> bool {
        self.status == AppointmentStatus::Scheduled && !self.is_past(now)
    }

    pub fn relative_day(&self, today: NaiveDate) -> String {
        relative_day_label(self.date, today)
    }

    /// Start time as shown to users, e.g. "10:00 AM".
    pub fn formatted_time(&self) -> String {
        self.start.format("%-I:%M %p").to_string()
    }

    fn to_draft(&self) -> AppointmentDraft {
        AppointmentDraft {
            patient_id: self.patient_id,
            service_id: self.service_id,
            date: self.date,
            start: self.start,
            duration_minutes: self.duration_minutes,
            status: self.status,
            notes: self.notes.clone(),
        }
    }
}

/// The state an accepted command wants persisted. The store assigns ids and
/// timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentDraft {
    pub patient_id: PatientId,
    pub service_id: Option<ServiceId>,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub duration_minutes: u32,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
}

impl AppointmentDraft {
    /// Materialize as a persisted record.
    pub fn into_appointment(
        self,
        id: AppointmentId,
        created_at: NaiveDateTime,
        updated_at: NaiveDateTime,
    ) -> Appointment {
        Appointment {
            id,
            patient_id: self.patient_id,
            service_id: self.service_id,
            date: self.date,
            start: self.start,
            duration_minutes: self.duration_minutes,
            status: self.status,
            notes: self.notes,
            created_at,
            updated_at,
        }
    }
}

/// Raw booking input (create or reschedule).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentRequest {
    pub patient_id: PatientId,
    pub service_id: Option<ServiceId>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    /// Explicit length; falls back to the service default, then the policy default.
    pub duration_minutes: Option<u32>,
    pub notes: Option<String>,
}

/// A validated calendar slot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub date: NaiveDate,
    pub range: TimeRange,
}

impl Slot {
    pub fn start(&self) -> NaiveTime {
        self.range.start()
    }

    pub fn duration_minutes(&self) -> u32 {
        self.range.duration_minutes()
    }
}

/// Booking rules that are configuration rather than invariants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingPolicy {
    pub default_duration_minutes: u32,
    pub min_duration_minutes: u32,
    pub max_duration_minutes: u32,
    /// When set, start times outside these hours (and weekend dates) are rejected.
    pub business_hours: Option<BusinessHours>,
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        Self {
            default_duration_minutes: 30,
            min_duration_minutes: 5,
            max_duration_minutes: 480,
            business_hours: None,
        }
    }
}

impl SchedulingPolicy {
    /// Explicit value, else the service's default duration, else the policy default.
    pub fn resolve_duration(&self, explicit: Option<u32>, service: Option<&ServiceOffering>) -> u32 {
        explicit
            .or_else(|| service.map(|s| s.duration_minutes))
            .unwrap_or(self.default_duration_minutes)
    }

    /// Validate a booking request against `now` and resolve its slot.
    ///
    /// `service` must be the looked-up offering for `request.service_id`
    /// (`None` when the request names no service or the lookup found nothing).
    pub fn validate(
        &self,
        request: &AppointmentRequest,
        service: Option<&ServiceOffering>,
        now: NaiveDateTime,
    ) -> DomainResult<Slot> {
        if let Some(service_id) = request.service_id {
            match service {
                None => return Err(DomainError::not_found("Service", service_id)),
                Some(s) if !s.active => {
                    return Err(DomainError::validation(
                        "service",
                        "Selected service is not active.",
                    ));
                }
                Some(_) => {}
            }
        }

        let today = now.date();
        if request.date < today {
            return Err(DomainError::validation(
                "date",
                "Appointment date cannot be in the past.",
            ));
        }
        if request.date == today && truncate_to_minute(request.time) < truncate_to_minute(now.time()) {
            return Err(DomainError::validation(
                "time",
                "Appointment time cannot be in the past.",
            ));
        }

        let duration = self.resolve_duration(request.duration_minutes, service);
        if duration < self.min_duration_minutes || duration > self.max_duration_minutes {
            return Err(DomainError::validation(
                "duration",
                format!(
                    "Duration must be between {} minutes and {} hours.",
                    self.min_duration_minutes,
                    self.max_duration_minutes / 60
                ),
            ));
        }

        if let Some(hours) = &self.business_hours {
            if !is_weekday(request.date) {
                return Err(DomainError::validation(
                    "date",
                    "Appointments can only be booked on weekdays.",
                ));
            }
            if !hours.contains(request.time) {
                return Err(DomainError::validation(
                    "time",
                    format!(
                        "Appointment time must be within business hours ({} - {}).",
                        hours.open.format("%-I:%M %p"),
                        hours.close.format("%-I:%M %p")
                    ),
                ));
            }
        }

        let range = TimeRange::starting_at(request.time, duration).ok_or_else(|| {
            DomainError::validation("duration", "Appointment must end on the same day.")
        })?;

        Ok(Slot {
            date: request.date,
            range,
        })
    }
}

fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    time.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(time)
}

/// A lifecycle command, decided against the locked calendar state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppointmentCommand {
    Schedule {
        slot: Slot,
        request: AppointmentRequest,
    },
    Reschedule {
        id: AppointmentId,
        slot: Slot,
        request: AppointmentRequest,
        /// `None` keeps the current status.
        status: Option<AppointmentStatus>,
    },
    Cancel {
        id: AppointmentId,
        reason: Option<String>,
    },
    Complete {
        id: AppointmentId,
        notes: Option<String>,
    },
    MarkNoShow {
        id: AppointmentId,
        notes: Option<String>,
    },
}

impl AppointmentCommand {
    /// Appointment the command edits (`None` for a new booking).
    pub fn target(&self) -> Option<AppointmentId> {
        match self {
            AppointmentCommand::Schedule { .. } => None,
            AppointmentCommand::Reschedule { id, .. }
            | AppointmentCommand::Cancel { id, .. }
            | AppointmentCommand::Complete { id, .. }
            | AppointmentCommand::MarkNoShow { id, .. } => Some(*id),
        }
    }

    /// Calendar date whose occupancy the command must check, if any.
    pub fn slot(&self) -> Option<Slot> {
        match self {
            AppointmentCommand::Schedule { slot, .. }
            | AppointmentCommand::Reschedule { slot, .. } => Some(*slot),
            _ => None,
        }
    }

    /// Decide the record to persist.
    ///
    /// `existing` is the current state of the targeted appointment and
    /// `same_day` every appointment on the slot's date, both read inside the
    /// caller's unit of work. Pure: no IO, no clock.
    pub fn decide(
        &self,
        existing: Option<&Appointment>,
        same_day: &[Appointment],
    ) -> DomainResult<AppointmentDraft> {
        match self {
            AppointmentCommand::Schedule { slot, request } => {
                ensure_no_conflicts(same_day, slot.date, slot.range, None)?;
                Ok(AppointmentDraft {
                    patient_id: request.patient_id,
                    service_id: request.service_id,
                    date: slot.date,
                    start: slot.start(),
                    duration_minutes: slot.duration_minutes(),
                    status: AppointmentStatus::Scheduled,
                    notes: normalize_notes(request.notes.as_deref()),
                })
            }
            AppointmentCommand::Reschedule {
                id,
                slot,
                request,
                status,
            } => {
                let current = existing.ok_or_else(|| DomainError::not_found("Appointment", *id))?;
                let next = current.status.transition_to(status.unwrap_or(current.status))?;
                if next.occupies_calendar() {
                    ensure_no_conflicts(same_day, slot.date, slot.range, Some(*id))?;
                }
                Ok(AppointmentDraft {
                    patient_id: request.patient_id,
                    service_id: request.service_id,
                    date: slot.date,
                    start: slot.start(),
                    duration_minutes: slot.duration_minutes(),
                    status: next,
                    notes: normalize_notes(request.notes.as_deref()),
                })
            }
            AppointmentCommand::Cancel { id, reason } => {
                close(existing, *id, AppointmentStatus::Cancelled, reason.as_deref())
            }
            AppointmentCommand::Complete { id, notes } => {
                close(existing, *id, AppointmentStatus::Completed, notes.as_deref())
            }
            AppointmentCommand::MarkNoShow { id, notes } => {
                close(existing, *id, AppointmentStatus::NoShow, notes.as_deref())
            }
        }
    }
}

fn close(
    existing: Option<&Appointment>,
    id: AppointmentId,
    to: AppointmentStatus,
    notes: Option<&str>,
) -> DomainResult<AppointmentDraft> {
    let current = existing.ok_or_else(|| DomainError::not_found("Appointment", id))?;
    let mut draft = current.to_draft();
    draft.status = current.status.transition_to(to)?;
    if let Some(notes) = normalize_notes(notes) {
        draft.notes = Some(notes);
    }
    Ok(draft)
}

fn normalize_notes(notes: Option<&str>) -> Option<String> {
    notes
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}
