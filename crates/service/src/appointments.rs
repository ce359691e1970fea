//! Appointment façade: booking, lifecycle transitions and calendar queries.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use tracing::instrument;

use clinic_core::{AppointmentId, Clock, DomainError, PatientId, TimeRange};
use clinic_infra::{AppointmentFilter, ClinicStore};
use clinic_scheduling::{
    Appointment, AppointmentCommand, AppointmentRequest, AppointmentStatus, SchedulingPolicy, Slot,
    find_conflicts,
};

use crate::outcome::{ServiceError, ServiceResult, Success};
use crate::traced;

/// Calendar counters for dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AppointmentStats {
    /// Every appointment dated today, whatever its status.
    pub today: usize,
    /// Still-scheduled appointments starting now or later.
    pub upcoming: usize,
}

pub struct AppointmentService {
    store: Arc<dyn ClinicStore>,
    clock: Arc<dyn Clock>,
    policy: SchedulingPolicy,
}

impl AppointmentService {
    pub fn new(store: Arc<dyn ClinicStore>, clock: Arc<dyn Clock>, policy: SchedulingPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> &SchedulingPolicy {
        &self.policy
    }

    /// Resolve and check a booking request against reference data and the clock.
    fn validate(&self, request: &AppointmentRequest) -> Result<Slot, ServiceError> {
        if self.store.get_patient(request.patient_id)?.is_none() {
            return Err(DomainError::not_found("Patient", request.patient_id).into());
        }
        let service = match request.service_id {
            Some(id) => self.store.get_service(id)?,
            None => None,
        };
        Ok(self.policy.validate(request, service.as_ref(), self.clock.now())?)
    }

    fn run(&self, command: AppointmentCommand) -> Result<Appointment, ServiceError> {
        Ok(self.store.execute(&command, self.clock.now())?)
    }

    #[instrument(
        skip(self, request),
        fields(patient_id = %request.patient_id, date = %request.date, time = %request.time)
    )]
    pub fn create(&self, request: AppointmentRequest) -> ServiceResult<Appointment> {
        traced("create_appointment", || {
            let slot = self.validate(&request)?;
            let appointment = self.run(AppointmentCommand::Schedule { slot, request })?;
            Ok(Success::with_message(appointment, "Appointment scheduled successfully."))
        })
    }

    /// Overwrite an appointment's booking fields, re-validated as a new
    /// booking. `status: None` keeps the current status.
    #[instrument(skip(self, request), fields(appointment_id = %id, date = %request.date, time = %request.time))]
    pub fn update(
        &self,
        id: AppointmentId,
        request: AppointmentRequest,
        status: Option<AppointmentStatus>,
    ) -> ServiceResult<Appointment> {
        traced("update_appointment", || {
            if self.store.get_appointment(id)?.is_none() {
                return Err(DomainError::not_found("Appointment", id).into());
            }
            let slot = self.validate(&request)?;
            let appointment = self.run(AppointmentCommand::Reschedule {
                id,
                slot,
                request,
                status,
            })?;
            Ok(Success::with_message(appointment, "Appointment updated successfully."))
        })
    }

    #[instrument(skip(self, reason), fields(appointment_id = %id))]
    pub fn cancel(&self, id: AppointmentId, reason: Option<String>) -> ServiceResult<Appointment> {
        traced("cancel_appointment", || {
            let appointment = self.run(AppointmentCommand::Cancel { id, reason })?;
            Ok(Success::with_message(appointment, "Appointment cancelled successfully."))
        })
    }

    #[instrument(skip(self, notes), fields(appointment_id = %id))]
    pub fn complete(&self, id: AppointmentId, notes: Option<String>) -> ServiceResult<Appointment> {
        traced("complete_appointment", || {
            let appointment = self.run(AppointmentCommand::Complete { id, notes })?;
            Ok(Success::with_message(appointment, "Appointment marked as completed."))
        })
    }

    #[instrument(skip(self, notes), fields(appointment_id = %id))]
    pub fn mark_no_show(&self, id: AppointmentId, notes: Option<String>) -> ServiceResult<Appointment> {
        traced("mark_no_show", || {
            let appointment = self.run(AppointmentCommand::MarkNoShow { id, notes })?;
            Ok(Success::with_message(appointment, "Appointment marked as no-show."))
        })
    }

    #[instrument(skip(self), fields(appointment_id = %id))]
    pub fn delete(&self, id: AppointmentId) -> ServiceResult<()> {
        traced("delete_appointment", || {
            self.store.delete_appointment(id)?;
            Ok(Success::with_message((), "Appointment deleted successfully."))
        })
    }

    /// Every appointment that would block `[start, start + duration)` on
    /// `date`, ordered by start time. `exclude` ignores one appointment.
    pub fn find_conflicts(
        &self,
        date: NaiveDate,
        start: NaiveTime,
        duration_minutes: u32,
        exclude: Option<AppointmentId>,
    ) -> ServiceResult<Vec<Appointment>> {
        traced("find_conflicts", || {
            let proposed = TimeRange::starting_at(start, duration_minutes).ok_or_else(|| {
                DomainError::validation("duration", "Appointment must end on the same day.")
            })?;
            let day = self.store.list_appointments(AppointmentFilter::OnDate(date))?;
            let conflicts = find_conflicts(&day, date, proposed, exclude)
                .into_iter()
                .cloned()
                .collect();
            Ok(Success::new(conflicts))
        })
    }

    pub fn get(&self, id: AppointmentId) -> ServiceResult<Appointment> {
        traced("get_appointment", || {
            self.store
                .get_appointment(id)?
                .map(Success::new)
                .ok_or_else(|| DomainError::not_found("Appointment", id).into())
        })
    }

    fn list(&self, operation: &'static str, filter: AppointmentFilter) -> ServiceResult<Vec<Appointment>> {
        traced(operation, || Ok(Success::new(self.store.list_appointments(filter)?)))
    }

    pub fn list_all(&self) -> ServiceResult<Vec<Appointment>> {
        self.list("list_appointments", AppointmentFilter::All)
    }

    pub fn list_today(&self) -> ServiceResult<Vec<Appointment>> {
        self.list("list_today", AppointmentFilter::OnDate(self.clock.today()))
    }

    pub fn list_on(&self, date: NaiveDate) -> ServiceResult<Vec<Appointment>> {
        self.list("list_on_date", AppointmentFilter::OnDate(date))
    }

    pub fn list_for_patient(&self, patient_id: PatientId) -> ServiceResult<Vec<Appointment>> {
        self.list("list_for_patient", AppointmentFilter::ForPatient(patient_id))
    }

    /// Appointments dated `from..=to`.
    pub fn list_between(&self, from: NaiveDate, to: NaiveDate) -> ServiceResult<Vec<Appointment>> {
        if from > to {
            return Err(DomainError::validation("date", "Start date must not be after end date.").into());
        }
        self.list("list_between", AppointmentFilter::Between(from, to))
    }

    pub fn stats(&self) -> ServiceResult<AppointmentStats> {
        traced("appointment_stats", || {
            let now = self.clock.now();
            let all = self.store.list_appointments(AppointmentFilter::All)?;
            let stats = AppointmentStats {
                today: all.iter().filter(|a| a.is_today(now)).count(),
                upcoming: all.iter().filter(|a| a.is_upcoming(now)).count(),
            };
            Ok(Success::new(stats))
        })
    }
}
