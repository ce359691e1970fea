//! Domain error model.

use chrono::NaiveTime;
use thiserror::Error;

use crate::id::AppointmentId;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Infrastructure concerns belong elsewhere.
///
/// Display strings are meant to be shown to a clinic user verbatim.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Bad input, always attributable to one field.
    #[error("{message}")]
    Validation { field: &'static str, message: String },

    /// An identifier was malformed (parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A referenced appointment/item/patient/service does not exist.
    #[error("{entity} not found.")]
    NotFound { entity: &'static str, id: i64 },

    /// The proposed interval overlaps at least one non-cancelled appointment.
    ///
    /// `conflicting` lists every overlapping appointment, ordered by start time.
    #[error(
        "Appointment conflicts with existing appointment at {}",
        .first_start.format("%-I:%M %p")
    )]
    SchedulingConflict {
        first_start: NaiveTime,
        conflicting: Vec<AppointmentId>,
    },

    /// A removal would drive an item's quantity below zero.
    #[error("Insufficient stock (available: {available}, requested: {requested})")]
    InsufficientStock { available: i64, requested: i64 },

    /// Deletion refused because ledger entries reference the item.
    #[error(
        "Cannot delete item with transaction history ({transactions} entries). Consider marking it as inactive instead."
    )]
    HasHistory { transactions: u64 },

    /// A lifecycle transition that the state machine does not allow.
    #[error("Cannot change appointment status from {from} to {to}.")]
    InvalidTransition { from: &'static str, to: &'static str },
}

impl DomainError {
    pub fn validation(field: &'static str, msg: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: msg.into(),
        }
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl Into<i64>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// The offending input field, for validation failures.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_message_cites_first_start_time() {
        let err = DomainError::SchedulingConflict {
            first_start: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            conflicting: vec![AppointmentId::new(1)],
        };
        assert_eq!(
            err.to_string(),
            "Appointment conflicts with existing appointment at 10:00 AM"
        );
    }

    #[test]
    fn insufficient_stock_states_available_and_requested() {
        let err = DomainError::InsufficientStock {
            available: 3,
            requested: 5,
        };
        assert!(err.to_string().contains("available: 3, requested: 5"));
    }

    #[test]
    fn validation_keeps_field() {
        let err = DomainError::validation("duration", "Duration must be between 5 minutes and 8 hours.");
        assert_eq!(err.field(), Some("duration"));
        assert_eq!(err.to_string(), "Duration must be between 5 minutes and 8 hours.");
    }
}
