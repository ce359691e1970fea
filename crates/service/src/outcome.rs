//! The one result contract shared by every façade operation.
//!
//! Business rejections and infrastructure failures are both values. Callers
//! tell them apart with [`ServiceError::kind`] / [`ServiceError::is_retryable`],
//! show [`ServiceError`]'s `Display` text to users, and branch on the stable
//! [`ServiceError::code`].

use serde::{Serialize, Serializer};
use thiserror::Error;

use clinic_core::DomainError;
use clinic_infra::{StoreError, WriteError};

/// A successful operation: its data plus an optional user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Success<T> {
    pub data: T,
    pub message: Option<String>,
}

impl<T> Success<T> {
    pub fn new(data: T) -> Self {
        Self { data, message: None }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: Some(message.into()),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Success<U> {
        Success {
            data: f(self.data),
            message: self.message,
        }
    }
}

pub type ServiceResult<T> = Result<Success<T>, ServiceError>;

/// Failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    SchedulingConflict,
    InsufficientStock,
    HasHistory,
    InvalidTransition,
    Infrastructure,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Deterministic business rejection. Never worth retrying.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Storage/runtime failure. Nothing was written; the caller may retry.
    #[error("Storage error: {0}")]
    Infrastructure(#[from] StoreError),
}

impl From<WriteError> for ServiceError {
    fn from(value: WriteError) -> Self {
        match value {
            WriteError::Rejected(e) => ServiceError::Domain(e),
            WriteError::Store(e) => ServiceError::Infrastructure(e),
        }
    }
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Domain(e) => match e {
                DomainError::Validation { .. } | DomainError::InvalidId(_) => ErrorKind::Validation,
                DomainError::NotFound { .. } => ErrorKind::NotFound,
                DomainError::SchedulingConflict { .. } => ErrorKind::SchedulingConflict,
                DomainError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
                DomainError::HasHistory { .. } => ErrorKind::HasHistory,
                DomainError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            },
            ServiceError::Infrastructure(_) => ErrorKind::Infrastructure,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::SchedulingConflict => "SCHEDULING_CONFLICT",
            ErrorKind::InsufficientStock => "INSUFFICIENT_STOCK",
            ErrorKind::HasHistory => "HAS_HISTORY",
            ErrorKind::InvalidTransition => "INVALID_TRANSITION",
            ErrorKind::Infrastructure => "INFRASTRUCTURE_ERROR",
        }
    }

    /// The offending input field, for validation failures.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ServiceError::Domain(e) => e.field(),
            ServiceError::Infrastructure(_) => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Infrastructure
    }

    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            ServiceError::Domain(e) => Some(e),
            ServiceError::Infrastructure(_) => None,
        }
    }
}

#[derive(Serialize)]
struct ErrorPayload<'a> {
    kind: ErrorKind,
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'a str>,
    retryable: bool,
}

impl Serialize for ServiceError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ErrorPayload {
            kind: self.kind(),
            code: self.code(),
            message: self.to_string(),
            field: self.field(),
            retryable: self.is_retryable(),
        }
        .serialize(serializer)
    }
}
