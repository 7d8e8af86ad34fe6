/**
 * Backend Error Types
 *
 * Every service operation returns `Result<T, BackendError>`. Variants are
 * grouped into a small set of kinds that clients can branch on:
 *
 * - `ValidationFailed` - malformed input, rejected before touching state
 * - `NotFound` - the referenced entity does not exist
 * - `Conflict` - duplicate SKU, overlapping shift, insufficient stock
 * - `Unauthorized` / `SessionExpired` - credential or session failures
 * - `Forbidden` - authenticated but not allowed
 * - `Internal` - persistence or transport failure
 *
 * Store failures are never returned verbatim. They are logged where they are
 * converted and replaced with a generic message.
 */

use std::fmt;

use axum::http::StatusCode;
use thiserror::Error;

use crate::backend::store::StoreError;
use crate::shared::models::ShiftSlot;
use crate::shared::SharedError;

/// Coarse error taxonomy exposed to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ValidationFailed,
    NotFound,
    Conflict,
    Unauthorized,
    SessionExpired,
    Forbidden,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ValidationFailed => "ValidationFailed",
            Self::NotFound => "NotFound",
            Self::Conflict => "Conflict",
            Self::Unauthorized => "Unauthorized",
            Self::SessionExpired => "SessionExpired",
            Self::Forbidden => "Forbidden",
            Self::Internal => "Internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shift input rejected by a business rule, one variant per rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftRejection {
    InvalidTimeFormat,
    SameStartAndEnd,
    InvalidDateFormat,
    EndDateBeforeStart,
    StartDateInPast,
    InvalidUserId,
    UserInactive,
}

impl ShiftRejection {
    /// Stable machine-readable reason
    pub fn code(self) -> &'static str {
        match self {
            Self::InvalidTimeFormat => "invalid_time_format",
            Self::SameStartAndEnd => "same_start_and_end",
            Self::InvalidDateFormat => "invalid_date_format",
            Self::EndDateBeforeStart => "end_date_before_start",
            Self::StartDateInPast => "start_date_in_past",
            Self::InvalidUserId => "invalid_user_id",
            Self::UserInactive => "user_inactive",
        }
    }
}

impl fmt::Display for ShiftRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::InvalidTimeFormat => "invalid time format, use HH:MM (e.g., 08:30, 17:59)",
            Self::SameStartAndEnd => "start time and end time cannot be the same",
            Self::InvalidDateFormat => "invalid date format, use YYYY-MM-DD",
            Self::EndDateBeforeStart => "end date cannot be before start date",
            Self::StartDateInPast => "start date cannot be in the past",
            Self::InvalidUserId => "invalid user ID format",
            Self::UserInactive => "cannot assign shift to inactive user",
        };
        f.write_str(message)
    }
}

/// Backend-specific error types
///
/// # Usage
///
/// ```rust
/// use inventory_ws::backend::error::{BackendError, ErrorKind};
///
/// let err = BackendError::not_found("product");
/// assert_eq!(err.kind(), ErrorKind::NotFound);
/// assert_eq!(err.to_string(), "product not found");
/// ```
#[derive(Debug, Error)]
pub enum BackendError {
    /// Input validation from the shared layer
    #[error(transparent)]
    SharedError(#[from] SharedError),

    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("SKU already exists: {sku}")]
    DuplicateSku { sku: String },

    #[error("email already exists: {email}")]
    DuplicateEmail { email: String },

    #[error("insufficient stock remaining: requested {requested}, available {available}")]
    InsufficientStock { requested: i32, available: i32 },

    /// The shift overlaps other shifts of the same user
    #[error("shift conflicts with existing schedule: {}", format_slots(.conflicts))]
    ShiftConflict { conflicts: Vec<ShiftSlot> },

    #[error("{0}")]
    ShiftRejected(ShiftRejection),

    #[error("{message}")]
    Unauthorized { message: String },

    #[error("session expired: {reason}")]
    SessionExpired { reason: String },

    #[error("{message}")]
    Forbidden { message: String },

    #[error("{message}")]
    Internal { message: String },
}

fn format_slots(slots: &[ShiftSlot]) -> String {
    slots
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl BackendError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SharedError(SharedError::validation(field, message))
    }

    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    pub fn session_expired(reason: impl Into<String>) -> Self {
        Self::SessionExpired {
            reason: reason.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Taxonomy bucket for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SharedError(SharedError::ValidationError { .. }) => ErrorKind::ValidationFailed,
            Self::SharedError(SharedError::SerializationError { .. }) => ErrorKind::Internal,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::DuplicateSku { .. }
            | Self::DuplicateEmail { .. }
            | Self::InsufficientStock { .. }
            | Self::ShiftConflict { .. } => ErrorKind::Conflict,
            Self::ShiftRejected(_) => ErrorKind::ValidationFailed,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::SessionExpired { .. } => ErrorKind::SessionExpired,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::ValidationFailed => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Unauthorized | ErrorKind::SessionExpired => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error message
    pub fn message(&self) -> String {
        match self {
            Self::SharedError(SharedError::ValidationError { field, message }) => {
                format!("{}: {}", field, message)
            }
            Self::SharedError(SharedError::SerializationError { .. }) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for BackendError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(entity) => Self::NotFound { entity },
            StoreError::UniqueViolation(what) => {
                tracing::warn!("[Store] Unique constraint violated on {}", what);
                Self::internal("conflicting write, please retry")
            }
            other => {
                tracing::error!("[Store] {}", other);
                Self::internal("internal server error")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(BackendError::validation("quantity", "must be > 0").kind(), ErrorKind::ValidationFailed);
        assert_eq!(BackendError::not_found("product").kind(), ErrorKind::NotFound);
        assert_eq!(BackendError::DuplicateSku { sku: "A".into() }.kind(), ErrorKind::Conflict);
        assert_eq!(
            BackendError::DuplicateEmail { email: "a@example.com".into() }.kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            BackendError::InsufficientStock { requested: 5, available: 1 }.kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            BackendError::ShiftRejected(ShiftRejection::StartDateInPast).kind(),
            ErrorKind::ValidationFailed
        );
        assert_eq!(BackendError::session_expired("idle").kind(), ErrorKind::SessionExpired);
        assert_eq!(BackendError::forbidden("no").kind(), ErrorKind::Forbidden);
    }

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(BackendError::validation("f", "m").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(BackendError::not_found("shift").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(BackendError::DuplicateSku { sku: "A".into() }.status_code(), StatusCode::CONFLICT);
        assert_eq!(BackendError::unauthorized("bad").status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(BackendError::session_expired("idle").status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(BackendError::forbidden("no").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(BackendError::internal("x").status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_store_error_is_hidden() {
        let err: BackendError = StoreError::Database("connection reset by peer".into()).into();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(!err.message().contains("connection reset"));

        let err: BackendError = StoreError::NotFound("user").into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_shift_conflict_message_lists_slots() {
        let day = NaiveDate::from_ymd_opt(2030, 5, 1).unwrap();
        let err = BackendError::ShiftConflict {
            conflicts: vec![ShiftSlot {
                start_time: "08:00".parse().unwrap(),
                end_time: "16:00".parse().unwrap(),
                start_date: day,
                end_date: day,
            }],
        };
        assert_eq!(
            err.message(),
            "shift conflicts with existing schedule: [08:00 - 16:00, 2030-05-01 to 2030-05-01]"
        );
    }

    #[test]
    fn test_from_shared_error() {
        let backend_error: BackendError = SharedError::validation("sku", "is required").into();
        assert!(matches!(backend_error, BackendError::SharedError(_)));
        assert_eq!(backend_error.message(), "sku: is required");
    }
}
