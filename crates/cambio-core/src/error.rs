//! # Error Types
//!
//! Domain-specific error types for cambio-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  cambio-core errors (this file)                                        │
//! │  ├── CoreError        - Ledger rule violations                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  cambio-db errors (separate crate)                                     │
//! │  └── DbError          - Storage failures, wraps CoreError              │
//! │                                                                         │
//! │  HTTP layer (outside this workspace)                                   │
//! │  └── maps ErrorKind → status code                                      │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ErrorKind → caller      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Error Kinds
//! | Kind           | Raised when                                            |
//! |----------------|--------------------------------------------------------|
//! | `Conflict`     | opening a register that already has an open session    |
//! | `InvalidState` | closing a closed session, recording on a closed one    |
//! | `NotFound`     | unknown id, soft-deleted register, or another tenant   |
//! | `Validation`   | malformed amount, currency, or identifier              |

use serde::Serialize;
use thiserror::Error;

// =============================================================================
// Error Kind
// =============================================================================

/// Caller-facing category of a failure.
///
/// The HTTP layer maps these onto status codes (409, 422, 404, 400, 500).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Conflict,
    InvalidState,
    NotFound,
    Validation,
    Internal,
}

// =============================================================================
// Core Error
// =============================================================================

/// Ledger rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The register already has an open session.
    ///
    /// ## User Workflow
    /// ```text
    /// Cashier B: open(register R)
    ///      │
    ///      ▼
    /// Cashier A still holds R (status = open)
    ///      │
    ///      ▼
    /// RegisterBusy { register_id: R }
    ///      │
    ///      ▼
    /// UI: "Register already has an open session"
    /// ```
    #[error("Register {register_id} already has an open session")]
    RegisterBusy { register_id: String },

    /// Close was called on a session that is already closed.
    #[error("Session {session_id} is already closed")]
    SessionAlreadyClosed { session_id: String },

    /// A movement was recorded against a closed session.
    ///
    /// Once a till is closed its theoretical balance must stop changing.
    #[error("Cannot record movement on closed session {session_id}")]
    MovementOnClosedSession { session_id: String },

    /// A register cannot be deactivated while a cashier is using it.
    #[error("Register {register_id} has an open session and cannot be deactivated")]
    RegisterHasOpenSession { register_id: String },

    /// Entity missing, soft-deleted, or owned by another tenant.
    ///
    /// Cross-tenant lookups deliberately produce this same error so that
    /// ids belonging to other tenants are indistinguishable from unknown ids.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Returns the caller-facing category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::RegisterBusy { .. } => ErrorKind::Conflict,
            CoreError::SessionAlreadyClosed { .. }
            | CoreError::MovementOnClosedSession { .. }
            | CoreError::RegisterHasOpenSession { .. } => ErrorKind::InvalidState,
            CoreError::NotFound { .. } => ErrorKind::NotFound,
            CoreError::Validation(_) => ErrorKind::Validation,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any database work starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Value must not be zero.
    #[error("{field} must not be zero")]
    MustNotBeZero { field: String },

    /// Invalid format (e.g. malformed amount, currency, or UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Two related inputs disagree (e.g. reversing onto another register).
    #[error("{field} does not match: {reason}")]
    Mismatch { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::RegisterBusy {
            register_id: "reg-1".to_string(),
        };
        assert_eq!(err.to_string(), "Register reg-1 already has an open session");

        let err = CoreError::MovementOnClosedSession {
            session_id: "s-1".to_string(),
        };
        assert_eq!(err.to_string(), "Cannot record movement on closed session s-1");

        let err = CoreError::not_found("Session", "s-9");
        assert_eq!(err.to_string(), "Session not found: s-9");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            CoreError::RegisterBusy {
                register_id: "r".into()
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            CoreError::SessionAlreadyClosed {
                session_id: "s".into()
            }
            .kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            CoreError::MovementOnClosedSession {
                session_id: "s".into()
            }
            .kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(CoreError::not_found("Register", "r").kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "currency".to_string(),
        };
        assert_eq!(validation_err.to_string(), "currency is required");

        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.kind(), ErrorKind::Validation);
    }
}
