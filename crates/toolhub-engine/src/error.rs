//! # Service Error Type
//!
//! Unified error type returned by every engine operation.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in ToolHub                                │
//! │                                                                         │
//! │  Service call                                                          │
//! │       │                                                                 │
//! │       ├── DbError ────────────┐  details logged, generic message       │
//! │       ├── CoreError ──────────┤                                         │
//! │       ├── ValidationError ────┼──► ServiceError { code, message }      │
//! │       └── CouponRejection ────┘                                         │
//! │                                                                         │
//! │  Caller:                                                               │
//! │    match err.code {                                                    │
//! │      ErrorCode::CouponRejected => show under the coupon field          │
//! │      ErrorCode::ValidationError => show on the form                    │
//! │      _ => generic failure                                              │
//! │    }                                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Serialization
//! ```json
//! { "code": "COUPON_REJECTED", "message": "Coupon has expired" }
//! ```

use serde::Serialize;
use thiserror::Error;
use tracing::error;

use toolhub_core::{CoreError, CouponRejection, ValidationError};
use toolhub_db::DbError;

/// Error returned from engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(rename_all = "camelCase")]
#[error("{message}")]
pub struct ServiceError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes for service responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found (404)
    NotFound,

    /// Input validation failed (400)
    ValidationError,

    /// Coupon does not apply (400)
    CouponRejected,

    /// Caller lacks the required role (403)
    Forbidden,

    /// Concurrent status change or disallowed transition (409)
    InvalidTransition,

    /// Database operation failed (500)
    DatabaseError,

    /// Internal error (500)
    Internal,
}

impl ServiceError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ServiceError {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        ServiceError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::new(ErrorCode::ValidationError, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ServiceError::new(ErrorCode::Forbidden, message)
    }

    pub fn invalid_transition(message: impl Into<String>) -> Self {
        ServiceError::new(ErrorCode::InvalidTransition, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ServiceError::new(ErrorCode::Internal, message)
    }
}

/// Converts database errors to service errors.
impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ServiceError::not_found(&entity, &id),
            DbError::UniqueViolation { field, .. } => {
                ServiceError::validation(format!("{} already exists", field))
            }
            DbError::ForeignKeyViolation { message } => {
                error!("Foreign key violation: {}", message);
                ServiceError::validation("Invalid reference")
            }
            DbError::ConnectionFailed(e) => {
                error!("Database connection failed: {}", e);
                ServiceError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(e) => {
                error!("Database migration failed: {}", e);
                ServiceError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                // Log the actual error but return a generic message
                error!("Database query failed: {}", e);
                ServiceError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::TransactionFailed(e) => {
                error!("Transaction failed: {}", e);
                ServiceError::new(ErrorCode::DatabaseError, "Database transaction failed")
            }
            DbError::PoolExhausted => {
                error!("Database pool exhausted");
                ServiceError::new(ErrorCode::DatabaseError, "Database pool exhausted")
            }
            DbError::Corrupt { column, reason } => {
                error!(column = %column, "Corrupt stored value: {}", reason);
                ServiceError::new(ErrorCode::DatabaseError, "Stored data could not be read")
            }
            DbError::Internal(e) => {
                error!("Internal database error: {}", e);
                ServiceError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

/// Transaction begin/commit goes straight through sqlx.
impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::from(DbError::from(err))
    }
}

/// Converts core errors to service errors.
impl From<CoreError> for ServiceError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ItemNotFound { kind, id } => ServiceError::new(
                ErrorCode::ValidationError,
                format!("{} not found: {}", kind, id),
            ),
            CoreError::Coupon(rejection) => rejection.into(),
            CoreError::Validation(e) => e.into(),
            other @ (CoreError::ItemNotPurchasable { .. }
            | CoreError::EmptyCart
            | CoreError::CartTooLarge { .. }
            | CoreError::PaymentProofRequired
            | CoreError::AmountOverflow) => {
                ServiceError::validation(other.to_string())
            }
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::validation(err.to_string())
    }
}

impl From<CouponRejection> for ServiceError {
    fn from(rejection: CouponRejection) -> Self {
        ServiceError::new(ErrorCode::CouponRejected, rejection.user_message())
    }
}

/// Result type for engine operations.
pub type ServiceResult<T> = Result<T, ServiceError>;
