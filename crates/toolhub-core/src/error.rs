//! # Error Types
//!
//! Domain-specific error types for toolhub-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  toolhub-core errors (this file)                                       │
//! │  ├── CoreError        - Checkout and catalog rule violations           │
//! │  ├── CouponRejection  - Why a coupon does not apply                    │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  toolhub-db errors (separate crate)                                    │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  toolhub-engine errors                                                 │
//! │  └── ServiceError     - { code, message } handed to callers            │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ServiceError → Dashboard          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::money::Money;
use crate::types::ItemKind;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations raised while pricing and settling orders.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A cart line points at an item that does not exist.
    ///
    /// ## When This Occurs
    /// - The item was deleted after the customer loaded the storefront
    /// - The client sent a stale or forged id
    #[error("{kind} not found: {id}")]
    ItemNotFound { kind: ItemKind, id: String },

    /// The item exists but is not currently sold.
    #[error("{kind} {id} is not available for purchase")]
    ItemNotPurchasable { kind: ItemKind, id: String },

    #[error("Cart is empty")]
    EmptyCart,

    /// Cart has exceeded the maximum allowed lines.
    #[error("Cart cannot have more than {max} lines")]
    CartTooLarge { max: usize },

    /// Payment proof is mandatory for paid orders.
    #[error("Payment proof is required for paid orders")]
    PaymentProofRequired,

    /// A cart total no longer fits in the money type.
    ///
    /// ## When This Occurs
    /// - An admin saved an extreme price and a customer bought many periods
    #[error("Order amount is too large")]
    AmountOverflow,

    /// Coupon was rejected.
    #[error(transparent)]
    Coupon(#[from] CouponRejection),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Coupon Rejection
// =============================================================================

/// The reason a coupon was not applied.
///
/// Variants are listed in the order the checks run; the first failing
/// check wins. Messages are shown to the customer as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum CouponRejection {
    #[error("Invalid coupon code")]
    NotFound,

    #[error("Coupon is inactive")]
    Inactive,

    #[error("Coupon has expired")]
    Expired { expired_at: DateTime<Utc> },

    #[error("Coupon usage limit reached")]
    UsageLimitReached { limit: i64 },

    #[error("Login required for this coupon")]
    LoginRequired,

    #[error("Coupon valid for new users only")]
    NewUsersOnly,

    #[error("Coupon valid for active subscribers only")]
    ActiveSubscribersOnly,

    #[error("Coupon valid for returning users only")]
    ReturningUsersOnly,

    #[error("Coupon not valid for this account")]
    EmailNotEligible,

    #[error("Minimum order value of {required} required")]
    MinimumOrderValue { required: Money, actual: Money },

    #[error("Coupon not applicable to items in cart")]
    NotApplicableToCart,
}

impl CouponRejection {
    /// Message suitable for the storefront coupon field.
    pub fn user_message(&self) -> String {
        self.to_string()
    }

    /// Stable machine-readable reason, used in logs and API payloads.
    pub fn reason_code(&self) -> &'static str {
        match self {
            CouponRejection::NotFound => "not_found",
            CouponRejection::Inactive => "inactive",
            CouponRejection::Expired { .. } => "expired",
            CouponRejection::UsageLimitReached { .. } => "usage_limit_reached",
            CouponRejection::LoginRequired => "login_required",
            CouponRejection::NewUsersOnly => "new_users_only",
            CouponRejection::ActiveSubscribersOnly => "active_subscribers_only",
            CouponRejection::ReturningUsersOnly => "returning_users_only",
            CouponRejection::EmailNotEligible => "email_not_eligible",
            CouponRejection::MinimumOrderValue { .. } => "minimum_order_value",
            CouponRejection::NotApplicableToCart => "not_applicable_to_cart",
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g., duplicate coupon code).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
