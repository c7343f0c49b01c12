//! # Validation Module
//!
//! Input validation shared by the catalog, coupon and checkout services.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller (dashboard, storefront)                               │
//! │  └── Form limits, immediate feedback                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Engine services                                              │
//! │  └── THIS MODULE: names, prices, codes, period counts                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  └── CHECK, UNIQUE and foreign key constraints                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use toolhub_core::validation::{normalize_coupon_code, validate_period_count};
//!
//! assert_eq!(normalize_coupon_code("  save20 ").unwrap(), "SAVE20");
//! assert!(validate_period_count(0, 36).is_err());
//! ```

use crate::error::ValidationError;
use crate::types::DiscountType;
use crate::{FULL_PERCENT_BPS, MAX_COUPON_CODE_LENGTH, MAX_NAME_LENGTH};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a tool or package name.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 60 characters
pub fn validate_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: MAX_NAME_LENGTH,
        });
    }

    Ok(())
}

/// Normalizes a coupon code (trim + uppercase) and validates it.
///
/// Codes are matched case-insensitively, so every code is stored and
/// looked up in this form.
///
/// ## Rules
/// - Must not be empty
/// - At most 32 characters
/// - Letters, digits, hyphens and underscores only
pub fn normalize_coupon_code(code: &str) -> ValidationResult<String> {
    let code = code.trim().to_uppercase();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "code".to_string(),
        });
    }

    if code.chars().count() > MAX_COUPON_CODE_LENGTH {
        return Err(ValidationError::TooLong {
            field: "code".to_string(),
            max: MAX_COUPON_CODE_LENGTH,
        });
    }

    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(code)
}

/// Lower-cases and trims an email for comparison against coupon rules.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a catalog price. Zero is allowed (free items).
pub fn validate_price_cents(price_cents: i64) -> ValidationResult<()> {
    if price_cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "price".to_string(),
        });
    }
    Ok(())
}

/// Validates the number of billing periods on a cart line.
///
/// ```rust
/// use toolhub_core::validation::validate_period_count;
///
/// assert!(validate_period_count(1, 36).is_ok());
/// assert!(validate_period_count(37, 36).is_err());
/// ```
pub fn validate_period_count(period_count: i64, max: i64) -> ValidationResult<()> {
    if period_count < 1 || period_count > max {
        return Err(ValidationError::OutOfRange {
            field: "period_count".to_string(),
            min: 1,
            max,
        });
    }
    Ok(())
}

/// Validates an explicit grant length in days.
pub fn validate_duration_days(field: &str, days: i64) -> ValidationResult<()> {
    if days <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a coupon discount value.
///
/// ## Rules
/// - Percentage: 1..=10000 basis points
/// - Flat: positive cents
pub fn validate_discount_value(discount_type: DiscountType, value: i64) -> ValidationResult<()> {
    match discount_type {
        DiscountType::Percentage if !(1..=FULL_PERCENT_BPS).contains(&value) => {
            Err(ValidationError::OutOfRange {
                field: "discount_value".to_string(),
                min: 1,
                max: FULL_PERCENT_BPS,
            })
        }
        DiscountType::Flat if value <= 0 => Err(ValidationError::MustBePositive {
            field: "discount_value".to_string(),
        }),
        _ => Ok(()),
    }
}

// =============================================================================
// ID Validators
// =============================================================================

/// Validates a UUID string.
pub fn validate_uuid(field: &str, value: &str) -> ValidationResult<()> {
    uuid::Uuid::parse_str(value).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
