//! # Coupon Evaluation
//!
//! Decides whether a coupon applies to a cart and how much it takes off.
//!
//! ## Check Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. status active, expiry in the future      → Inactive / Expired      │
//! │  2. used_count below usage_limit             → UsageLimitReached       │
//! │  3. user type (new / active / old)           → LoginRequired / ...Only │
//! │  4. specific emails                          → EmailNotEligible        │
//! │  5. minimum order value                      → MinimumOrderValue       │
//! │  6. specific packages (any line matches)     → NotApplicableToCart     │
//! │  7. specific tools (any line grants one)     → NotApplicableToCart     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! The first failing check is reported. Nothing here mutates the coupon;
//! consuming a use is the order service's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CouponRejection;
use crate::money::Money;
use crate::order::PricedCart;
use crate::types::{Actor, Coupon, CouponStatus, DiscountType, Subscription, UserType};
use crate::validation::normalize_email;

// =============================================================================
// Subscription History
// =============================================================================

/// What the coupon rules need to know about a user's past subscriptions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriptionHistory {
    /// Subscriptions ever held, in any status.
    pub total: usize,
    /// Subscriptions that are active with an end date after `now`.
    pub current: usize,
}

impl SubscriptionHistory {
    pub fn from_subscriptions(subscriptions: &[Subscription], now: DateTime<Utc>) -> Self {
        SubscriptionHistory {
            total: subscriptions.len(),
            current: subscriptions.iter().filter(|s| s.is_current(now)).count(),
        }
    }

    /// Which targeted user type this history falls under.
    pub fn user_type(&self) -> UserType {
        if self.total == 0 {
            UserType::New
        } else if self.current > 0 {
            UserType::Active
        } else {
            UserType::Old
        }
    }
}

/// True when evaluating `coupon` requires the caller's subscription history.
///
/// Lets the service skip a database read for coupons open to everyone.
pub fn needs_history(coupon: &Coupon) -> bool {
    coupon.rules.user_type != UserType::All
}

// =============================================================================
// Validation
// =============================================================================

/// Runs every eligibility check against a priced cart.
///
/// `history` is only consulted when the coupon targets a user type; pass
/// `SubscriptionHistory::default()` otherwise.
pub fn validate(
    coupon: &Coupon,
    actor: Option<&Actor>,
    history: &SubscriptionHistory,
    cart: &PricedCart,
    now: DateTime<Utc>,
) -> Result<(), CouponRejection> {
    if coupon.status != CouponStatus::Active {
        return Err(CouponRejection::Inactive);
    }
    if coupon.expires_at <= now {
        return Err(CouponRejection::Expired {
            expired_at: coupon.expires_at,
        });
    }

    if let Some(limit) = coupon.usage_limit {
        if coupon.used_count >= limit {
            return Err(CouponRejection::UsageLimitReached { limit });
        }
    }

    let rules = &coupon.rules;

    if rules.user_type != UserType::All {
        if actor.is_none() {
            return Err(CouponRejection::LoginRequired);
        }
        match (rules.user_type, history.user_type()) {
            (UserType::New, UserType::New)
            | (UserType::Active, UserType::Active)
            | (UserType::Old, UserType::Old) => {}
            (UserType::New, _) => return Err(CouponRejection::NewUsersOnly),
            (UserType::Active, _) => return Err(CouponRejection::ActiveSubscribersOnly),
            _ => return Err(CouponRejection::ReturningUsersOnly),
        }
    }

    if !rules.specific_emails.is_empty() {
        let actor = actor.ok_or(CouponRejection::LoginRequired)?;
        let allowed = actor
            .email
            .as_deref()
            .map(normalize_email)
            .map(|email| rules.specific_emails.contains(&email))
            .unwrap_or(false);
        if !allowed {
            return Err(CouponRejection::EmailNotEligible);
        }
    }

    let minimum = Money::from_cents(rules.min_order_cents);
    if minimum.is_positive() && cart.total < minimum {
        return Err(CouponRejection::MinimumOrderValue {
            required: minimum,
            actual: cart.total,
        });
    }

    if !rules.specific_packages.is_empty()
        && !cart
            .lines
            .iter()
            .any(|line| rules.specific_packages.contains(line.item.id()))
    {
        return Err(CouponRejection::NotApplicableToCart);
    }

    if !rules.specific_tools.is_empty()
        && !cart.lines.iter().any(|line| {
            line.item
                .granted_tools()
                .iter()
                .any(|tool_id| rules.specific_tools.contains(tool_id))
        })
    {
        return Err(CouponRejection::NotApplicableToCart);
    }

    Ok(())
}

// =============================================================================
// Discount
// =============================================================================

/// Discount the coupon takes off `cart_total`, never more than the total.
///
/// ```rust
/// # use toolhub_core::coupon::discount_for;
/// # use toolhub_core::{DiscountType, Money};
/// // 15% off $38.97 → 584.55 → $5.85
/// assert_eq!(discount_for(DiscountType::Percentage, 1500, Money::from_cents(3897)).cents(), 585);
/// // $50 flat on a $10 cart is capped
/// assert_eq!(discount_for(DiscountType::Flat, 5000, Money::from_cents(1000)).cents(), 1000);
/// ```
pub fn discount_for(discount_type: DiscountType, value: i64, cart_total: Money) -> Money {
    if !cart_total.is_positive() {
        return Money::zero();
    }
    let raw = match discount_type {
        DiscountType::Percentage => cart_total.percentage_bps(value),
        DiscountType::Flat => Money::from_cents(value),
    };
    raw.clamp(Money::zero(), cart_total)
}

pub fn compute_discount(coupon: &Coupon, cart_total: Money) -> Money {
    discount_for(coupon.discount_type, coupon.discount_value, cart_total)
}

/// Result of a successful coupon check, shown before checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CouponQuote {
    pub coupon_id: String,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub discount_cents: i64,
    pub cart_total_cents: i64,
}

impl CouponQuote {
    pub fn new(coupon: &Coupon, cart: &PricedCart) -> Self {
        CouponQuote {
            coupon_id: coupon.id.clone(),
            code: coupon.code.clone(),
            discount_type: coupon.discount_type,
            discount_value: coupon.discount_value,
            discount_cents: compute_discount(coupon, cart.total).cents(),
            cart_total_cents: cart.total.cents(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
