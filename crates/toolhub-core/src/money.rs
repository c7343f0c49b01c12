//! # Money Module
//!
//! Provides the `Money` type for prices, discounts and order totals.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Catalog prices, coupon discounts and order totals are all whole cents │
//! │                                                                         │
//! │    price 12.99 × 3 periods   = 3897 cents                              │
//! │    15% off 3897 cents        = 584.55 → 585 cents (half-up, once)      │
//! │    final                     = 3312 cents                               │
//! │                                                                         │
//! │  Rounding happens exactly once, on the cart total, never per line.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use toolhub_core::money::Money;
//!
//! let price = Money::from_cents(1299);
//! let total = price * 3_i64;
//! assert_eq!(total.cents(), 3897);
//! assert_eq!(total.percentage_bps(1500).cents(), 585);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::FULL_PERCENT_BPS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in cents.
///
/// ## Where Money is Used
/// ```text
/// Tool.price_cents / Package.price_cents
///        │
///        ▼
/// PricedLine.line_total = unit price × period count
///        │
///        ▼
/// PricedCart.total ──► coupon discount ──► Settlement.final_amount
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from whole currency units and cents.
    ///
    /// ```rust
    /// use toolhub_core::money::Money;
    ///
    /// assert_eq!(Money::from_major_minor(10, 99).cents(), 1099);
    /// assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    /// ```
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the whole-unit portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the cents portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the percentage of this amount given in basis points,
    /// rounded half-up to the nearest cent.
    ///
    /// 10000 bps is 100%. Used for percentage coupons, which are always
    /// applied to the whole cart total.
    ///
    /// ```rust
    /// use toolhub_core::money::Money;
    ///
    /// // 12.5% of $0.99 = 12.375 cents → 12 cents
    /// assert_eq!(Money::from_cents(99).percentage_bps(1250).cents(), 12);
    /// // 50% of $0.05 = 2.5 cents → 3 cents
    /// assert_eq!(Money::from_cents(5).percentage_bps(5000).cents(), 3);
    /// ```
    pub fn percentage_bps(&self, bps: i64) -> Money {
        // i128 so large carts at 100% cannot overflow the intermediate product
        let half = (FULL_PERCENT_BPS / 2) as i128;
        let cents = (self.0 as i128 * bps as i128 + half) / FULL_PERCENT_BPS as i128;
        Money::from_cents(cents as i64)
    }

    /// Multiplies a unit price by a number of billing periods, or `None` on
    /// overflow.
    #[inline]
    pub const fn checked_multiply_periods(&self, periods: i64) -> Option<Self> {
        match self.0.checked_mul(periods) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Adds two amounts, or `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Subtracts, flooring the result at zero.
    ///
    /// ```rust
    /// use toolhub_core::money::Money;
    ///
    /// let total = Money::from_cents(1000);
    /// assert_eq!(total.saturating_sub_floor_zero(Money::from_cents(1500)), Money::zero());
    /// ```
    pub fn saturating_sub_floor_zero(self, other: Money) -> Money {
        Money(self.0.saturating_sub(other.0).max(0))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-friendly display. The dashboard formats currency itself.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}${}.{:02}", sign, self.dollars().abs(), self.cents_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, periods: i64) -> Self {
        Money(self.0 * periods)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
