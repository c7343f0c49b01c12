//! # Entitlement Arithmetic
//!
//! How many days an item grants, and how subscription windows move when
//! grants are added or taken back.
//!
//! ## Duration Precedence (first match wins)
//! ```text
//! ┌──────────────────────────────────────────────┬──────────────────────────┐
//! │ trial with explicit days                     │ those days               │
//! │ lifetime interval                            │ 36500                    │
//! │ trial, or price 0                            │ 365                      │
//! │ yearly interval                              │ 365 × period_count       │
//! │ anything else (monthly)                      │ 30 × period_count        │
//! └──────────────────────────────────────────────┴──────────────────────────┘
//! ```
//! The day counts are configurable through [`DurationPolicy`].
//!
//! ## Window Arithmetic
//! ```text
//! extend:  end' = max(end, now) + days        (lapsed time is not back-paid)
//! shorten: end' = end - days; expired when end' <= now
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{BillingInterval, PurchasableItem};

/// Day counts used to turn an item and a period count into a grant length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationPolicy {
    pub lifetime_days: i64,
    pub free_or_trial_days: i64,
    pub days_per_month: i64,
    pub days_per_year: i64,
}

impl Default for DurationPolicy {
    fn default() -> Self {
        DurationPolicy {
            lifetime_days: 36_500,
            free_or_trial_days: 365,
            days_per_month: 30,
            days_per_year: 365,
        }
    }
}

impl DurationPolicy {
    /// Number of days a purchase of `item` for `period_count` periods grants.
    ///
    /// ```rust
    /// # use toolhub_core::entitlement::DurationPolicy;
    /// # use toolhub_core::*;
    /// # use chrono::Utc;
    /// let mut tool = Tool {
    ///     id: "t".into(), name: "t".into(), description: String::new(),
    ///     category: String::new(), url: None, price_cents: 1000,
    ///     interval: BillingInterval::Yearly, visibility: Visibility::Public,
    ///     status: ToolStatus::Active, package_id: None,
    ///     created_at: Utc::now(), updated_at: Utc::now(),
    /// };
    /// let policy = DurationPolicy::default();
    /// assert_eq!(policy.resolve_duration_days(&PurchasableItem::Tool(tool.clone()), 2), 730);
    /// tool.interval = BillingInterval::Monthly;
    /// assert_eq!(policy.resolve_duration_days(&PurchasableItem::Tool(tool), 3), 90);
    /// ```
    pub fn resolve_duration_days(&self, item: &PurchasableItem, period_count: i64) -> i64 {
        let periods = period_count.max(1);

        if item.is_trial() {
            if let Some(days) = item.trial_duration_days().filter(|d| *d > 0) {
                return days;
            }
        }

        match item.interval() {
            BillingInterval::Lifetime => self.lifetime_days,
            _ if item.is_trial() || item.price().is_zero() => self.free_or_trial_days,
            BillingInterval::Yearly => self.days_per_year * periods,
            BillingInterval::Monthly => self.days_per_month * periods,
        }
    }
}

/// End date after adding `days` to a window that may already have lapsed.
pub fn extend_end(current_end: DateTime<Utc>, now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    current_end.max(now) + Duration::days(days)
}

/// Result of taking days back from a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortened {
    pub end_date: DateTime<Utc>,
    /// The window no longer reaches past `now`.
    pub expired: bool,
}

pub fn shorten_end(end: DateTime<Utc>, days: i64, now: DateTime<Utc>) -> Shortened {
    let end_date = end - Duration::days(days);
    Shortened {
        end_date,
        expired: end_date <= now,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
