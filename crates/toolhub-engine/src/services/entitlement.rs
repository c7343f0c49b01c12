//! # Entitlement Engine
//!
//! Turns approved order lines into subscription time, and takes it back
//! when an approval is reversed.
//!
//! ## Grant and Revoke
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  GRANT (order enters Approved, or admin assignment)                    │
//! │    active subscription for (user, item)?                               │
//! │      yes → end = max(end, now) + days                                  │
//! │      no  → new subscription [now, now + days]                          │
//! │    append grant row { order, item, days }                              │
//! │                                                                         │
//! │  REVOKE (order leaves Approved)                                        │
//! │    open grant row for (order, item)?                                   │
//! │      yes → end -= grant.days; expired if end <= now; mark revoked      │
//! │      no  → subscription last touched by this order?                    │
//! │              yes → end -= days recomputed from today's catalog         │
//! │              no  → warn, nothing to undo                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every function here runs on the caller's connection so it joins the
//! caller's transaction.

use chrono::{DateTime, Duration, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};

use toolhub_core::entitlement::{extend_end, shorten_end, DurationPolicy};
use toolhub_core::validation::validate_duration_days;
use toolhub_core::{ItemRef, Order, Subscription, SubscriptionGrant, SubscriptionStatus};
use toolhub_db::repository::{catalog, subscription};

use crate::error::ServiceResult;
use crate::services::new_id;

/// What a revoke actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeOutcome {
    /// Subtracted the days recorded in the grant ledger.
    Ledger { days: i64, expired: bool },
    /// No ledger entry; subtracted a duration recomputed from the catalog.
    Recomputed { days: i64, expired: bool },
    /// Nothing matched; no subscription was touched.
    NothingToRevoke,
}

#[derive(Debug, Clone)]
pub struct EntitlementEngine {
    policy: DurationPolicy,
}

impl EntitlementEngine {
    pub fn new(policy: DurationPolicy) -> Self {
        EntitlementEngine { policy }
    }

    pub fn policy(&self) -> &DurationPolicy {
        &self.policy
    }

    /// Extends the user's active subscription to `item` by `days`, or opens
    /// a new one, and records the grant.
    pub async fn grant_or_extend(
        &self,
        conn: &mut SqliteConnection,
        user_id: &str,
        item: &ItemRef,
        days: i64,
        order_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> ServiceResult<Subscription> {
        validate_duration_days("duration_days", days)?;

        let sub = match subscription::find_active(conn, user_id, item).await? {
            Some(mut sub) => {
                let previous_end = sub.end_date;
                sub.end_date = extend_end(sub.end_date, now, days);
                sub.updated_at = now;
                if let Some(order_id) = order_id {
                    sub.order_id = Some(order_id.to_string());
                }
                subscription::update_window(
                    conn,
                    &sub.id,
                    sub.end_date,
                    SubscriptionStatus::Active,
                    order_id,
                    now,
                )
                .await?;

                info!(
                    subscription_id = %sub.id,
                    user_id = %user_id,
                    item = %item,
                    days,
                    previous_end = %previous_end,
                    end_date = %sub.end_date,
                    "Subscription extended"
                );
                sub
            }
            None => {
                let sub = Subscription {
                    id: new_id(),
                    user_id: user_id.to_string(),
                    item_kind: item.kind,
                    item_id: item.id.clone(),
                    start_date: now,
                    end_date: now + Duration::days(days),
                    status: SubscriptionStatus::Active,
                    auto_renew: false,
                    order_id: order_id.map(str::to_string),
                    created_at: now,
                    updated_at: now,
                };
                subscription::insert_subscription(conn, &sub).await?;

                info!(
                    subscription_id = %sub.id,
                    user_id = %user_id,
                    item = %item,
                    days,
                    end_date = %sub.end_date,
                    "Subscription created"
                );
                sub
            }
        };

        let grant = SubscriptionGrant {
            id: new_id(),
            subscription_id: sub.id.clone(),
            order_id: order_id.map(str::to_string),
            item_kind: item.kind,
            item_id: item.id.clone(),
            duration_days: days,
            granted_at: now,
            revoked_at: None,
        };
        subscription::insert_grant(conn, &grant).await?;

        Ok(sub)
    }

    /// Grants every line of an order. Lines whose item has since been
    /// deleted are skipped.
    pub async fn grant_order(
        &self,
        conn: &mut SqliteConnection,
        order: &Order,
        now: DateTime<Utc>,
    ) -> ServiceResult<Vec<Subscription>> {
        let mut granted = Vec::with_capacity(order.lines.len());

        for line in &order.lines {
            let item = line.item();
            let Some(resolved) = catalog::find_item(conn, &item).await? else {
                warn!(
                    order_id = %order.id,
                    item = %item,
                    "Item no longer in catalog, skipping grant"
                );
                continue;
            };

            let days = self.policy.resolve_duration_days(&resolved, line.period_count);
            let sub = self
                .grant_or_extend(conn, &order.user_id, &item, days, Some(&order.id), now)
                .await?;
            granted.push(sub);
        }

        Ok(granted)
    }

    /// Takes back what `order_id` granted for one item.
    pub async fn revoke(
        &self,
        conn: &mut SqliteConnection,
        user_id: &str,
        item: &ItemRef,
        period_count: i64,
        order_id: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<RevokeOutcome> {
        if let Some(grant) = subscription::find_open_grant(conn, order_id, item).await? {
            let outcome = match subscription::fetch_subscription(conn, &grant.subscription_id).await? {
                Some(sub) => {
                    let (days, expired) = self.shorten(conn, &sub, grant.duration_days, now).await?;
                    RevokeOutcome::Ledger { days, expired }
                }
                None => RevokeOutcome::NothingToRevoke,
            };
            subscription::mark_grant_revoked(conn, &grant.id, now).await?;

            info!(
                order_id = %order_id,
                item = %item,
                outcome = ?outcome,
                "Grant revoked"
            );
            return Ok(outcome);
        }

        let Some(sub) = subscription::find_by_order(conn, user_id, item, order_id).await? else {
            warn!(
                order_id = %order_id,
                user_id = %user_id,
                item = %item,
                "No grant or subscription found for order, nothing to revoke"
            );
            return Ok(RevokeOutcome::NothingToRevoke);
        };

        let Some(resolved) = catalog::find_item(conn, item).await? else {
            warn!(
                order_id = %order_id,
                item = %item,
                "Item no longer in catalog, cannot recompute grant length"
            );
            return Ok(RevokeOutcome::NothingToRevoke);
        };

        let days = self.policy.resolve_duration_days(&resolved, period_count);
        let (days, expired) = self.shorten(conn, &sub, days, now).await?;
        info!(
            order_id = %order_id,
            item = %item,
            days,
            expired,
            "Grant revoked from recomputed duration"
        );
        Ok(RevokeOutcome::Recomputed { days, expired })
    }

    /// Revokes every line of an order.
    pub async fn revoke_order(
        &self,
        conn: &mut SqliteConnection,
        order: &Order,
        now: DateTime<Utc>,
    ) -> ServiceResult<Vec<RevokeOutcome>> {
        let mut outcomes = Vec::with_capacity(order.lines.len());
        for line in &order.lines {
            let outcome = self
                .revoke(conn, &order.user_id, &line.item(), line.period_count, &order.id, now)
                .await?;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    async fn shorten(
        &self,
        conn: &mut SqliteConnection,
        sub: &Subscription,
        days: i64,
        now: DateTime<Utc>,
    ) -> ServiceResult<(i64, bool)> {
        let shortened = shorten_end(sub.end_date, days, now);
        let status = if shortened.expired {
            SubscriptionStatus::Expired
        } else {
            sub.status
        };

        debug!(
            subscription_id = %sub.id,
            days,
            end_date = %shortened.end_date,
            status = ?status,
            "Shortening subscription"
        );
        subscription::update_window(conn, &sub.id, shortened.end_date, status, None, now).await?;

        Ok((days, shortened.expired))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
