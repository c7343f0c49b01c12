//! # Subscription Admin
//!
//! Manual corrections from the admin user-subscriptions screen: grants
//! without an order, end date and status edits, deletion.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use toolhub_core::{Actor, CoreError, ItemRef, Subscription, SubscriptionStatus};
use toolhub_db::repository::{catalog, subscription};
use toolhub_db::{Database, DbError};

use crate::clock::Clock;
use crate::error::{ServiceError, ServiceResult};
use crate::services::entitlement::EntitlementEngine;
use crate::services::require_admin;

#[derive(Debug, Clone)]
pub struct SubscriptionAdmin {
    db: Database,
    clock: Arc<dyn Clock>,
    entitlements: EntitlementEngine,
}

impl SubscriptionAdmin {
    pub fn new(db: Database, clock: Arc<dyn Clock>, entitlements: EntitlementEngine) -> Self {
        SubscriptionAdmin {
            db,
            clock,
            entitlements,
        }
    }

    /// Grants `item` to a user without an order.
    ///
    /// Without explicit days the grant lasts one billing period of the
    /// item, as the duration policy resolves it.
    pub async fn assign_subscription(
        &self,
        actor: &Actor,
        user_id: &str,
        item: ItemRef,
        duration_days: Option<i64>,
    ) -> ServiceResult<Subscription> {
        require_admin(actor)?;
        let now = self.clock.now();

        let mut tx = self.db.begin().await?;
        let found = catalog::find_item(&mut tx, &item)
            .await?
            .ok_or_else(|| CoreError::ItemNotFound {
                kind: item.kind,
                id: item.id.clone(),
            })?;
        let days = match duration_days {
            Some(days) => days,
            None => self.entitlements.policy().resolve_duration_days(&found, 1),
        };

        let sub = self
            .entitlements
            .grant_or_extend(&mut tx, user_id, &item, days, None, now)
            .await?;
        tx.commit().await?;

        info!(user_id = %user_id, item = %item, days, admin = %actor.user_id, "Subscription assigned");
        Ok(sub)
    }

    /// Overwrites the end date and status of a subscription.
    pub async fn update_subscription(
        &self,
        actor: &Actor,
        subscription_id: &str,
        end_date: DateTime<Utc>,
        status: SubscriptionStatus,
    ) -> ServiceResult<Subscription> {
        require_admin(actor)?;
        let now = self.clock.now();

        let mut tx = self.db.begin().await?;
        let mut sub = subscription::fetch_subscription(&mut tx, subscription_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Subscription", subscription_id))?;

        if end_date <= sub.start_date {
            return Err(ServiceError::validation("End date must be after start date"));
        }
        sub.end_date = end_date;
        sub.status = status;
        sub.updated_at = now;

        match subscription::update_subscription(&mut tx, &sub).await {
            Ok(_) => {}
            Err(DbError::UniqueViolation { .. }) => {
                return Err(ServiceError::validation(
                    "User already has an active subscription to this item",
                ))
            }
            Err(err) => return Err(err.into()),
        }
        tx.commit().await?;

        info!(
            subscription_id = %sub.id,
            end_date = %sub.end_date,
            status = ?sub.status,
            admin = %actor.user_id,
            "Subscription updated"
        );
        Ok(sub)
    }

    pub async fn delete_subscription(&self, actor: &Actor, subscription_id: &str) -> ServiceResult<()> {
        require_admin(actor)?;

        let mut tx = self.db.begin().await?;
        if !subscription::delete_subscription(&mut tx, subscription_id).await? {
            return Err(ServiceError::not_found("Subscription", subscription_id));
        }
        tx.commit().await?;

        info!(subscription_id = %subscription_id, admin = %actor.user_id, "Subscription deleted");
        Ok(())
    }

    /// A user's subscriptions, oldest first. Users may list their own.
    pub async fn list_user_subscriptions(
        &self,
        actor: &Actor,
        user_id: &str,
    ) -> ServiceResult<Vec<Subscription>> {
        if !actor.is_admin() && actor.user_id != user_id {
            return Err(ServiceError::forbidden("Cannot view another user's subscriptions"));
        }
        Ok(self.db.subscriptions().list_for_user(user_id).await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
