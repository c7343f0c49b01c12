//! # Access Resolver
//!
//! Answers "which tools can this user open, and until when".
//!
//! ```text
//! subscriptions(user) ──► expand each item through the catalog
//!                           tool    → [tool]
//!                           package → current members
//!                           deleted → skipped
//!                                 │
//!                                 ▼
//!                    core::access::merge_access ──► tool_id → AccessGrantView
//! ```
//! Admins bypass subscriptions and see every active tool as active.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{debug, warn};

use toolhub_core::access::{admin_view, merge_access};
use toolhub_core::{AccessGrantView, AccessStatus, Actor, ItemRef, ToolStatus, ToolWithAccess};
use toolhub_db::repository::catalog;
use toolhub_db::Database;

use crate::clock::Clock;
use crate::error::ServiceResult;

#[derive(Debug, Clone)]
pub struct AccessResolver {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl AccessResolver {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        AccessResolver { db, clock }
    }

    /// Per-tool access for the actor, keyed by tool id.
    pub async fn resolve_accessible_tools(
        &self,
        actor: &Actor,
    ) -> ServiceResult<BTreeMap<String, AccessGrantView>> {
        if actor.is_admin() {
            let tools = self.db.catalog().list_tools_by_status(ToolStatus::Active).await?;
            return Ok(tools.into_iter().map(|t| (t.id, admin_view())).collect());
        }

        let now = self.clock.now();
        let subscriptions = self.db.subscriptions().list_for_user(&actor.user_id).await?;

        // One catalog lookup per distinct item, then a pure merge
        let mut expansions: HashMap<ItemRef, Option<Vec<String>>> = HashMap::new();
        let mut conn = self.db.pool().acquire().await?;
        for subscription in &subscriptions {
            let item = subscription.item();
            if expansions.contains_key(&item) {
                continue;
            }
            let tools = catalog::find_item(&mut conn, &item)
                .await?
                .map(|found| found.granted_tools());
            if tools.is_none() {
                debug!(user_id = %actor.user_id, item = %item, "Subscribed item no longer exists");
            }
            expansions.insert(item, tools);
        }
        drop(conn);

        Ok(merge_access(
            &subscriptions,
            |item| expansions.get(item).cloned().flatten(),
            now,
        ))
    }

    /// Active tools the actor has any access history with, newest first.
    pub async fn get_user_accessible_tools(&self, actor: &Actor) -> ServiceResult<Vec<ToolWithAccess>> {
        let mut access = self.resolve_accessible_tools(actor).await?;
        let tools = self.db.catalog().list_tools_by_status(ToolStatus::Active).await?;

        Ok(tools
            .into_iter()
            .filter_map(|tool| {
                access
                    .remove(&tool.id)
                    .map(|access| ToolWithAccess { tool, access })
            })
            .collect())
    }

    /// Whether the actor may open `tool_id` right now.
    ///
    /// Fails closed: a lookup error is logged and denies access.
    pub async fn check_tool_access(&self, actor: &Actor, tool_id: &str) -> bool {
        if actor.is_admin() {
            return true;
        }

        match self.resolve_accessible_tools(actor).await {
            Ok(access) => access
                .get(tool_id)
                .map(|view| view.status == AccessStatus::Active)
                .unwrap_or(false),
            Err(err) => {
                warn!(user_id = %actor.user_id, tool_id = %tool_id, error = %err, "Access check failed");
                false
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use toolhub_core::{
        BillingInterval, Package, PackageStatus, Subscription, SubscriptionStatus, Tool, Visibility,
    };
    use toolhub_db::repository::subscription;
    use toolhub_db::DbConfig;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap()
    }

    fn tool(id: &str, status: ToolStatus, age_days: i64) -> Tool {
        Tool {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            category: String::new(),
            url: None,
            price_cents: 1000,
            interval: BillingInterval::Monthly,
            visibility: Visibility::Public,
            status,
            package_id: None,
            created_at: now() - Duration::days(age_days),
            updated_at: now(),
        }
    }

    fn sub(id: &str, item: ItemRef, end_offset_days: i64) -> Subscription {
        Subscription {
            id: id.to_string(),
            user_id: "u1".to_string(),
            item_kind: item.kind,
            item_id: item.id,
            start_date: now() - Duration::days(60),
            end_date: now() + Duration::days(end_offset_days),
            status: SubscriptionStatus::Active,
            auto_renew: false,
            order_id: None,
            created_at: now() - Duration::days(60),
            updated_at: now() - Duration::days(60),
        }
    }

    async fn setup() -> (Database, AccessResolver) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        catalog::insert_tool(&mut conn, &tool("t1", ToolStatus::Active, 3)).await.unwrap();
        catalog::insert_tool(&mut conn, &tool("t2", ToolStatus::Active, 2)).await.unwrap();
        catalog::insert_tool(&mut conn, &tool("t3", ToolStatus::Maintenance, 1)).await.unwrap();
        let bundle = Package {
            id: "p1".to_string(),
            name: "Bundle".to_string(),
            price_cents: 2500,
            interval: BillingInterval::Monthly,
            is_trial: false,
            trial_duration_days: None,
            visibility: Visibility::Public,
            status: PackageStatus::Active,
            features: Vec::new(),
            tool_ids: vec!["t1".to_string(), "t2".to_string(), "t3".to_string()],
            created_at: now(),
            updated_at: now(),
        };
        catalog::insert_package(&mut conn, &bundle).await.unwrap();
        drop(conn);

        let resolver = AccessResolver::new(db.clone(), Arc::new(FixedClock::new(now())));
        (db, resolver)
    }

    #[tokio::test]
    async fn test_admin_sees_active_tools() {
        let (_db, resolver) = setup().await;
        let admin = Actor::admin("a1");

        let access = resolver.resolve_accessible_tools(&admin).await.unwrap();
        assert_eq!(access.len(), 2);
        assert!(access.values().all(|v| v.expiry_date.is_none() && v.source.is_none()));
        assert!(resolver.check_tool_access(&admin, "anything").await);
    }

    #[tokio::test]
    async fn test_package_and_direct_grants_merge() {
        let (db, resolver) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();
        subscription::insert_subscription(&mut conn, &sub("s1", ItemRef::package("p1"), 10)).await.unwrap();
        subscription::insert_subscription(&mut conn, &sub("s2", ItemRef::tool("t1"), 40)).await.unwrap();
        drop(conn);

        let user = Actor::user("u1", "u1@example.com");
        let access = resolver.resolve_accessible_tools(&user).await.unwrap();

        assert_eq!(access["t1"].source, Some(ItemRef::tool("t1")));
        assert_eq!(access["t2"].source, Some(ItemRef::package("p1")));
        assert_eq!(access.len(), 3);

        // Maintenance tools keep their grant but leave the dashboard list
        let listed = resolver.get_user_accessible_tools(&user).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|t| t.tool.id.as_str()).collect();
        assert_eq!(ids, vec!["t2", "t1"]);
    }

    #[tokio::test]
    async fn test_expired_grant_denies_access() {
        let (db, resolver) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();
        subscription::insert_subscription(&mut conn, &sub("s1", ItemRef::tool("t2"), -1)).await.unwrap();
        subscription::insert_subscription(&mut conn, &sub("s2", ItemRef::package("gone"), 30)).await.unwrap();
        drop(conn);

        let user = Actor::user("u1", "u1@example.com");
        let access = resolver.resolve_accessible_tools(&user).await.unwrap();
        assert_eq!(access.len(), 1);
        assert_eq!(access["t2"].status, AccessStatus::Expired);

        assert!(!resolver.check_tool_access(&user, "t2").await);
        assert!(!resolver.check_tool_access(&user, "unknown").await);
    }
}
