//! # Subscription Repository
//!
//! Subscriptions and the grant ledger behind them.
//!
//! ## Tables
//! ```text
//! subscriptions                         subscription_grants
//! ┌──────────────────────────┐          ┌──────────────────────────────┐
//! │ user_id, item_kind,      │ 1      * │ subscription_id              │
//! │ item_id, start, end,     │◄─────────│ order_id (nullable)          │
//! │ status, order_id         │          │ duration_days                │
//! └──────────────────────────┘          │ revoked_at (nullable)        │
//!                                       └──────────────────────────────┘
//! ```
//! A grant row is written every time an order line adds days to a
//! subscription. Reversing the order marks the grant revoked and subtracts
//! exactly `duration_days`, even if later grants pushed the end date out.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use toolhub_core::{ItemRef, Subscription, SubscriptionGrant, SubscriptionStatus};

const SUBSCRIPTION_COLUMNS: &str = r#"
    id, user_id, item_kind, item_id, start_date, end_date, status,
    auto_renew, order_id, created_at, updated_at
"#;

const GRANT_COLUMNS: &str = r#"
    id, subscription_id, order_id, item_kind, item_id, duration_days,
    granted_at, revoked_at
"#;

/// Repository for subscription reads.
#[derive(Debug, Clone)]
pub struct SubscriptionRepository {
    pool: SqlitePool,
}

impl SubscriptionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SubscriptionRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Subscription>> {
        let mut conn = self.pool.acquire().await?;
        fetch_subscription(&mut conn, id).await
    }

    /// Every subscription a user holds, any status, oldest first.
    pub async fn list_for_user(&self, user_id: &str) -> DbResult<Vec<Subscription>> {
        let mut conn = self.pool.acquire().await?;
        list_for_user(&mut conn, user_id).await
    }

    /// Every subscription in the system, newest first.
    pub async fn list_all(&self) -> DbResult<Vec<Subscription>> {
        let sql = format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions ORDER BY created_at DESC, rowid DESC"
        );
        let subs = sqlx::query_as::<_, Subscription>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(subs)
    }

    pub async fn find_active(&self, user_id: &str, item: &ItemRef) -> DbResult<Option<Subscription>> {
        let mut conn = self.pool.acquire().await?;
        find_active(&mut conn, user_id, item).await
    }

    pub async fn grants_for_subscription(
        &self,
        subscription_id: &str,
    ) -> DbResult<Vec<SubscriptionGrant>> {
        let mut conn = self.pool.acquire().await?;
        list_grants(&mut conn, subscription_id).await
    }
}

// =============================================================================
// Subscriptions
// =============================================================================

pub async fn fetch_subscription(
    conn: &mut SqliteConnection,
    id: &str,
) -> DbResult<Option<Subscription>> {
    let sql = format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = ?1");
    let sub = sqlx::query_as::<_, Subscription>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(sub)
}

pub async fn list_for_user(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> DbResult<Vec<Subscription>> {
    let sql = format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE user_id = ?1 ORDER BY created_at, rowid"
    );
    let subs = sqlx::query_as::<_, Subscription>(&sql)
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(subs)
}

/// The single active subscription for (user, item), if any.
pub async fn find_active(
    conn: &mut SqliteConnection,
    user_id: &str,
    item: &ItemRef,
) -> DbResult<Option<Subscription>> {
    let sql = format!(
        r#"
        SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
        WHERE user_id = ?1 AND item_kind = ?2 AND item_id = ?3 AND status = 'active'
        "#
    );
    let sub = sqlx::query_as::<_, Subscription>(&sql)
        .bind(user_id)
        .bind(item.kind)
        .bind(&item.id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(sub)
}

/// The most recent subscription for (user, item) last touched by `order_id`.
pub async fn find_by_order(
    conn: &mut SqliteConnection,
    user_id: &str,
    item: &ItemRef,
    order_id: &str,
) -> DbResult<Option<Subscription>> {
    let sql = format!(
        r#"
        SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
        WHERE user_id = ?1 AND item_kind = ?2 AND item_id = ?3 AND order_id = ?4
        ORDER BY updated_at DESC, rowid DESC
        LIMIT 1
        "#
    );
    let sub = sqlx::query_as::<_, Subscription>(&sql)
        .bind(user_id)
        .bind(item.kind)
        .bind(&item.id)
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(sub)
}

pub async fn insert_subscription(conn: &mut SqliteConnection, sub: &Subscription) -> DbResult<()> {
    debug!(
        id = %sub.id,
        user_id = %sub.user_id,
        item = %sub.item(),
        end_date = %sub.end_date,
        "Inserting subscription"
    );

    sqlx::query(
        r#"
        INSERT INTO subscriptions (
            id, user_id, item_kind, item_id, start_date, end_date, status,
            auto_renew, order_id, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(&sub.id)
    .bind(&sub.user_id)
    .bind(sub.item_kind)
    .bind(&sub.item_id)
    .bind(sub.start_date)
    .bind(sub.end_date)
    .bind(sub.status)
    .bind(sub.auto_renew)
    .bind(&sub.order_id)
    .bind(sub.created_at)
    .bind(sub.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Moves a subscription's end date and status.
///
/// `order_id` replaces the stored order reference when given.
pub async fn update_window(
    conn: &mut SqliteConnection,
    id: &str,
    end_date: DateTime<Utc>,
    status: SubscriptionStatus,
    order_id: Option<&str>,
    now: DateTime<Utc>,
) -> DbResult<bool> {
    debug!(id = %id, end_date = %end_date, status = ?status, "Updating subscription window");

    let result = sqlx::query(
        r#"
        UPDATE subscriptions
        SET end_date = ?2,
            status = ?3,
            order_id = COALESCE(?4, order_id),
            updated_at = ?5
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .bind(end_date)
    .bind(status)
    .bind(order_id)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Overwrites every editable field of a subscription.
pub async fn update_subscription(conn: &mut SqliteConnection, sub: &Subscription) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE subscriptions
        SET start_date = ?2,
            end_date = ?3,
            status = ?4,
            auto_renew = ?5,
            updated_at = ?6
        WHERE id = ?1
        "#,
    )
    .bind(&sub.id)
    .bind(sub.start_date)
    .bind(sub.end_date)
    .bind(sub.status)
    .bind(sub.auto_renew)
    .bind(sub.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Deletes a subscription and, by cascade, its grant ledger.
pub async fn delete_subscription(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
    debug!(id = %id, "Deleting subscription");
    let result = sqlx::query("DELETE FROM subscriptions WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

// =============================================================================
// Grant Ledger
// =============================================================================

pub async fn insert_grant(conn: &mut SqliteConnection, grant: &SubscriptionGrant) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO subscription_grants (
            id, subscription_id, order_id, item_kind, item_id, duration_days,
            granted_at, revoked_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&grant.id)
    .bind(&grant.subscription_id)
    .bind(&grant.order_id)
    .bind(grant.item_kind)
    .bind(&grant.item_id)
    .bind(grant.duration_days)
    .bind(grant.granted_at)
    .bind(grant.revoked_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// The newest unrevoked grant an order made for an item.
pub async fn find_open_grant(
    conn: &mut SqliteConnection,
    order_id: &str,
    item: &ItemRef,
) -> DbResult<Option<SubscriptionGrant>> {
    let sql = format!(
        r#"
        SELECT {GRANT_COLUMNS} FROM subscription_grants
        WHERE order_id = ?1 AND item_kind = ?2 AND item_id = ?3 AND revoked_at IS NULL
        ORDER BY granted_at DESC, rowid DESC
        LIMIT 1
        "#
    );
    let grant = sqlx::query_as::<_, SubscriptionGrant>(&sql)
        .bind(order_id)
        .bind(item.kind)
        .bind(&item.id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(grant)
}

pub async fn mark_grant_revoked(
    conn: &mut SqliteConnection,
    grant_id: &str,
    now: DateTime<Utc>,
) -> DbResult<bool> {
    let result = sqlx::query(
        "UPDATE subscription_grants SET revoked_at = ?2 WHERE id = ?1 AND revoked_at IS NULL",
    )
    .bind(grant_id)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Ledger for one subscription, oldest first.
pub async fn list_grants(
    conn: &mut SqliteConnection,
    subscription_id: &str,
) -> DbResult<Vec<SubscriptionGrant>> {
    let sql = format!(
        "SELECT {GRANT_COLUMNS} FROM subscription_grants WHERE subscription_id = ?1 ORDER BY granted_at, rowid"
    );
    let grants = sqlx::query_as::<_, SubscriptionGrant>(&sql)
        .bind(subscription_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(grants)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig, DbError};
    use chrono::Duration;
    use toolhub_core::ItemKind;

    fn sub(id: &str, user_id: &str, item: &ItemRef, status: SubscriptionStatus) -> Subscription {
        let now = Utc::now();
        Subscription {
            id: id.to_string(),
            user_id: user_id.to_string(),
            item_kind: item.kind,
            item_id: item.id.clone(),
            start_date: now,
            end_date: now + Duration::days(30),
            status,
            auto_renew: false,
            order_id: Some("o1".to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    fn grant(id: &str, subscription_id: &str, item: &ItemRef, days: i64) -> SubscriptionGrant {
        SubscriptionGrant {
            id: id.to_string(),
            subscription_id: subscription_id.to_string(),
            order_id: Some("o1".to_string()),
            item_kind: item.kind,
            item_id: item.id.clone(),
            duration_days: days,
            granted_at: Utc::now(),
            revoked_at: None,
        }
    }

    #[tokio::test]
    async fn test_find_active_ignores_expired() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let item = ItemRef::package("p1");
        let mut conn = db.pool().acquire().await.unwrap();
        insert_subscription(&mut conn, &sub("s-old", "u1", &item, SubscriptionStatus::Expired))
            .await
            .unwrap();
        assert!(find_active(&mut conn, "u1", &item).await.unwrap().is_none());

        insert_subscription(&mut conn, &sub("s-new", "u1", &item, SubscriptionStatus::Active))
            .await
            .unwrap();
        let active = find_active(&mut conn, "u1", &item).await.unwrap().unwrap();
        assert_eq!(active.id, "s-new");
        assert_eq!(list_for_user(&mut conn, "u1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_second_active_row_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let item = ItemRef::tool("t1");
        let mut conn = db.pool().acquire().await.unwrap();
        insert_subscription(&mut conn, &sub("s1", "u1", &item, SubscriptionStatus::Active))
            .await
            .unwrap();

        let err = insert_subscription(&mut conn, &sub("s2", "u1", &item, SubscriptionStatus::Active))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        // Another user is unaffected
        insert_subscription(&mut conn, &sub("s3", "u2", &item, SubscriptionStatus::Active))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_window_keeps_order_when_none() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let item = ItemRef::package("p1");
        let mut conn = db.pool().acquire().await.unwrap();
        let original = sub("s1", "u1", &item, SubscriptionStatus::Active);
        insert_subscription(&mut conn, &original).await.unwrap();

        let new_end = original.end_date + Duration::days(30);
        assert!(update_window(&mut conn, "s1", new_end, SubscriptionStatus::Active, None, Utc::now())
            .await
            .unwrap());

        let stored = fetch_subscription(&mut conn, "s1").await.unwrap().unwrap();
        assert_eq!(stored.end_date, new_end);
        assert_eq!(stored.order_id.as_deref(), Some("o1"));

        update_window(&mut conn, "s1", new_end, SubscriptionStatus::Expired, Some("o2"), Utc::now())
            .await
            .unwrap();
        let stored = fetch_subscription(&mut conn, "s1").await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Expired);
        assert_eq!(stored.order_id.as_deref(), Some("o2"));
        assert!(find_by_order(&mut conn, "u1", &item, "o2").await.unwrap().is_some());
        assert!(find_by_order(&mut conn, "u1", &item, "o1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_grant_ledger() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let item = ItemRef::new(ItemKind::Package, "p1");
        let mut conn = db.pool().acquire().await.unwrap();
        insert_subscription(&mut conn, &sub("s1", "u1", &item, SubscriptionStatus::Active))
            .await
            .unwrap();
        insert_grant(&mut conn, &grant("g1", "s1", &item, 30)).await.unwrap();

        let open = find_open_grant(&mut conn, "o1", &item).await.unwrap().unwrap();
        assert_eq!(open.duration_days, 30);

        assert!(mark_grant_revoked(&mut conn, "g1", Utc::now()).await.unwrap());
        assert!(!mark_grant_revoked(&mut conn, "g1", Utc::now()).await.unwrap());
        assert!(find_open_grant(&mut conn, "o1", &item).await.unwrap().is_none());
        assert_eq!(list_grants(&mut conn, "s1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_cascades_grants() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let item = ItemRef::tool("t1");
        let mut conn = db.pool().acquire().await.unwrap();
        insert_subscription(&mut conn, &sub("s1", "u1", &item, SubscriptionStatus::Active))
            .await
            .unwrap();
        insert_grant(&mut conn, &grant("g1", "s1", &item, 10)).await.unwrap();

        assert!(delete_subscription(&mut conn, "s1").await.unwrap());
        assert!(!delete_subscription(&mut conn, "s1").await.unwrap());
        assert!(list_grants(&mut conn, "s1").await.unwrap().is_empty());
    }
}
