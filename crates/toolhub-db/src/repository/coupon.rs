//! # Coupon Repository
//!
//! Coupons are looked up by their normalized code. Rule sets are stored as
//! JSON text in a single column.
//!
//! ## Usage Counting
//! ```text
//! UPDATE coupons SET used_count = used_count + 1
//! WHERE id = ? AND (usage_limit IS NULL OR used_count < usage_limit)
//!
//! 1 row  → use consumed
//! 0 rows → limit reached (another checkout took the last use)
//! ```

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use toolhub_core::{Coupon, CouponStatus, DiscountType};

const COUPON_COLUMNS: &str = r#"
    id, code, discount_type, discount_value, expires_at, usage_limit,
    used_count, status, rules, created_at, updated_at
"#;

#[derive(Debug, FromRow)]
struct CouponRow {
    id: String,
    code: String,
    discount_type: DiscountType,
    discount_value: i64,
    expires_at: DateTime<Utc>,
    usage_limit: Option<i64>,
    used_count: i64,
    status: CouponStatus,
    rules: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = crate::DbError;

    fn try_from(row: CouponRow) -> DbResult<Self> {
        Ok(Coupon {
            rules: serde_json::from_str(&row.rules)?,
            id: row.id,
            code: row.code,
            discount_type: row.discount_type,
            discount_value: row.discount_value,
            expires_at: row.expires_at,
            usage_limit: row.usage_limit,
            used_count: row.used_count,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for coupon database operations.
#[derive(Debug, Clone)]
pub struct CouponRepository {
    pool: SqlitePool,
}

impl CouponRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CouponRepository { pool }
    }

    /// Looks up a coupon by its normalized code.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Coupon>> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_code(&mut conn, code).await
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Coupon>> {
        let sql = format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE id = ?1");
        let row = sqlx::query_as::<_, CouponRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Coupon::try_from).transpose()
    }

    /// All coupons, newest first.
    pub async fn list(&self) -> DbResult<Vec<Coupon>> {
        let sql = format!("SELECT {COUPON_COLUMNS} FROM coupons ORDER BY created_at DESC, rowid DESC");
        let rows = sqlx::query_as::<_, CouponRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Coupon::try_from).collect()
    }

    pub async fn insert(&self, coupon: &Coupon) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert_coupon(&mut conn, coupon).await
    }

    /// Activates or deactivates a coupon. Returns false if it doesn't exist.
    pub async fn set_status(
        &self,
        id: &str,
        status: CouponStatus,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        debug!(id = %id, status = ?status, "Setting coupon status");
        let result = sqlx::query("UPDATE coupons SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

// =============================================================================
// Connection-level Functions
// =============================================================================

pub async fn fetch_by_code(conn: &mut SqliteConnection, code: &str) -> DbResult<Option<Coupon>> {
    let sql = format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE code = ?1");
    let row = sqlx::query_as::<_, CouponRow>(&sql)
        .bind(code)
        .fetch_optional(&mut *conn)
        .await?;
    row.map(Coupon::try_from).transpose()
}

pub async fn insert_coupon(conn: &mut SqliteConnection, coupon: &Coupon) -> DbResult<()> {
    debug!(id = %coupon.id, code = %coupon.code, "Inserting coupon");

    sqlx::query(
        r#"
        INSERT INTO coupons (
            id, code, discount_type, discount_value, expires_at, usage_limit,
            used_count, status, rules, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(&coupon.id)
    .bind(&coupon.code)
    .bind(coupon.discount_type)
    .bind(coupon.discount_value)
    .bind(coupon.expires_at)
    .bind(coupon.usage_limit)
    .bind(coupon.used_count)
    .bind(coupon.status)
    .bind(serde_json::to_string(&coupon.rules)?)
    .bind(coupon.created_at)
    .bind(coupon.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Consumes one use of a coupon if the usage limit allows it.
///
/// Returns false when the limit has been reached; the caller decides
/// whether that aborts its transaction.
pub async fn try_consume_use(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE coupons
        SET used_count = used_count + 1
        WHERE id = ?1 AND (usage_limit IS NULL OR used_count < usage_limit)
        "#,
    )
    .bind(id)
    .execute(&mut *conn)
    .await?;

    let consumed = result.rows_affected() == 1;
    debug!(id = %id, consumed, "Coupon use");
    Ok(consumed)
}

// =============================================================================
// Unit Tests
// =============================================================================
