//! # Order Repository
//!
//! Orders and their lines.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. CREATE (checkout transaction)                                      │
//! │     └── insert_order() → header + lines, version 1                     │
//! │                                                                         │
//! │  2. ADMIN STATUS CHANGE (status transaction)                           │
//! │     └── fetch_order()   → read status and version                      │
//! │     └── ...entitlement changes...                                      │
//! │     └── update_status(expected_version)                                │
//! │           1 row  → committed, version + 1                              │
//! │           0 rows → someone else changed it first; roll back            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use toolhub_core::{Order, OrderLine, OrderStatus, PaymentMethod};

const ORDER_COLUMNS: &str = r#"
    id, user_id, total_cents, discount_cents, final_cents, payment_method,
    payment_proof, coupon_id, status, admin_note, version, created_at, updated_at
"#;

/// Order header without lines.
#[derive(Debug, FromRow)]
struct OrderRow {
    id: String,
    user_id: String,
    total_cents: i64,
    discount_cents: i64,
    final_cents: i64,
    payment_method: PaymentMethod,
    payment_proof: Option<String>,
    coupon_id: Option<String>,
    status: OrderStatus,
    admin_note: Option<String>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, lines: Vec<OrderLine>) -> Order {
        Order {
            id: self.id,
            user_id: self.user_id,
            lines,
            total_cents: self.total_cents,
            discount_cents: self.discount_cents,
            final_cents: self.final_cents,
            payment_method: self.payment_method,
            payment_proof: self.payment_proof,
            coupon_id: self.coupon_id,
            status: self.status,
            admin_note: self.admin_note,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Repository for order reads.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        fetch_order(&mut conn, id).await
    }

    /// Every order, newest first.
    pub async fn list(&self) -> DbResult<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, rowid DESC");
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .fetch_all(&mut *conn)
            .await?;
        with_lines(&mut conn, rows).await
    }

    /// A user's orders, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> DbResult<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC"
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;
        with_lines(&mut conn, rows).await
    }
}

async fn with_lines(conn: &mut SqliteConnection, rows: Vec<OrderRow>) -> DbResult<Vec<Order>> {
    let mut orders = Vec::with_capacity(rows.len());
    for row in rows {
        let lines = fetch_lines(conn, &row.id).await?;
        orders.push(row.into_order(lines));
    }
    Ok(orders)
}

// =============================================================================
// Connection-level Functions
// =============================================================================

pub async fn fetch_lines(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<OrderLine>> {
    let lines = sqlx::query_as::<_, OrderLine>(
        r#"
        SELECT id, order_id, item_kind, item_id, name_snapshot,
               period_count, unit_price_cents, line_total_cents
        FROM order_lines
        WHERE order_id = ?1
        ORDER BY position
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(lines)
}

pub async fn fetch_order(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Order>> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");
    let row = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => {
            let lines = fetch_lines(conn, &row.id).await?;
            Ok(Some(row.into_order(lines)))
        }
        None => Ok(None),
    }
}

/// Inserts an order header and all of its lines.
pub async fn insert_order(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
    debug!(
        id = %order.id,
        user_id = %order.user_id,
        lines = order.lines.len(),
        final_cents = order.final_cents,
        "Inserting order"
    );

    sqlx::query(
        r#"
        INSERT INTO orders (
            id, user_id, total_cents, discount_cents, final_cents, payment_method,
            payment_proof, coupon_id, status, admin_note, version, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#,
    )
    .bind(&order.id)
    .bind(&order.user_id)
    .bind(order.total_cents)
    .bind(order.discount_cents)
    .bind(order.final_cents)
    .bind(order.payment_method)
    .bind(&order.payment_proof)
    .bind(&order.coupon_id)
    .bind(order.status)
    .bind(&order.admin_note)
    .bind(order.version)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await?;

    for (position, line) in order.lines.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO order_lines (
                id, order_id, position, item_kind, item_id, name_snapshot,
                period_count, unit_price_cents, line_total_cents
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&line.id)
        .bind(&order.id)
        .bind(position as i64)
        .bind(line.item_kind)
        .bind(&line.item_id)
        .bind(&line.name_snapshot)
        .bind(line.period_count)
        .bind(line.unit_price_cents)
        .bind(line.line_total_cents)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Changes status if the order is still at `expected_version`.
///
/// `admin_note` replaces the stored note when given. Returns false when the
/// version no longer matches.
pub async fn update_status(
    conn: &mut SqliteConnection,
    id: &str,
    expected_version: i64,
    status: OrderStatus,
    admin_note: Option<&str>,
    now: DateTime<Utc>,
) -> DbResult<bool> {
    debug!(id = %id, expected_version, status = %status, "Updating order status");

    let result = sqlx::query(
        r#"
        UPDATE orders
        SET status = ?3,
            admin_note = COALESCE(?4, admin_note),
            version = version + 1,
            updated_at = ?5
        WHERE id = ?1 AND version = ?2
        "#,
    )
    .bind(id)
    .bind(expected_version)
    .bind(status)
    .bind(admin_note)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

// =============================================================================
// Unit Tests
// =============================================================================
