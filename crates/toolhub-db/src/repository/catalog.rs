//! # Catalog Repository
//!
//! Tools, packages and package membership.
//!
//! ## Tables
//! ```text
//! tools ◄──────── package_tools ────────► packages
//!   id              package_id (CASCADE)     id
//!   package_id ─┐   tool_id    (CASCADE)     features (JSON text)
//!               │   position
//!               └─► shadow package (exactly one member: this tool)
//! ```

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use toolhub_core::{
    BillingInterval, ItemKind, ItemRef, Package, PackageStatus, PurchasableItem, Tool, ToolStatus,
    Visibility,
};

const TOOL_COLUMNS: &str = r#"
    id, name, description, category, url, price_cents, interval,
    visibility, status, package_id, created_at, updated_at
"#;

const PACKAGE_COLUMNS: &str = r#"
    id, name, price_cents, interval, is_trial, trial_duration_days,
    visibility, status, features, created_at, updated_at
"#;

/// Package row without its membership list.
#[derive(Debug, FromRow)]
struct PackageRow {
    id: String,
    name: String,
    price_cents: i64,
    interval: BillingInterval,
    is_trial: bool,
    trial_duration_days: Option<i64>,
    visibility: Visibility,
    status: PackageStatus,
    features: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PackageRow {
    fn into_package(self, tool_ids: Vec<String>) -> DbResult<Package> {
        Ok(Package {
            features: serde_json::from_str(&self.features)?,
            id: self.id,
            name: self.name,
            price_cents: self.price_cents,
            interval: self.interval,
            is_trial: self.is_trial,
            trial_duration_days: self.trial_duration_days,
            visibility: self.visibility,
            status: self.status,
            tool_ids,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

// =============================================================================
// Pool-backed Repository
// =============================================================================

/// Repository for catalog reads.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    pub async fn get_tool(&self, id: &str) -> DbResult<Option<Tool>> {
        let mut conn = self.pool.acquire().await?;
        fetch_tool(&mut conn, id).await
    }

    /// All tools, newest first.
    pub async fn list_tools(&self) -> DbResult<Vec<Tool>> {
        let sql = format!("SELECT {TOOL_COLUMNS} FROM tools ORDER BY created_at DESC, rowid DESC");
        let tools = sqlx::query_as::<_, Tool>(&sql).fetch_all(&self.pool).await?;
        Ok(tools)
    }

    /// Tools with the given status, newest first.
    pub async fn list_tools_by_status(&self, status: ToolStatus) -> DbResult<Vec<Tool>> {
        let sql = format!(
            "SELECT {TOOL_COLUMNS} FROM tools WHERE status = ?1 ORDER BY created_at DESC, rowid DESC"
        );
        let tools = sqlx::query_as::<_, Tool>(&sql)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;
        Ok(tools)
    }

    pub async fn get_package(&self, id: &str) -> DbResult<Option<Package>> {
        let mut conn = self.pool.acquire().await?;
        fetch_package(&mut conn, id).await
    }

    /// All packages, newest first.
    pub async fn list_packages(&self) -> DbResult<Vec<Package>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!(
            "SELECT {PACKAGE_COLUMNS} FROM packages ORDER BY created_at DESC, rowid DESC"
        );
        let rows = sqlx::query_as::<_, PackageRow>(&sql)
            .fetch_all(&mut *conn)
            .await?;

        let mut packages = Vec::with_capacity(rows.len());
        for row in rows {
            let tool_ids = package_tool_ids(&mut conn, &row.id).await?;
            packages.push(row.into_package(tool_ids)?);
        }
        Ok(packages)
    }

    pub async fn find_item(&self, item: &ItemRef) -> DbResult<Option<PurchasableItem>> {
        let mut conn = self.pool.acquire().await?;
        find_item(&mut conn, item).await
    }

    pub async fn find_shadow_package(&self, tool_id: &str) -> DbResult<Option<Package>> {
        let mut conn = self.pool.acquire().await?;
        find_shadow_package(&mut conn, tool_id).await
    }
}

// =============================================================================
// Tools
// =============================================================================

pub async fn fetch_tool(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Tool>> {
    let sql = format!("SELECT {TOOL_COLUMNS} FROM tools WHERE id = ?1");
    let tool = sqlx::query_as::<_, Tool>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(tool)
}

pub async fn insert_tool(conn: &mut SqliteConnection, tool: &Tool) -> DbResult<()> {
    debug!(id = %tool.id, name = %tool.name, "Inserting tool");

    sqlx::query(
        r#"
        INSERT INTO tools (
            id, name, description, category, url, price_cents, interval,
            visibility, status, package_id, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )
    .bind(&tool.id)
    .bind(&tool.name)
    .bind(&tool.description)
    .bind(&tool.category)
    .bind(&tool.url)
    .bind(tool.price_cents)
    .bind(tool.interval)
    .bind(tool.visibility)
    .bind(tool.status)
    .bind(&tool.package_id)
    .bind(tool.created_at)
    .bind(tool.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Overwrites every mutable column of a tool.
pub async fn update_tool(conn: &mut SqliteConnection, tool: &Tool) -> DbResult<bool> {
    debug!(id = %tool.id, "Updating tool");

    let result = sqlx::query(
        r#"
        UPDATE tools SET
            name = ?2, description = ?3, category = ?4, url = ?5,
            price_cents = ?6, interval = ?7, visibility = ?8, status = ?9,
            package_id = ?10, updated_at = ?11
        WHERE id = ?1
        "#,
    )
    .bind(&tool.id)
    .bind(&tool.name)
    .bind(&tool.description)
    .bind(&tool.category)
    .bind(&tool.url)
    .bind(tool.price_cents)
    .bind(tool.interval)
    .bind(tool.visibility)
    .bind(tool.status)
    .bind(&tool.package_id)
    .bind(tool.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Deletes a tool. Membership rows go with it (ON DELETE CASCADE).
pub async fn delete_tool(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
    debug!(id = %id, "Deleting tool");
    let result = sqlx::query("DELETE FROM tools WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

// =============================================================================
// Packages
// =============================================================================

/// Member tool ids of a package, in display order.
pub async fn package_tool_ids(conn: &mut SqliteConnection, package_id: &str) -> DbResult<Vec<String>> {
    let ids = sqlx::query_scalar::<_, String>(
        "SELECT tool_id FROM package_tools WHERE package_id = ?1 ORDER BY position",
    )
    .bind(package_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(ids)
}

pub async fn fetch_package(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Package>> {
    let sql = format!("SELECT {PACKAGE_COLUMNS} FROM packages WHERE id = ?1");
    let row = sqlx::query_as::<_, PackageRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => {
            let tool_ids = package_tool_ids(conn, &row.id).await?;
            Ok(Some(row.into_package(tool_ids)?))
        }
        None => Ok(None),
    }
}

async fn replace_membership(
    conn: &mut SqliteConnection,
    package_id: &str,
    tool_ids: &[String],
) -> DbResult<()> {
    sqlx::query("DELETE FROM package_tools WHERE package_id = ?1")
        .bind(package_id)
        .execute(&mut *conn)
        .await?;

    for (position, tool_id) in tool_ids.iter().enumerate() {
        sqlx::query("INSERT INTO package_tools (package_id, tool_id, position) VALUES (?1, ?2, ?3)")
            .bind(package_id)
            .bind(tool_id)
            .bind(position as i64)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn insert_package(conn: &mut SqliteConnection, package: &Package) -> DbResult<()> {
    debug!(id = %package.id, name = %package.name, tools = package.tool_ids.len(), "Inserting package");

    sqlx::query(
        r#"
        INSERT INTO packages (
            id, name, price_cents, interval, is_trial, trial_duration_days,
            visibility, status, features, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(&package.id)
    .bind(&package.name)
    .bind(package.price_cents)
    .bind(package.interval)
    .bind(package.is_trial)
    .bind(package.trial_duration_days)
    .bind(package.visibility)
    .bind(package.status)
    .bind(serde_json::to_string(&package.features)?)
    .bind(package.created_at)
    .bind(package.updated_at)
    .execute(&mut *conn)
    .await?;

    replace_membership(conn, &package.id, &package.tool_ids).await
}

/// Overwrites a package and its membership list.
pub async fn update_package(conn: &mut SqliteConnection, package: &Package) -> DbResult<bool> {
    debug!(id = %package.id, "Updating package");

    let result = sqlx::query(
        r#"
        UPDATE packages SET
            name = ?2, price_cents = ?3, interval = ?4, is_trial = ?5,
            trial_duration_days = ?6, visibility = ?7, status = ?8,
            features = ?9, updated_at = ?10
        WHERE id = ?1
        "#,
    )
    .bind(&package.id)
    .bind(&package.name)
    .bind(package.price_cents)
    .bind(package.interval)
    .bind(package.is_trial)
    .bind(package.trial_duration_days)
    .bind(package.visibility)
    .bind(package.status)
    .bind(serde_json::to_string(&package.features)?)
    .bind(package.updated_at)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() != 1 {
        return Ok(false);
    }
    replace_membership(conn, &package.id, &package.tool_ids).await?;
    Ok(true)
}

pub async fn delete_package(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
    debug!(id = %id, "Deleting package");
    let result = sqlx::query("DELETE FROM packages WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// The oldest package whose only member is `tool_id`.
pub async fn find_shadow_package(
    conn: &mut SqliteConnection,
    tool_id: &str,
) -> DbResult<Option<Package>> {
    let package_id = sqlx::query_scalar::<_, String>(
        r#"
        SELECT p.id
        FROM packages p
        JOIN package_tools pt ON pt.package_id = p.id
        WHERE pt.tool_id = ?1
          AND (SELECT COUNT(*) FROM package_tools x WHERE x.package_id = p.id) = 1
        ORDER BY p.created_at, p.rowid
        LIMIT 1
        "#,
    )
    .bind(tool_id)
    .fetch_optional(&mut *conn)
    .await?;

    match package_id {
        Some(id) => fetch_package(conn, &id).await,
        None => Ok(None),
    }
}

/// Ids of every package whose only member is `tool_id`.
pub async fn shadow_package_ids(
    conn: &mut SqliteConnection,
    tool_id: &str,
) -> DbResult<Vec<String>> {
    let ids = sqlx::query_scalar::<_, String>(
        r#"
        SELECT p.id
        FROM packages p
        JOIN package_tools pt ON pt.package_id = p.id
        WHERE pt.tool_id = ?1
          AND (SELECT COUNT(*) FROM package_tools x WHERE x.package_id = p.id) = 1
        "#,
    )
    .bind(tool_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(ids)
}

// =============================================================================
// Items
// =============================================================================

/// Resolves an item reference against the table its kind names.
pub async fn find_item(
    conn: &mut SqliteConnection,
    item: &ItemRef,
) -> DbResult<Option<PurchasableItem>> {
    let found = match item.kind {
        ItemKind::Tool => fetch_tool(conn, &item.id).await?.map(PurchasableItem::Tool),
        ItemKind::Package => fetch_package(conn, &item.id)
            .await?
            .map(PurchasableItem::Package),
    };
    Ok(found)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    fn tool(id: &str, price_cents: i64) -> Tool {
        let now = Utc::now();
        Tool {
            id: id.to_string(),
            name: format!("Tool {id}"),
            description: "desc".to_string(),
            category: "seo".to_string(),
            url: Some("https://tools.example.com".to_string()),
            price_cents,
            interval: BillingInterval::Monthly,
            visibility: Visibility::Public,
            status: ToolStatus::Active,
            package_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn package(id: &str, tool_ids: &[&str]) -> Package {
        let now = Utc::now();
        Package {
            id: id.to_string(),
            name: format!("Package {id}"),
            price_cents: 2500,
            interval: BillingInterval::Yearly,
            is_trial: false,
            trial_duration_days: None,
            visibility: Visibility::Public,
            status: PackageStatus::Active,
            features: vec!["Priority support".to_string()],
            tool_ids: tool_ids.iter().map(|t| t.to_string()).collect(),
            created_at: now,
            updated_at: now,
        }
    }

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_tool_round_trip() {
        let db = db().await;
        let mut conn = db.pool().acquire().await.unwrap();
        insert_tool(&mut conn, &tool("t1", 999)).await.unwrap();
        drop(conn);

        let found = db.catalog().get_tool("t1").await.unwrap().unwrap();
        assert_eq!(found.price_cents, 999);
        assert_eq!(found.status, ToolStatus::Active);
        assert!(db.catalog().get_tool("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_package_membership_and_features() {
        let db = db().await;
        let mut conn = db.pool().acquire().await.unwrap();
        insert_tool(&mut conn, &tool("t1", 100)).await.unwrap();
        insert_tool(&mut conn, &tool("t2", 100)).await.unwrap();
        insert_package(&mut conn, &package("p1", &["t2", "t1"])).await.unwrap();
        drop(conn);

        let pkg = db.catalog().get_package("p1").await.unwrap().unwrap();
        assert_eq!(pkg.tool_ids, vec!["t2", "t1"]);
        assert_eq!(pkg.features, vec!["Priority support"]);
    }

    #[tokio::test]
    async fn test_shadow_package_lookup() {
        let db = db().await;
        let mut conn = db.pool().acquire().await.unwrap();
        insert_tool(&mut conn, &tool("t1", 100)).await.unwrap();
        insert_tool(&mut conn, &tool("t2", 100)).await.unwrap();
        insert_package(&mut conn, &package("bundle", &["t1", "t2"])).await.unwrap();
        assert!(find_shadow_package(&mut conn, "t1").await.unwrap().is_none());

        insert_package(&mut conn, &package("shadow", &["t1"])).await.unwrap();
        let shadow = find_shadow_package(&mut conn, "t1").await.unwrap().unwrap();
        assert_eq!(shadow.id, "shadow");
        assert_eq!(shadow_package_ids(&mut conn, "t1").await.unwrap(), vec!["shadow"]);
    }

    #[tokio::test]
    async fn test_deleting_tool_drops_membership() {
        let db = db().await;
        let mut conn = db.pool().acquire().await.unwrap();
        insert_tool(&mut conn, &tool("t1", 100)).await.unwrap();
        insert_tool(&mut conn, &tool("t2", 100)).await.unwrap();
        insert_package(&mut conn, &package("bundle", &["t1", "t2"])).await.unwrap();

        assert!(delete_tool(&mut conn, "t1").await.unwrap());
        assert_eq!(package_tool_ids(&mut conn, "bundle").await.unwrap(), vec!["t2"]);
    }

    #[tokio::test]
    async fn test_find_item_dispatches_on_kind() {
        let db = db().await;
        let mut conn = db.pool().acquire().await.unwrap();
        insert_tool(&mut conn, &tool("same-id", 100)).await.unwrap();
        drop(conn);

        let catalog = db.catalog();
        assert!(matches!(
            catalog.find_item(&ItemRef::tool("same-id")).await.unwrap(),
            Some(PurchasableItem::Tool(_))
        ));
        // Same id, other table: not found rather than silently matching
        assert!(catalog
            .find_item(&ItemRef::package("same-id"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_list_tools_by_status() {
        let db = db().await;
        let mut conn = db.pool().acquire().await.unwrap();
        insert_tool(&mut conn, &tool("t1", 100)).await.unwrap();
        let mut down = tool("t2", 100);
        down.status = ToolStatus::Down;
        insert_tool(&mut conn, &down).await.unwrap();
        drop(conn);

        let active = db.catalog().list_tools_by_status(ToolStatus::Active).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "t1");
        assert_eq!(db.catalog().list_tools().await.unwrap().len(), 2);
    }
}
