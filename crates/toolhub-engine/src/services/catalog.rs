//! # Catalog Service
//!
//! Tool and package administration, and the shadow package that makes
//! every tool sellable on its own.
//!
//! ## Shadow Packages
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Tool "Rank Tracker"              Package "Rank Tracker"                │
//! │  ─────────────────────            ──────────────────────                │
//! │  price_cents  ───────────────────► price_cents                          │
//! │  interval     ───────────────────► interval                             │
//! │  visibility   ───────────────────► visibility                           │
//! │  name         ───────────────────► name                                 │
//! │  package_id   ◄─────────────────── id        tool_ids = [tool.id]       │
//! │                                                                         │
//! │  create_tool / update_tool (price, interval, visibility) → forward     │
//! │  update_package on a single-tool package (price, interval) → reverse   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Every sync runs in the same transaction as the edit that caused it.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{debug, info};

use toolhub_core::validation::{validate_duration_days, validate_name, validate_price_cents};
use toolhub_core::{
    Actor, BillingInterval, CoreError, ItemKind, Package, PackageStatus, Tool, ToolStatus,
    ValidationError, Visibility,
};
use toolhub_db::repository::catalog;
use toolhub_db::Database;

use crate::clock::Clock;
use crate::error::{ServiceError, ServiceResult};
use crate::services::{new_id, require_admin};

// =============================================================================
// Admin Input
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub url: Option<String>,
    pub price_cents: i64,
    #[serde(default)]
    pub interval: BillingInterval,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub status: ToolStatus,
}

/// Partial tool edit. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub url: Option<Option<String>>,
    pub price_cents: Option<i64>,
    pub interval: Option<BillingInterval>,
    pub visibility: Option<Visibility>,
    pub status: Option<ToolStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPackage {
    pub name: String,
    pub price_cents: i64,
    #[serde(default)]
    pub interval: BillingInterval,
    #[serde(default)]
    pub is_trial: bool,
    #[serde(default)]
    pub trial_duration_days: Option<i64>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub status: PackageStatus,
    #[serde(default)]
    pub features: Vec<String>,
    pub tool_ids: Vec<String>,
}

/// Partial package edit. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageUpdate {
    pub name: Option<String>,
    pub price_cents: Option<i64>,
    pub interval: Option<BillingInterval>,
    pub is_trial: Option<bool>,
    pub trial_duration_days: Option<Option<i64>>,
    pub visibility: Option<Visibility>,
    pub status: Option<PackageStatus>,
    pub features: Option<Vec<String>>,
    pub tool_ids: Option<Vec<String>>,
}

// =============================================================================
// Helpers
// =============================================================================

fn validate_package(package: &Package) -> ServiceResult<()> {
    validate_name(&package.name)?;
    validate_price_cents(package.price_cents)?;
    if package.is_trial {
        if let Some(days) = package.trial_duration_days {
            validate_duration_days("trial_duration_days", days)?;
        }
    }
    if package.tool_ids.is_empty() {
        return Err(ValidationError::Required {
            field: "tool_ids".to_string(),
        }
        .into());
    }
    Ok(())
}

/// Drops duplicate ids, keeping first-seen order.
fn dedup_ids(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

async fn ensure_tools_exist(conn: &mut SqliteConnection, tool_ids: &[String]) -> ServiceResult<()> {
    for tool_id in tool_ids {
        if catalog::fetch_tool(conn, tool_id).await?.is_none() {
            return Err(CoreError::ItemNotFound {
                kind: ItemKind::Tool,
                id: tool_id.clone(),
            }
            .into());
        }
    }
    Ok(())
}

/// Creates or refreshes the shadow package of `tool` and links it back.
async fn sync_shadow_in(
    conn: &mut SqliteConnection,
    tool: &mut Tool,
    now: DateTime<Utc>,
) -> ServiceResult<Package> {
    let linked = match tool.package_id.as_deref() {
        Some(id) => catalog::fetch_package(conn, id)
            .await?
            .filter(|p| p.is_shadow_of(&tool.id)),
        None => None,
    };
    let existing = match linked {
        Some(package) => Some(package),
        None => catalog::find_shadow_package(conn, &tool.id).await?,
    };

    let package = match existing {
        Some(mut package) => {
            package.name = tool.name.clone();
            package.price_cents = tool.price_cents;
            package.interval = tool.interval;
            package.visibility = tool.visibility;
            package.updated_at = now;
            catalog::update_package(conn, &package).await?;
            debug!(tool_id = %tool.id, package_id = %package.id, "Shadow package refreshed");
            package
        }
        None => {
            let package = Package {
                id: new_id(),
                name: tool.name.clone(),
                price_cents: tool.price_cents,
                interval: tool.interval,
                is_trial: false,
                trial_duration_days: None,
                visibility: tool.visibility,
                status: PackageStatus::Active,
                features: Vec::new(),
                tool_ids: vec![tool.id.clone()],
                created_at: now,
                updated_at: now,
            };
            catalog::insert_package(conn, &package).await?;
            debug!(tool_id = %tool.id, package_id = %package.id, "Shadow package created");
            package
        }
    };

    if tool.package_id.as_deref() != Some(package.id.as_str()) {
        tool.package_id = Some(package.id.clone());
        tool.updated_at = now;
        catalog::update_tool(conn, tool).await?;
    }

    Ok(package)
}

// =============================================================================
// Catalog Service
// =============================================================================

#[derive(Debug, Clone)]
pub struct CatalogService {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl CatalogService {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        CatalogService { db, clock }
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    pub async fn get_tool(&self, tool_id: &str) -> ServiceResult<Tool> {
        self.db
            .catalog()
            .get_tool(tool_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Tool", tool_id))
    }

    pub async fn list_tools(&self) -> ServiceResult<Vec<Tool>> {
        Ok(self.db.catalog().list_tools().await?)
    }

    pub async fn get_package(&self, package_id: &str) -> ServiceResult<Package> {
        self.db
            .catalog()
            .get_package(package_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Package", package_id))
    }

    pub async fn list_packages(&self) -> ServiceResult<Vec<Package>> {
        Ok(self.db.catalog().list_packages().await?)
    }

    // -------------------------------------------------------------------------
    // Tools
    // -------------------------------------------------------------------------

    /// Creates a tool together with its shadow package.
    pub async fn create_tool(&self, actor: &Actor, input: NewTool) -> ServiceResult<Tool> {
        require_admin(actor)?;
        validate_name(&input.name)?;
        validate_price_cents(input.price_cents)?;

        let now = self.clock.now();
        let mut tool = Tool {
            id: new_id(),
            name: input.name.trim().to_string(),
            description: input.description,
            category: input.category,
            url: input.url,
            price_cents: input.price_cents,
            interval: input.interval,
            visibility: input.visibility,
            status: input.status,
            package_id: None,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.db.begin().await?;
        catalog::insert_tool(&mut tx, &tool).await?;
        let package = sync_shadow_in(&mut tx, &mut tool, now).await?;
        tx.commit().await?;

        info!(tool_id = %tool.id, package_id = %package.id, name = %tool.name, "Tool created");
        Ok(tool)
    }

    /// Applies a partial edit. Price, interval or visibility changes are
    /// mirrored into the shadow package.
    pub async fn update_tool(
        &self,
        actor: &Actor,
        tool_id: &str,
        changes: ToolUpdate,
    ) -> ServiceResult<Tool> {
        require_admin(actor)?;
        let now = self.clock.now();

        let mut tx = self.db.begin().await?;
        let mut tool = catalog::fetch_tool(&mut tx, tool_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Tool", tool_id))?;
        let before = (tool.price_cents, tool.interval, tool.visibility);

        if let Some(name) = changes.name {
            validate_name(&name)?;
            tool.name = name.trim().to_string();
        }
        if let Some(description) = changes.description {
            tool.description = description;
        }
        if let Some(category) = changes.category {
            tool.category = category;
        }
        if let Some(url) = changes.url {
            tool.url = url;
        }
        if let Some(price_cents) = changes.price_cents {
            validate_price_cents(price_cents)?;
            tool.price_cents = price_cents;
        }
        if let Some(interval) = changes.interval {
            tool.interval = interval;
        }
        if let Some(visibility) = changes.visibility {
            tool.visibility = visibility;
        }
        if let Some(status) = changes.status {
            tool.status = status;
        }
        tool.updated_at = now;

        catalog::update_tool(&mut tx, &tool).await?;

        let needs_sync = before != (tool.price_cents, tool.interval, tool.visibility);
        if needs_sync {
            sync_shadow_in(&mut tx, &mut tool, now).await?;
        }
        tx.commit().await?;

        info!(tool_id = %tool.id, synced = needs_sync, "Tool updated");
        Ok(tool)
    }

    /// Deletes tools along with their shadow packages. Other packages lose
    /// the tools from their membership. Returns how many tools were removed.
    pub async fn delete_tools(&self, actor: &Actor, tool_ids: &[String]) -> ServiceResult<usize> {
        require_admin(actor)?;

        let mut tx = self.db.begin().await?;
        let mut deleted = 0;
        for tool_id in tool_ids {
            // Membership cascades with the tool, so find shadows first
            let shadows = catalog::shadow_package_ids(&mut tx, tool_id).await?;
            if !catalog::delete_tool(&mut tx, tool_id).await? {
                debug!(tool_id = %tool_id, "Tool already gone");
                continue;
            }
            for package_id in &shadows {
                catalog::delete_package(&mut tx, package_id).await?;
            }
            deleted += 1;
        }
        tx.commit().await?;

        info!(requested = tool_ids.len(), deleted, admin = %actor.user_id, "Tools deleted");
        Ok(deleted)
    }

    /// Brings a tool's shadow package in line with the tool, creating it if
    /// it is missing.
    pub async fn sync_shadow_package(&self, tool_id: &str) -> ServiceResult<Package> {
        let now = self.clock.now();

        let mut tx = self.db.begin().await?;
        let mut tool = catalog::fetch_tool(&mut tx, tool_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Tool", tool_id))?;
        let package = sync_shadow_in(&mut tx, &mut tool, now).await?;
        tx.commit().await?;

        Ok(package)
    }

    // -------------------------------------------------------------------------
    // Packages
    // -------------------------------------------------------------------------

    pub async fn create_package(&self, actor: &Actor, input: NewPackage) -> ServiceResult<Package> {
        require_admin(actor)?;

        let now = self.clock.now();
        let package = Package {
            id: new_id(),
            name: input.name.trim().to_string(),
            price_cents: input.price_cents,
            interval: input.interval,
            is_trial: input.is_trial,
            trial_duration_days: input.trial_duration_days,
            visibility: input.visibility,
            status: input.status,
            features: input.features,
            tool_ids: dedup_ids(input.tool_ids),
            created_at: now,
            updated_at: now,
        };
        validate_package(&package)?;

        let mut tx = self.db.begin().await?;
        ensure_tools_exist(&mut tx, &package.tool_ids).await?;
        catalog::insert_package(&mut tx, &package).await?;
        tx.commit().await?;

        info!(package_id = %package.id, name = %package.name, tools = package.tool_ids.len(), "Package created");
        Ok(package)
    }

    /// Applies a partial edit. A single-tool package pushes its price and
    /// interval back onto that tool.
    pub async fn update_package(
        &self,
        actor: &Actor,
        package_id: &str,
        changes: PackageUpdate,
    ) -> ServiceResult<Package> {
        require_admin(actor)?;
        let now = self.clock.now();

        let mut tx = self.db.begin().await?;
        let mut package = catalog::fetch_package(&mut tx, package_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Package", package_id))?;

        if let Some(name) = changes.name {
            package.name = name.trim().to_string();
        }
        if let Some(price_cents) = changes.price_cents {
            package.price_cents = price_cents;
        }
        if let Some(interval) = changes.interval {
            package.interval = interval;
        }
        if let Some(is_trial) = changes.is_trial {
            package.is_trial = is_trial;
        }
        if let Some(days) = changes.trial_duration_days {
            package.trial_duration_days = days;
        }
        if let Some(visibility) = changes.visibility {
            package.visibility = visibility;
        }
        if let Some(status) = changes.status {
            package.status = status;
        }
        if let Some(features) = changes.features {
            package.features = features;
        }
        if let Some(tool_ids) = changes.tool_ids {
            package.tool_ids = dedup_ids(tool_ids);
            ensure_tools_exist(&mut tx, &package.tool_ids).await?;
        }
        package.updated_at = now;
        validate_package(&package)?;

        catalog::update_package(&mut tx, &package).await?;

        if let [tool_id] = package.tool_ids.as_slice() {
            if let Some(mut tool) = catalog::fetch_tool(&mut tx, tool_id).await? {
                if tool.price_cents != package.price_cents || tool.interval != package.interval {
                    tool.price_cents = package.price_cents;
                    tool.interval = package.interval;
                    tool.updated_at = now;
                    catalog::update_tool(&mut tx, &tool).await?;
                    debug!(tool_id = %tool.id, package_id = %package.id, "Tool updated from package");
                }
            }
        }
        tx.commit().await?;

        info!(package_id = %package.id, "Package updated");
        Ok(package)
    }

    /// Deletes a package. Tools that pointed at it as their shadow are
    /// unlinked.
    pub async fn delete_package(&self, actor: &Actor, package_id: &str) -> ServiceResult<()> {
        require_admin(actor)?;
        let now = self.clock.now();

        let mut tx = self.db.begin().await?;
        let package = catalog::fetch_package(&mut tx, package_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Package", package_id))?;

        for tool_id in &package.tool_ids {
            if let Some(mut tool) = catalog::fetch_tool(&mut tx, tool_id).await? {
                if tool.package_id.as_deref() == Some(package_id) {
                    tool.package_id = None;
                    tool.updated_at = now;
                    catalog::update_tool(&mut tx, &tool).await?;
                }
            }
        }
        catalog::delete_package(&mut tx, package_id).await?;
        tx.commit().await?;

        info!(package_id = %package_id, admin = %actor.user_id, "Package deleted");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::error::ErrorCode;
    use chrono::TimeZone;
    use toolhub_db::DbConfig;

    async fn service() -> CatalogService {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        CatalogService::new(db, Arc::new(FixedClock::new(now)))
    }

    fn new_tool(name: &str, price_cents: i64) -> NewTool {
        NewTool {
            name: name.to_string(),
            description: String::new(),
            category: "seo".to_string(),
            url: None,
            price_cents,
            interval: BillingInterval::Monthly,
            visibility: Visibility::Public,
            status: ToolStatus::Active,
        }
    }

    fn new_package(name: &str, tool_ids: Vec<String>) -> NewPackage {
        NewPackage {
            name: name.to_string(),
            price_cents: 4900,
            interval: BillingInterval::Monthly,
            is_trial: false,
            trial_duration_days: None,
            visibility: Visibility::Public,
            status: PackageStatus::Active,
            features: vec!["All tools".to_string()],
            tool_ids,
        }
    }

    #[tokio::test]
    async fn test_create_tool_makes_shadow_package() {
        let catalog = service().await;
        let admin = Actor::admin("a1");

        let tool = catalog.create_tool(&admin, new_tool("Rank Tracker", 1500)).await.unwrap();
        let package_id = tool.package_id.clone().unwrap();
        let package = catalog.get_package(&package_id).await.unwrap();

        assert!(package.is_shadow_of(&tool.id));
        assert_eq!(package.name, "Rank Tracker");
        assert_eq!(package.price_cents, 1500);
        assert_eq!(catalog.list_packages().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_price_change_syncs_shadow() {
        let catalog = service().await;
        let admin = Actor::admin("a1");
        let tool = catalog.create_tool(&admin, new_tool("Rank Tracker", 1500)).await.unwrap();

        let changes = ToolUpdate {
            price_cents: Some(1900),
            interval: Some(BillingInterval::Yearly),
            visibility: Some(Visibility::Private),
            ..ToolUpdate::default()
        };
        catalog.update_tool(&admin, &tool.id, changes).await.unwrap();

        let package = catalog.db.catalog().find_shadow_package(&tool.id).await.unwrap().unwrap();
        assert_eq!(package.price_cents, 1900);
        assert_eq!(package.interval, BillingInterval::Yearly);
        assert_eq!(package.visibility, Visibility::Private);
        assert_eq!(catalog.list_packages().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sync_recreates_missing_shadow() {
        let catalog = service().await;
        let admin = Actor::admin("a1");
        let tool = catalog.create_tool(&admin, new_tool("Site Audit", 900)).await.unwrap();
        let first = tool.package_id.clone().unwrap();

        catalog.delete_package(&admin, &first).await.unwrap();
        assert_eq!(catalog.get_tool(&tool.id).await.unwrap().package_id, None);

        let package = catalog.sync_shadow_package(&tool.id).await.unwrap();
        assert_ne!(package.id, first);
        assert_eq!(package.price_cents, 900);
        assert_eq!(
            catalog.get_tool(&tool.id).await.unwrap().package_id.as_deref(),
            Some(package.id.as_str())
        );
    }

    #[tokio::test]
    async fn test_single_tool_package_reverse_sync() {
        let catalog = service().await;
        let admin = Actor::admin("a1");
        let tool = catalog.create_tool(&admin, new_tool("Keyword Explorer", 1000)).await.unwrap();

        let changes = PackageUpdate {
            price_cents: Some(1200),
            interval: Some(BillingInterval::Lifetime),
            ..PackageUpdate::default()
        };
        catalog
            .update_package(&admin, tool.package_id.as_deref().unwrap(), changes)
            .await
            .unwrap();

        let tool = catalog.get_tool(&tool.id).await.unwrap();
        assert_eq!(tool.price_cents, 1200);
        assert_eq!(tool.interval, BillingInterval::Lifetime);
    }

    #[tokio::test]
    async fn test_create_package_checks_tools() {
        let catalog = service().await;
        let admin = Actor::admin("a1");
        let a = catalog.create_tool(&admin, new_tool("A", 100)).await.unwrap();
        let b = catalog.create_tool(&admin, new_tool("B", 100)).await.unwrap();

        let bundle = catalog
            .create_package(&admin, new_package("Bundle", vec![a.id.clone(), b.id.clone(), a.id.clone()]))
            .await
            .unwrap();
        assert_eq!(bundle.tool_ids, vec![a.id.clone(), b.id.clone()]);

        let err = catalog
            .create_package(&admin, new_package("Broken", vec!["ghost".to_string()]))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let mut trial = new_package("Trial", vec![a.id.clone()]);
        trial.is_trial = true;
        trial.trial_duration_days = Some(0);
        assert!(catalog.create_package(&admin, trial).await.is_err());

        assert!(catalog
            .create_package(&admin, new_package(&"x".repeat(61), vec![a.id]))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_delete_tools_removes_shadows_and_membership() {
        let catalog = service().await;
        let admin = Actor::admin("a1");
        let a = catalog.create_tool(&admin, new_tool("A", 100)).await.unwrap();
        let b = catalog.create_tool(&admin, new_tool("B", 100)).await.unwrap();
        let bundle = catalog
            .create_package(&admin, new_package("Bundle", vec![a.id.clone(), b.id.clone()]))
            .await
            .unwrap();

        let deleted = catalog
            .delete_tools(&admin, &[a.id.clone(), "ghost".to_string()])
            .await
            .unwrap();
        assert_eq!(deleted, 1);

        let packages = catalog.list_packages().await.unwrap();
        assert_eq!(packages.len(), 2);
        let bundle = catalog.get_package(&bundle.id).await.unwrap();
        assert_eq!(bundle.tool_ids, vec![b.id]);
    }

    #[tokio::test]
    async fn test_writes_require_admin() {
        let catalog = service().await;
        let user = Actor::user("u1", "u1@example.com");
        let err = catalog.create_tool(&user, new_tool("A", 100)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Forbidden);
    }
}
