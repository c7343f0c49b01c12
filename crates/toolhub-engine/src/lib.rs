//! # toolhub-engine: Settlement Services for ToolHub
//!
//! Composes the pure rules in `toolhub-core` with the repositories in
//! `toolhub-db` into the operations the storefront and admin dashboard
//! call: checkout, approval, coupon checks, entitlement grants and access
//! resolution.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        ToolHub Architecture                             │
//! │                                                                         │
//! │  Storefront / Admin dashboard (identity provider supplies Actor)       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               ★ toolhub-engine (THIS CRATE) ★                   │   │
//! │  │                                                                 │   │
//! │  │  Engine ─┬─ OrderService       create_order, set_order_status  │   │
//! │  │          ├─ CouponService      validate_coupon, admin coupons  │   │
//! │  │          ├─ CatalogService     tools, packages, shadow sync    │   │
//! │  │          ├─ AccessResolver     accessible tools, access checks │   │
//! │  │          └─ SubscriptionAdmin  manual grants and corrections   │   │
//! │  │                                                                 │   │
//! │  │  EntitlementEngine: grant / extend / revoke (shared)           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                               │                                 │
//! │       ▼                               ▼                                 │
//! │  toolhub-core (rules)           toolhub-db (SQLite)                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use toolhub_engine::{Engine, EngineConfig, CheckoutRequest};
//!
//! toolhub_engine::telemetry::init_tracing();
//! let engine = Engine::connect(EngineConfig::load(None)?).await?;
//!
//! let receipt = engine.create_order(&actor, request).await?;
//! let order = engine
//!     .set_order_status(&admin, &receipt.order_id, OrderStatus::Approved, None)
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod clock;
pub mod config;
pub mod error;
pub mod services;
pub mod telemetry;

// =============================================================================
// Re-exports
// =============================================================================

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use error::{ErrorCode, ServiceError, ServiceResult};
pub use services::access::AccessResolver;
pub use services::catalog::{CatalogService, NewPackage, NewTool, PackageUpdate, ToolUpdate};
pub use services::coupon::{CouponService, NewCoupon};
pub use services::entitlement::{EntitlementEngine, RevokeOutcome};
pub use services::order::{CheckoutRequest, OrderReceipt, OrderService};
pub use services::subscription::SubscriptionAdmin;

use std::sync::Arc;

use tracing::info;

use toolhub_core::coupon::CouponQuote;
use toolhub_core::order::CheckoutLine;
use toolhub_core::{Actor, Order, OrderStatus, Package, ToolWithAccess};
use toolhub_db::Database;

// =============================================================================
// Engine
// =============================================================================

/// Entry point owning the database, configuration and clock.
///
/// Cloning is cheap; every service shares the same pool.
#[derive(Debug, Clone)]
pub struct Engine {
    db: Database,
    config: EngineConfig,
    catalog: CatalogService,
    coupons: CouponService,
    orders: OrderService,
    access: AccessResolver,
    subscriptions: SubscriptionAdmin,
}

impl Engine {
    /// Validates the configuration, opens the database and runs migrations.
    pub async fn connect(config: EngineConfig) -> ServiceResult<Self> {
        config
            .validate()
            .map_err(|e| ServiceError::validation(e.to_string()))?;
        let db = Database::new(config.db_config()).await?;
        info!(path = %config.database.path.display(), "Engine connected");
        Ok(Self::new(db, config, Arc::new(SystemClock)))
    }

    /// Builds the engine on an existing database with an injected clock.
    pub fn new(db: Database, config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        let entitlements = EntitlementEngine::new(config.duration_policy());

        Engine {
            catalog: CatalogService::new(db.clone(), clock.clone()),
            coupons: CouponService::new(db.clone(), clock.clone(), config.orders.clone()),
            orders: OrderService::new(
                db.clone(),
                clock.clone(),
                entitlements.clone(),
                config.orders.clone(),
            ),
            access: AccessResolver::new(db.clone(), clock.clone()),
            subscriptions: SubscriptionAdmin::new(db.clone(), clock, entitlements),
            db,
            config,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &CatalogService {
        &self.catalog
    }

    pub fn coupons(&self) -> &CouponService {
        &self.coupons
    }

    pub fn orders(&self) -> &OrderService {
        &self.orders
    }

    pub fn access(&self) -> &AccessResolver {
        &self.access
    }

    pub fn subscriptions(&self) -> &SubscriptionAdmin {
        &self.subscriptions
    }

    // -------------------------------------------------------------------------
    // Storefront and dashboard operations
    // -------------------------------------------------------------------------

    pub async fn create_order(&self, actor: &Actor, request: CheckoutRequest) -> ServiceResult<OrderReceipt> {
        self.orders.create_order(actor, request).await
    }

    pub async fn set_order_status(
        &self,
        actor: &Actor,
        order_id: &str,
        status: OrderStatus,
        admin_note: Option<String>,
    ) -> ServiceResult<Order> {
        self.orders
            .set_order_status(actor, order_id, status, admin_note)
            .await
    }

    pub async fn validate_coupon(
        &self,
        code: &str,
        actor: Option<&Actor>,
        lines: &[CheckoutLine],
    ) -> ServiceResult<CouponQuote> {
        self.coupons.validate_coupon(code, actor, lines).await
    }

    pub async fn get_user_accessible_tools(&self, actor: &Actor) -> ServiceResult<Vec<ToolWithAccess>> {
        self.access.get_user_accessible_tools(actor).await
    }

    pub async fn check_tool_access(&self, actor: &Actor, tool_id: &str) -> bool {
        self.access.check_tool_access(actor, tool_id).await
    }

    pub async fn sync_shadow_package(&self, tool_id: &str) -> ServiceResult<Package> {
        self.catalog.sync_shadow_package(tool_id).await
    }

    /// Closes the pool. Outstanding clones of the engine stop working.
    pub async fn close(&self) {
        self.db.close().await;
    }
}
