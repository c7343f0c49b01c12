//! # toolhub-db: Database Layer for ToolHub
//!
//! This crate provides database access for the ToolHub settlement engine.
//! It uses SQLite with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        ToolHub Data Flow                                │
//! │                                                                         │
//! │  Engine service (create_order, set_order_status, ...)                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   toolhub-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐   ┌──────────────┐   │   │
//! │  │   │   Database    │    │  Repositories  │   │  Migrations  │   │   │
//! │  │   │   (pool.rs)   │    │                │   │  (embedded)  │   │   │
//! │  │   │               │    │ CatalogRepo    │   │ 001_initial  │   │   │
//! │  │   │ SqlitePool    │◄───│ CouponRepo     │   │   _schema    │   │   │
//! │  │   │ Transactions  │    │ OrderRepo      │   │              │   │   │
//! │  │   │               │    │ SubscriptionRepo│  │              │   │   │
//! │  │   └───────────────┘    └────────────────┘   └──────────────┘   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   <data dir>/toolhub/toolhub.db                                │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (catalog, coupon, order, subscription)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use toolhub_db::{Database, DbConfig};
//! use toolhub_db::repository::order;
//!
//! let db = Database::new(DbConfig::new("path/to/toolhub.db")).await?;
//!
//! // Pool-backed read
//! let tools = db.catalog().list_tools().await?;
//!
//! // Several writes in one transaction
//! let mut tx = db.begin().await?;
//! order::insert_order(&mut tx, &new_order).await?;
//! tx.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::catalog::CatalogRepository;
pub use repository::coupon::CouponRepository;
pub use repository::order::OrderRepository;
pub use repository::subscription::SubscriptionRepository;
