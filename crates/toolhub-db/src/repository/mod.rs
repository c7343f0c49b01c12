//! # Repository Module
//!
//! Database repository implementations for ToolHub.
//!
//! ## Two Ways In
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Pool-backed methods                  Connection-level functions        │
//! │  ────────────────────                 ──────────────────────────        │
//! │  db.orders().get_by_id(id)            order::fetch_order(&mut *tx, id)  │
//! │  db.catalog().list_tools()            catalog::insert_tool(&mut *tx, t) │
//! │                                                                         │
//! │  One statement, own connection.       Compose many statements inside   │
//! │  Dashboard reads.                     one service transaction.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Pool-backed methods delegate to the connection-level functions, so each
//! query is written once.
//!
//! ## Available Repositories
//!
//! - [`catalog::CatalogRepository`] - Tools, packages, membership
//! - [`coupon::CouponRepository`] - Coupons and usage counting
//! - [`order::OrderRepository`] - Orders, lines, versioned status updates
//! - [`subscription::SubscriptionRepository`] - Subscriptions and the grant ledger

pub mod catalog;
pub mod coupon;
pub mod order;
pub mod subscription;
