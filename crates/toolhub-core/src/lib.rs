//! # toolhub-core: Pure Settlement Logic for ToolHub
//!
//! This crate holds every rule that decides what a customer pays and what
//! they get in return. Nothing in here touches a database, the network or
//! the system clock.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        ToolHub Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 toolhub-engine (services)                       │   │
//! │  │   create_order, set_order_status, validate_coupon, access      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ toolhub-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌───────────┐ ┌────────┐ │   │
//! │  │   │  types  │ │ coupon  │ │  order  │ │entitlement│ │ access │ │   │
//! │  │   │ Tool    │ │validate │ │ pricing │ │ durations │ │ merge  │ │   │
//! │  │   │ Package │ │discount │ │ plans   │ │ windows   │ │        │ │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └───────────┘ └────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                toolhub-db (Database Layer)                      │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Catalog, order, subscription and coupon records
//! - [`money`] - Integer cents arithmetic
//! - [`coupon`] - Coupon eligibility and discount computation
//! - [`order`] - Cart pricing, settlement and status transition planning
//! - [`entitlement`] - Grant durations and subscription window arithmetic
//! - [`access`] - Merging subscriptions into a per-tool access map
//! - [`validation`] - Input checks shared by the services
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use toolhub_core::money::Money;
//! use toolhub_core::order::settle_amounts;
//!
//! let settlement = settle_amounts(Money::from_cents(1000), Money::from_cents(1500));
//! assert!(settlement.final_amount.is_zero());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod access;
pub mod coupon;
pub mod entitlement;
pub mod error;
pub mod money;
pub mod order;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, CouponRejection, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default maximum number of lines accepted in one checkout.
pub const MAX_CART_LINES: usize = 50;

/// Default maximum number of billing periods bought on a single line.
///
/// ## Business Reason
/// Three years of monthly billing is the longest plan sold up front.
pub const MAX_PERIOD_COUNT: i64 = 36;

/// Maximum length of tool and package names (matches the admin form limit).
pub const MAX_NAME_LENGTH: usize = 60;

/// Maximum length of a coupon code after normalization.
pub const MAX_COUPON_CODE_LENGTH: usize = 32;

/// Basis points that make up 100%.
pub const FULL_PERCENT_BPS: i64 = 10_000;
