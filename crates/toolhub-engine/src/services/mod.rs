//! # Services
//!
//! The operations the storefront and admin dashboard call.
//!
//! ## Transaction Boundaries
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Operation                    Transaction                               │
//! │  ─────────                    ───────────                               │
//! │  create_order                 resolve cart → coupon → insert order     │
//! │                               → consume coupon use → grant (if free)   │
//! │                                                                         │
//! │  set_order_status             read order → grant/revoke every line     │
//! │                               → versioned status update                │
//! │                                                                         │
//! │  create_tool / update_tool    write tool → sync shadow package         │
//! │                                                                         │
//! │  Any error before commit rolls the whole operation back.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Services never call pool-backed repository methods while holding a
//! transaction; inside a transaction everything goes through `&mut *tx`.

pub mod access;
pub mod catalog;
pub mod coupon;
pub mod entitlement;
pub mod order;
pub mod subscription;

use toolhub_core::Actor;

use crate::error::{ServiceError, ServiceResult};

/// Rejects callers without the admin role.
pub(crate) fn require_admin(actor: &Actor) -> ServiceResult<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(ServiceError::forbidden("Admin access required"))
    }
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
