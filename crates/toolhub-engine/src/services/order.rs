//! # Order Service
//!
//! Checkout and the admin approval workflow.
//!
//! ## Checkout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  validate_cart_shape        (no I/O)                                    │
//! │         │                                                               │
//! │  BEGIN  ▼                                                               │
//! │  resolve_cart ─────────► every line must be a sellable catalog item    │
//! │         │                                                               │
//! │  evaluate_coupon ──────► full rule check, never trusts a prior quote   │
//! │         │                                                               │
//! │  settle + check_payment ► proof for every paid order                   │
//! │         │                                                               │
//! │  insert_order, consume coupon use                                       │
//! │         │                                                               │
//! │  $0 or `free`? ────────► approved at creation, grant every line        │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Any failure drops the transaction: no order, no coupon use, no grant.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{debug, info};

use toolhub_core::coupon::compute_discount;
use toolhub_core::order::{
    check_payment, effective_payment_method, initial_status, plan_transition, price_cart,
    settle_amounts, validate_cart_shape, CheckoutLine, PricedCart, TransitionPlan,
};
use toolhub_core::{
    Actor, CoreError, CouponRejection, Money, Order, OrderLine, OrderStatus, PaymentMethod,
};
use toolhub_db::repository::{catalog, coupon, order};
use toolhub_db::Database;

use crate::clock::Clock;
use crate::config::OrderSettings;
use crate::error::{ServiceError, ServiceResult};
use crate::services::coupon::{evaluate_coupon, parse_code};
use crate::services::entitlement::EntitlementEngine;
use crate::services::{new_id, require_admin};

// =============================================================================
// Requests and Receipts
// =============================================================================

/// What the storefront submits at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub lines: Vec<CheckoutLine>,
    pub payment_method: PaymentMethod,
    /// Bank reference, receipt number or screenshot URL.
    #[serde(default)]
    pub payment_proof: Option<String>,
    #[serde(default)]
    pub coupon_code: Option<String>,
}

/// Returned to the customer after a successful checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderReceipt {
    pub order_id: String,
    pub status: OrderStatus,
    pub total: Money,
    pub discount: Money,
    #[serde(rename = "final")]
    pub final_amount: Money,
}

impl From<&Order> for OrderReceipt {
    fn from(order: &Order) -> Self {
        OrderReceipt {
            order_id: order.id.clone(),
            status: order.status,
            total: order.total(),
            discount: order.discount(),
            final_amount: order.final_amount(),
        }
    }
}

// =============================================================================
// Cart Resolution
// =============================================================================

/// Looks every line up in the catalog and prices the cart.
pub(crate) async fn resolve_cart(
    conn: &mut SqliteConnection,
    lines: &[CheckoutLine],
) -> ServiceResult<PricedCart> {
    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        let item = catalog::find_item(conn, &line.item)
            .await?
            .ok_or_else(|| CoreError::ItemNotFound {
                kind: line.item.kind,
                id: line.item.id.clone(),
            })?;
        items.push((item, line.period_count));
    }
    Ok(price_cart(items)?)
}

fn build_lines(order_id: &str, cart: &PricedCart) -> Vec<OrderLine> {
    cart.lines
        .iter()
        .map(|line| {
            let item = line.item.item_ref();
            OrderLine {
                id: new_id(),
                order_id: order_id.to_string(),
                item_kind: item.kind,
                item_id: item.id,
                name_snapshot: line.item.name().to_string(),
                period_count: line.period_count,
                unit_price_cents: line.unit_price.cents(),
                line_total_cents: line.line_total.cents(),
            }
        })
        .collect()
}

// =============================================================================
// Order Service
// =============================================================================

#[derive(Debug, Clone)]
pub struct OrderService {
    db: Database,
    clock: Arc<dyn Clock>,
    entitlements: EntitlementEngine,
    settings: OrderSettings,
}

impl OrderService {
    pub fn new(
        db: Database,
        clock: Arc<dyn Clock>,
        entitlements: EntitlementEngine,
        settings: OrderSettings,
    ) -> Self {
        OrderService {
            db,
            clock,
            entitlements,
            settings,
        }
    }

    /// Places an order for the calling user.
    ///
    /// Orders that owe nothing, or that were placed with the `free` payment
    /// method, are approved and granted immediately; the rest wait for an
    /// admin.
    pub async fn create_order(
        &self,
        actor: &Actor,
        request: CheckoutRequest,
    ) -> ServiceResult<OrderReceipt> {
        validate_cart_shape(
            &request.lines,
            self.settings.max_cart_lines,
            self.settings.max_period_count,
        )?;
        let code = parse_code(request.coupon_code.as_deref())?;
        let now = self.clock.now();

        let mut tx = self.db.begin().await?;

        let cart = resolve_cart(&mut tx, &request.lines).await?;

        let applied = match code.as_deref() {
            Some(code) => Some(evaluate_coupon(&mut tx, code, Some(actor), &cart, now).await?),
            None => None,
        };
        let discount = applied
            .as_ref()
            .map(|c| compute_discount(c, cart.total))
            .unwrap_or_else(Money::zero);
        let settlement = settle_amounts(cart.total, discount);

        let proof = request
            .payment_proof
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        check_payment(
            settlement.final_amount,
            request.payment_method,
            proof.as_deref(),
            self.settings.require_proof_for_online,
        )?;

        let payment_method = effective_payment_method(settlement.final_amount, request.payment_method);
        let status = initial_status(settlement.final_amount, payment_method);

        let order_id = new_id();
        let order = Order {
            lines: build_lines(&order_id, &cart),
            id: order_id,
            user_id: actor.user_id.clone(),
            total_cents: settlement.total.cents(),
            discount_cents: settlement.discount.cents(),
            final_cents: settlement.final_amount.cents(),
            payment_method,
            payment_proof: proof,
            coupon_id: applied.as_ref().map(|c| c.id.clone()),
            status,
            admin_note: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        order::insert_order(&mut tx, &order).await?;

        if let Some(applied) = &applied {
            // Another checkout may have taken the last use since validation
            if !coupon::try_consume_use(&mut tx, &applied.id).await? {
                return Err(CouponRejection::UsageLimitReached {
                    limit: applied.usage_limit.unwrap_or(0),
                }
                .into());
            }
        }

        if status == OrderStatus::Approved {
            self.entitlements.grant_order(&mut tx, &order, now).await?;
        }

        tx.commit().await?;

        info!(
            order_id = %order.id,
            user_id = %order.user_id,
            lines = order.lines.len(),
            total = %settlement.total,
            discount = %settlement.discount,
            final_amount = %settlement.final_amount,
            status = %order.status,
            coupon = ?code,
            "Order created"
        );

        Ok(OrderReceipt::from(&order))
    }

    /// Moves an order to `status`, granting or revoking entitlements when
    /// the move crosses `Approved`.
    ///
    /// Requesting the current status changes nothing.
    pub async fn set_order_status(
        &self,
        actor: &Actor,
        order_id: &str,
        status: OrderStatus,
        admin_note: Option<String>,
    ) -> ServiceResult<Order> {
        require_admin(actor)?;
        let now = self.clock.now();

        let mut tx = self.db.begin().await?;
        let mut current = order::fetch_order(&mut tx, order_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", order_id))?;

        let plan = plan_transition(current.status, status);
        debug!(order_id = %order_id, from = %current.status, to = %status, plan = ?plan, "Planning order transition");

        match plan {
            TransitionPlan::NoOp => return Ok(current),
            TransitionPlan::Grant => {
                self.entitlements.grant_order(&mut tx, &current, now).await?;
            }
            TransitionPlan::Revoke => {
                self.entitlements.revoke_order(&mut tx, &current, now).await?;
            }
            TransitionPlan::Relabel => {}
        }

        let note = admin_note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());
        let updated =
            order::update_status(&mut tx, order_id, current.version, status, note, now).await?;
        if !updated {
            return Err(ServiceError::invalid_transition(format!(
                "Order {} was changed by someone else; reload and try again",
                order_id
            )));
        }

        tx.commit().await?;

        let previous = current.status;
        current.status = status;
        current.version += 1;
        current.updated_at = now;
        if let Some(note) = note {
            current.admin_note = Some(note.to_string());
        }

        info!(
            order_id = %order_id,
            admin = %actor.user_id,
            from = %previous,
            to = %status,
            version = current.version,
            "Order status changed"
        );

        Ok(current)
    }

    /// Admins see any order; users only their own.
    pub async fn get_order(&self, actor: &Actor, order_id: &str) -> ServiceResult<Order> {
        let order = self
            .db
            .orders()
            .get_by_id(order_id)
            .await?
            .filter(|o| actor.is_admin() || o.user_id == actor.user_id)
            .ok_or_else(|| ServiceError::not_found("Order", order_id))?;
        Ok(order)
    }

    /// Every order, newest first.
    pub async fn list_orders(&self, actor: &Actor) -> ServiceResult<Vec<Order>> {
        require_admin(actor)?;
        Ok(self.db.orders().list().await?)
    }

    /// The caller's own orders, newest first.
    pub async fn list_user_orders(&self, actor: &Actor) -> ServiceResult<Vec<Order>> {
        Ok(self.db.orders().list_for_user(&actor.user_id).await?)
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
    use chrono::{DateTime, TimeZone, Utc};
    use toolhub_core::entitlement::DurationPolicy;
    use toolhub_core::{BillingInterval, ItemRef, Tool, ToolStatus, Visibility};
    use toolhub_db::DbConfig;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap()
    }

    async fn service() -> (Database, OrderService) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let service = OrderService::new(
            db.clone(),
            Arc::new(FixedClock::new(now())),
            EntitlementEngine::new(DurationPolicy::default()),
            OrderSettings::default(),
        );
        (db, service)
    }

    async fn add_tool(db: &Database, id: &str, price_cents: i64, status: ToolStatus) {
        let tool = Tool {
            id: id.to_string(),
            name: format!("Tool {id}"),
            description: String::new(),
            category: String::new(),
            url: None,
            price_cents,
            interval: BillingInterval::Monthly,
            visibility: Visibility::Public,
            status,
            package_id: None,
            created_at: now(),
            updated_at: now(),
        };
        let mut conn = db.pool().acquire().await.unwrap();
        catalog::insert_tool(&mut conn, &tool).await.unwrap();
    }

    fn request(lines: Vec<CheckoutLine>, method: PaymentMethod, proof: Option<&str>) -> CheckoutRequest {
        CheckoutRequest {
            lines,
            payment_method: method,
            payment_proof: proof.map(str::to_string),
            coupon_code: None,
        }
    }

    #[tokio::test]
    async fn test_paid_order_waits_for_approval() {
        let (db, service) = service().await;
        add_tool(&db, "t1", 1000, ToolStatus::Active).await;

        let receipt = service
            .create_order(
                &Actor::user("u1", "u1@example.com"),
                request(vec![CheckoutLine::new(ItemRef::tool("t1"), 2)], PaymentMethod::Offline, Some("TX-1")),
            )
            .await
            .unwrap();

        assert_eq!(receipt.status, OrderStatus::Pending);
        assert_eq!(receipt.total.cents(), 2000);
        assert_eq!(receipt.final_amount.cents(), 2000);
        assert!(db.subscriptions().list_for_user("u1").await.unwrap().is_empty());

        let stored = db.orders().get_by_id(&receipt.order_id).await.unwrap().unwrap();
        assert_eq!(stored.lines[0].name_snapshot, "Tool t1");
        assert_eq!(stored.payment_proof.as_deref(), Some("TX-1"));
    }

    #[tokio::test]
    async fn test_unknown_item_rejected_without_writes() {
        let (db, service) = service().await;
        add_tool(&db, "t1", 1000, ToolStatus::Active).await;

        let err = service
            .create_order(
                &Actor::user("u1", "u1@example.com"),
                request(
                    vec![
                        CheckoutLine::new(ItemRef::tool("t1"), 1),
                        CheckoutLine::new(ItemRef::package("missing"), 1),
                    ],
                    PaymentMethod::Offline,
                    Some("TX-1"),
                ),
            )
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::ValidationError);
        assert!(db.orders().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_inactive_tool_not_sold() {
        let (db, service) = service().await;
        add_tool(&db, "t1", 1000, ToolStatus::Inactive).await;

        let err = service
            .create_order(
                &Actor::user("u1", "u1@example.com"),
                request(vec![CheckoutLine::new(ItemRef::tool("t1"), 1)], PaymentMethod::Offline, Some("TX")),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_period_count_bounds() {
        let (db, service) = service().await;
        add_tool(&db, "t1", 1000, ToolStatus::Active).await;
        let actor = Actor::user("u1", "u1@example.com");

        for periods in [0, 37] {
            let err = service
                .create_order(
                    &actor,
                    request(vec![CheckoutLine::new(ItemRef::tool("t1"), periods)], PaymentMethod::Offline, Some("TX")),
                )
                .await
                .unwrap_err();
            assert_eq!(err.code, ErrorCode::ValidationError);
        }
    }

    #[tokio::test]
    async fn test_status_change_requires_admin() {
        let (db, service) = service().await;
        add_tool(&db, "t1", 1000, ToolStatus::Active).await;
        let user = Actor::user("u1", "u1@example.com");
        let receipt = service
            .create_order(
                &user,
                request(vec![CheckoutLine::new(ItemRef::tool("t1"), 1)], PaymentMethod::Offline, Some("TX")),
            )
            .await
            .unwrap();

        let err = service
            .set_order_status(&user, &receipt.order_id, OrderStatus::Approved, None)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Forbidden);
    }

    #[tokio::test]
    async fn test_unknown_order_not_found() {
        let (_db, service) = service().await;
        let err = service
            .set_order_status(&Actor::admin("a1"), "nope", OrderStatus::Approved, None)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_users_only_see_their_orders() {
        let (db, service) = service().await;
        add_tool(&db, "t1", 1000, ToolStatus::Active).await;
        let owner = Actor::user("u1", "u1@example.com");
        let receipt = service
            .create_order(
                &owner,
                request(vec![CheckoutLine::new(ItemRef::tool("t1"), 1)], PaymentMethod::Offline, Some("TX")),
            )
            .await
            .unwrap();

        assert!(service.get_order(&owner, &receipt.order_id).await.is_ok());
        assert!(service.get_order(&Actor::admin("a1"), &receipt.order_id).await.is_ok());
        let err = service
            .get_order(&Actor::user("u2", "u2@example.com"), &receipt.order_id)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(service.list_user_orders(&owner).await.unwrap().len(), 1);
        assert!(service.list_orders(&owner).await.is_err());
    }
}
