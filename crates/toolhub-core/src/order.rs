//! # Order Pricing and Transitions
//!
//! Turns a resolved cart into money and decides what a status change means
//! for entitlements.
//!
//! ## Checkout Flow
//! ```text
//! CheckoutLine[] ──► catalog lookup ──► price_cart() ──► PricedCart.total
//!                                                            │
//!                                          coupon discount ──┤
//!                                                            ▼
//!                                                   settle_amounts()
//!                                                            │
//!                        initial_status(final, method) ◄─────┘
//!                        Approved when nothing is owed
//! ```
//!
//! ## Admin Transitions
//! ```text
//! ┌───────────────┬───────────────┬───────────────────────────────────────┐
//! │ from          │ to            │ plan                                  │
//! ├───────────────┼───────────────┼───────────────────────────────────────┤
//! │ X             │ X             │ NoOp     (double clicks are harmless) │
//! │ pending       │ approved      │ Grant                                 │
//! │ rejected      │ approved      │ Grant                                 │
//! │ approved      │ pending       │ Revoke                                │
//! │ approved      │ rejected      │ Revoke                                │
//! │ pending       │ rejected      │ Relabel                               │
//! │ rejected      │ pending       │ Relabel                               │
//! └───────────────┴───────────────┴───────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{ItemRef, OrderStatus, PaymentMethod, PurchasableItem};
use crate::validation::validate_period_count;

// =============================================================================
// Cart
// =============================================================================

/// One line of a checkout request, before any catalog lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutLine {
    pub item: ItemRef,
    pub period_count: i64,
}

impl CheckoutLine {
    pub fn new(item: ItemRef, period_count: i64) -> Self {
        CheckoutLine { item, period_count }
    }
}

/// Checks line count and period bounds before touching the catalog.
pub fn validate_cart_shape(
    lines: &[CheckoutLine],
    max_lines: usize,
    max_period_count: i64,
) -> CoreResult<()> {
    if lines.is_empty() {
        return Err(CoreError::EmptyCart);
    }
    if lines.len() > max_lines {
        return Err(CoreError::CartTooLarge { max: max_lines });
    }
    for line in lines {
        validate_period_count(line.period_count, max_period_count)?;
    }
    Ok(())
}

/// A cart line with its price fixed from the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub item: PurchasableItem,
    pub period_count: i64,
    pub unit_price: Money,
    pub line_total: Money,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,
    pub total: Money,
}

/// Prices resolved catalog items.
///
/// Prices always come from the catalog record, never from the client.
/// Fails if any item is not currently sold, or if a line or the cart total
/// overflows.
pub fn price_cart(items: Vec<(PurchasableItem, i64)>) -> CoreResult<PricedCart> {
    if items.is_empty() {
        return Err(CoreError::EmptyCart);
    }

    let mut lines = Vec::with_capacity(items.len());
    let mut total = Money::zero();
    for (item, period_count) in items {
        if !item.is_purchasable() {
            let item_ref = item.item_ref();
            return Err(CoreError::ItemNotPurchasable {
                kind: item_ref.kind,
                id: item_ref.id,
            });
        }
        let unit_price = item.price();
        let line_total = unit_price
            .checked_multiply_periods(period_count)
            .ok_or(CoreError::AmountOverflow)?;
        total = total.checked_add(line_total).ok_or(CoreError::AmountOverflow)?;
        lines.push(PricedLine {
            line_total,
            unit_price,
            period_count,
            item,
        });
    }

    Ok(PricedCart { lines, total })
}

// =============================================================================
// Settlement
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub total: Money,
    pub discount: Money,
    pub final_amount: Money,
}

/// Applies a discount to a total. The discount is clamped to `[0, total]`
/// so the final amount is never negative.
pub fn settle_amounts(total: Money, discount: Money) -> Settlement {
    let discount = discount.clamp(Money::zero(), total.max(Money::zero()));
    Settlement {
        total,
        discount,
        final_amount: total.saturating_sub_floor_zero(discount),
    }
}

/// Orders that owe nothing, or that were placed with the `free` method, are
/// approved on creation.
pub fn initial_status(final_amount: Money, method: PaymentMethod) -> OrderStatus {
    if final_amount.is_zero() || method == PaymentMethod::Free {
        OrderStatus::Approved
    } else {
        OrderStatus::Pending
    }
}

/// Payment method recorded on the order. Zero-cost orders are always `free`.
pub fn effective_payment_method(final_amount: Money, requested: PaymentMethod) -> PaymentMethod {
    if final_amount.is_zero() {
        PaymentMethod::Free
    } else {
        requested
    }
}

/// Checks that the chosen payment method can settle `final_amount`.
///
/// Zero-cost orders need nothing. Paid `free` and `offline` orders always
/// need proof; paid online orders need proof when `require_proof_for_online`
/// is set.
pub fn check_payment(
    final_amount: Money,
    method: PaymentMethod,
    proof: Option<&str>,
    require_proof_for_online: bool,
) -> CoreResult<()> {
    if final_amount.is_zero() {
        return Ok(());
    }

    let needs_proof = match method {
        PaymentMethod::Free | PaymentMethod::Offline => true,
        PaymentMethod::Online => require_proof_for_online,
    };

    let has_proof = proof.map(|p| !p.trim().is_empty()).unwrap_or(false);
    if needs_proof && !has_proof {
        return Err(CoreError::PaymentProofRequired);
    }
    Ok(())
}

// =============================================================================
// Transitions
// =============================================================================

/// What a status change does to entitlements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPlan {
    /// Same status requested again.
    NoOp,
    /// Entering `Approved`: grant every line.
    Grant,
    /// Leaving `Approved`: revoke every line.
    Revoke,
    /// Between `Pending` and `Rejected`: status only.
    Relabel,
}

pub fn plan_transition(current: OrderStatus, requested: OrderStatus) -> TransitionPlan {
    match (current, requested) {
        (a, b) if a == b => TransitionPlan::NoOp,
        (_, OrderStatus::Approved) => TransitionPlan::Grant,
        (OrderStatus::Approved, _) => TransitionPlan::Revoke,
        _ => TransitionPlan::Relabel,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::*;
    use chrono::Utc;

    fn tool(id: &str, price_cents: i64, status: ToolStatus) -> PurchasableItem {
        PurchasableItem::Tool(Tool {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            category: String::new(),
            url: None,
            price_cents,
            interval: BillingInterval::Monthly,
            visibility: Visibility::Public,
            status,
            package_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
    }

    #[test]
    fn test_price_cart_multiplies_periods() {
        let cart = price_cart(vec![
            (tool("a", 1299, ToolStatus::Active), 3),
            (tool("b", 500, ToolStatus::Active), 1),
        ])
        .unwrap();
        assert_eq!(cart.lines[0].line_total.cents(), 3897);
        assert_eq!(cart.total.cents(), 4397);
    }

    #[test]
    fn test_price_cart_rejects_overflowing_amounts() {
        let huge = i64::MAX / 2;
        let err = price_cart(vec![(tool("a", huge, ToolStatus::Active), 3)]).unwrap_err();
        assert!(matches!(err, CoreError::AmountOverflow));

        // Each line fits, the sum does not
        let err = price_cart(vec![
            (tool("a", huge, ToolStatus::Active), 1),
            (tool("b", huge, ToolStatus::Active), 1),
            (tool("c", huge, ToolStatus::Active), 1),
        ])
        .unwrap_err();
        assert!(matches!(err, CoreError::AmountOverflow));
    }

    #[test]
    fn test_price_cart_rejects_unsellable_items() {
        let err = price_cart(vec![(tool("a", 100, ToolStatus::Inactive), 1)]).unwrap_err();
        assert!(matches!(err, CoreError::ItemNotPurchasable { .. }));
        assert!(matches!(price_cart(vec![]), Err(CoreError::EmptyCart)));
    }

    #[test]
    fn test_cart_shape() {
        let line = CheckoutLine::new(ItemRef::tool("a"), 1);
        assert!(validate_cart_shape(&[line.clone()], 50, 36).is_ok());
        assert!(matches!(
            validate_cart_shape(&[], 50, 36),
            Err(CoreError::EmptyCart)
        ));
        assert!(matches!(
            validate_cart_shape(&vec![line; 3], 2, 36),
            Err(CoreError::CartTooLarge { max: 2 })
        ));
        let zero = CheckoutLine::new(ItemRef::tool("a"), 0);
        assert!(matches!(
            validate_cart_shape(&[zero], 50, 36),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_settlement_never_negative() {
        let s = settle_amounts(Money::from_cents(1000), Money::from_cents(1500));
        assert_eq!(s.discount.cents(), 1000);
        assert!(s.final_amount.is_zero());

        let s = settle_amounts(Money::from_cents(1000), Money::from_cents(250));
        assert_eq!(s.final_amount.cents(), 750);
    }

    #[test]
    fn test_initial_status() {
        assert_eq!(
            initial_status(Money::zero(), PaymentMethod::Offline),
            OrderStatus::Approved
        );
        assert_eq!(
            initial_status(Money::from_cents(100), PaymentMethod::Online),
            OrderStatus::Pending
        );
        assert_eq!(
            initial_status(Money::from_cents(100), PaymentMethod::Free),
            OrderStatus::Approved
        );
        assert_eq!(
            effective_payment_method(Money::zero(), PaymentMethod::Online),
            PaymentMethod::Free
        );
    }

    #[test]
    fn test_check_payment() {
        let owed = Money::from_cents(500);
        assert!(check_payment(Money::zero(), PaymentMethod::Offline, None, true).is_ok());
        assert!(matches!(
            check_payment(owed, PaymentMethod::Free, None, true),
            Err(CoreError::PaymentProofRequired)
        ));
        assert!(check_payment(owed, PaymentMethod::Free, Some("TX-9"), true).is_ok());
        assert!(matches!(
            check_payment(owed, PaymentMethod::Offline, Some("   "), true),
            Err(CoreError::PaymentProofRequired)
        ));
        assert!(check_payment(owed, PaymentMethod::Offline, Some("TX-1"), true).is_ok());
        assert!(check_payment(owed, PaymentMethod::Online, None, false).is_ok());
        assert!(check_payment(owed, PaymentMethod::Online, None, true).is_err());
    }

    #[test]
    fn test_transition_table() {
        use OrderStatus::*;
        assert_eq!(plan_transition(Approved, Approved), TransitionPlan::NoOp);
        assert_eq!(plan_transition(Pending, Approved), TransitionPlan::Grant);
        assert_eq!(plan_transition(Rejected, Approved), TransitionPlan::Grant);
        assert_eq!(plan_transition(Approved, Rejected), TransitionPlan::Revoke);
        assert_eq!(plan_transition(Approved, Pending), TransitionPlan::Revoke);
        assert_eq!(plan_transition(Pending, Rejected), TransitionPlan::Relabel);
        assert_eq!(plan_transition(Rejected, Pending), TransitionPlan::Relabel);
    }
}
