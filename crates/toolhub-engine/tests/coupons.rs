//! Coupon redemption through checkout: usage limits, targeting and the
//! all-or-nothing guarantee.

mod support;

use support::{customer, days, Fixture};
use toolhub_core::order::CheckoutLine;
use toolhub_core::{
    BillingInterval, CouponRules, CouponStatus, DiscountType, OrderStatus, PaymentMethod, UserType,
};
use toolhub_engine::ErrorCode;

#[tokio::test]
async fn usage_limit_counts_orders_even_when_rejected() {
    let fx = Fixture::new().await;
    let tool = fx.tool("Rank Tracker", 1000, BillingInterval::Monthly).await;
    fx.coupon("TWICE", DiscountType::Percentage, 1000, Some(2), CouponRules::default()).await;
    let lines = vec![CheckoutLine::new(tool.item_ref(), 1)];

    let first = fx
        .engine
        .create_order(&customer("u1"), fx.request(lines.clone(), Some("TWICE")))
        .await
        .unwrap();
    fx.engine
        .create_order(&customer("u2"), fx.request(lines.clone(), Some("TWICE")))
        .await
        .unwrap();

    // Known quirk: a use is spent at creation, so rejecting does not refund it
    fx.set_status(&first.order_id, OrderStatus::Rejected).await;

    let err = fx
        .engine
        .validate_coupon("TWICE", Some(&customer("u3")), &lines)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::CouponRejected);
    assert_eq!(err.message, "Coupon usage limit reached");

    let err = fx
        .engine
        .create_order(&customer("u3"), fx.request(lines, Some("TWICE")))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::CouponRejected);

    let coupons = fx.engine.coupons().list_coupons(&fx.admin).await.unwrap();
    assert_eq!(coupons[0].used_count, 2);
}

#[tokio::test]
async fn failed_checkout_spends_no_coupon_use() {
    let fx = Fixture::new().await;
    let tool = fx.tool("Rank Tracker", 1000, BillingInterval::Monthly).await;
    fx.coupon("ONCE", DiscountType::Flat, 200, Some(1), CouponRules::default()).await;

    let mut request = fx.request(vec![CheckoutLine::new(tool.item_ref(), 1)], Some("ONCE"));
    request.payment_proof = None;
    assert!(fx.engine.create_order(&customer("u1"), request).await.is_err());

    let coupons = fx.engine.coupons().list_coupons(&fx.admin).await.unwrap();
    assert_eq!(coupons[0].used_count, 0);
    assert!(fx.engine.orders().list_orders(&fx.admin).await.unwrap().is_empty());
}

#[tokio::test]
async fn full_discount_makes_the_order_free() {
    let fx = Fixture::new().await;
    let tool = fx.tool("Rank Tracker", 1000, BillingInterval::Monthly).await;
    fx.coupon("ONUS", DiscountType::Percentage, 10_000, None, CouponRules::default()).await;
    let user = customer("u1");

    let mut request = fx.request(vec![CheckoutLine::new(tool.item_ref(), 2)], Some("onus"));
    request.payment_proof = None;
    let receipt = fx.engine.create_order(&user, request).await.unwrap();

    assert_eq!(receipt.discount.cents(), 2000);
    assert!(receipt.final_amount.is_zero());
    assert_eq!(receipt.status, OrderStatus::Approved);

    let order = fx.engine.orders().get_order(&user, &receipt.order_id).await.unwrap();
    assert_eq!(order.payment_method, PaymentMethod::Free);
    assert!(order.coupon_id.is_some());

    let sub = fx.active_subscription("u1", &tool.item_ref()).await.unwrap();
    assert_eq!(sub.end_date, fx.now() + days(60));
}

#[tokio::test]
async fn flat_discount_never_goes_below_zero() {
    let fx = Fixture::new().await;
    let tool = fx.tool("Cheap Tool", 300, BillingInterval::Monthly).await;
    fx.coupon("BIGFLAT", DiscountType::Flat, 5000, None, CouponRules::default()).await;

    let quote = fx
        .engine
        .validate_coupon("BIGFLAT", None, &[CheckoutLine::new(tool.item_ref(), 1)])
        .await
        .unwrap();
    assert_eq!(quote.discount_cents, 300);
    assert_eq!(quote.cart_total_cents, 300);
}

#[tokio::test]
async fn new_user_coupon_stops_after_first_subscription() {
    let fx = Fixture::new().await;
    let tool = fx.tool("Rank Tracker", 1000, BillingInterval::Monthly).await;
    let rules = CouponRules {
        user_type: UserType::New,
        ..CouponRules::default()
    };
    fx.coupon("WELCOME", DiscountType::Percentage, 2000, None, rules).await;
    let user = customer("u1");
    let lines = vec![CheckoutLine::new(tool.item_ref(), 1)];

    let quote = fx.engine.validate_coupon("WELCOME", Some(&user), &lines).await.unwrap();
    assert_eq!(quote.discount_cents, 200);

    fx.buy(&user, tool.item_ref(), 1).await;

    let err = fx
        .engine
        .validate_coupon("WELCOME", Some(&user), &lines)
        .await
        .unwrap_err();
    assert_eq!(err.message, "Coupon valid for new users only");
}

#[tokio::test]
async fn tool_targeted_coupon_matches_packages_containing_the_tool() {
    let fx = Fixture::new().await;
    let target = fx.tool("Target", 1000, BillingInterval::Monthly).await;
    let other = fx.tool("Other", 1000, BillingInterval::Monthly).await;
    let bundle = fx
        .package("Bundle", 1500, BillingInterval::Monthly, vec![target.id.clone(), other.id.clone()])
        .await;

    let mut rules = CouponRules::default();
    rules.specific_tools.insert(target.id.clone());
    fx.coupon("TARGETED", DiscountType::Flat, 100, None, rules).await;

    let err = fx
        .engine
        .validate_coupon("TARGETED", None, &[CheckoutLine::new(other.item_ref(), 1)])
        .await
        .unwrap_err();
    assert_eq!(err.message, "Coupon not applicable to items in cart");

    assert!(fx
        .engine
        .validate_coupon("TARGETED", None, &[CheckoutLine::new(bundle.item_ref(), 1)])
        .await
        .is_ok());
}

#[tokio::test]
async fn expired_and_inactive_coupons_are_rejected_at_checkout() {
    let fx = Fixture::new().await;
    let tool = fx.tool("Rank Tracker", 1000, BillingInterval::Monthly).await;
    fx.coupon("SOON", DiscountType::Flat, 100, None, CouponRules::default()).await;
    fx.coupon("OFF", DiscountType::Flat, 100, None, CouponRules::default()).await;
    let lines = vec![CheckoutLine::new(tool.item_ref(), 1)];

    let off = fx
        .engine
        .coupons()
        .list_coupons(&fx.admin)
        .await
        .unwrap()
        .into_iter()
        .find(|c| c.code == "OFF")
        .unwrap();
    fx.engine
        .coupons()
        .set_coupon_status(&fx.admin, &off.id, CouponStatus::Inactive)
        .await
        .unwrap();
    let err = fx
        .engine
        .create_order(&customer("u1"), fx.request(lines.clone(), Some("OFF")))
        .await
        .unwrap_err();
    assert_eq!(err.message, "Coupon is inactive");

    fx.clock.advance(days(91));
    let err = fx
        .engine
        .create_order(&customer("u1"), fx.request(lines, Some("SOON")))
        .await
        .unwrap_err();
    assert_eq!(err.message, "Coupon has expired");
}

#[tokio::test]
async fn unknown_and_malformed_codes_read_as_invalid() {
    let fx = Fixture::new().await;
    let tool = fx.tool("Rank Tracker", 1000, BillingInterval::Monthly).await;
    let lines = vec![CheckoutLine::new(tool.item_ref(), 1)];

    for code in ["NOSUCH", "bad code!"] {
        let err = fx
            .engine
            .create_order(&customer("u1"), fx.request(lines.clone(), Some(code)))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::CouponRejected);
        assert_eq!(err.message, "Invalid coupon code");
    }

    // Blank code is no coupon at all
    let receipt = fx
        .engine
        .create_order(&customer("u1"), fx.request(lines, Some("  ")))
        .await
        .unwrap();
    assert_eq!(receipt.discount.cents(), 0);
}
