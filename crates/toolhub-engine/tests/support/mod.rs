//! Shared fixture for the engine integration tests.
//!
//! Every fixture gets its own in-memory database and a clock pinned to
//! [`start`], so expected end dates are plain arithmetic.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use toolhub_core::order::CheckoutLine;
use toolhub_core::{
    Actor, BillingInterval, CouponRules, DiscountType, ItemRef, OrderStatus, Package,
    PackageStatus, PaymentMethod, Subscription, SubscriptionStatus, Tool, ToolStatus, Visibility,
};
use toolhub_db::Database;
use toolhub_engine::{
    CheckoutRequest, Engine, EngineConfig, FixedClock, NewCoupon, NewPackage, NewTool,
    OrderReceipt,
};

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 10, 9, 0, 0).unwrap()
}

pub fn days(n: i64) -> Duration {
    Duration::days(n)
}

pub struct Fixture {
    pub engine: Engine,
    pub clock: Arc<FixedClock>,
    pub admin: Actor,
}

impl Fixture {
    pub async fn new() -> Self {
        let mut config = EngineConfig::default();
        config.database.path = PathBuf::from(":memory:");

        let db = Database::new(config.db_config()).await.unwrap();
        let clock = Arc::new(FixedClock::new(start()));
        let engine = Engine::new(db, config, clock.clone());

        Fixture {
            engine,
            clock,
            admin: Actor::admin("admin-1"),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        use toolhub_engine::Clock;
        self.clock.now()
    }

    // -------------------------------------------------------------------------
    // Catalog
    // -------------------------------------------------------------------------

    pub async fn tool(&self, name: &str, price_cents: i64, interval: BillingInterval) -> Tool {
        let input = NewTool {
            name: name.to_string(),
            description: format!("{name} for marketers"),
            category: "seo".to_string(),
            url: Some(format!("https://tools.example.com/{}", name.to_lowercase().replace(' ', "-"))),
            price_cents,
            interval,
            visibility: Visibility::Public,
            status: ToolStatus::Active,
        };
        self.engine.catalog().create_tool(&self.admin, input).await.unwrap()
    }

    pub async fn package(
        &self,
        name: &str,
        price_cents: i64,
        interval: BillingInterval,
        tool_ids: Vec<String>,
    ) -> Package {
        let input = NewPackage {
            name: name.to_string(),
            price_cents,
            interval,
            is_trial: false,
            trial_duration_days: None,
            visibility: Visibility::Public,
            status: PackageStatus::Active,
            features: Vec::new(),
            tool_ids,
        };
        self.engine.catalog().create_package(&self.admin, input).await.unwrap()
    }

    pub async fn trial_package(&self, name: &str, trial_days: i64, tool_ids: Vec<String>) -> Package {
        let input = NewPackage {
            name: name.to_string(),
            price_cents: 1900,
            interval: BillingInterval::Yearly,
            is_trial: true,
            trial_duration_days: Some(trial_days),
            visibility: Visibility::Public,
            status: PackageStatus::Active,
            features: Vec::new(),
            tool_ids,
        };
        self.engine.catalog().create_package(&self.admin, input).await.unwrap()
    }

    pub async fn coupon(
        &self,
        code: &str,
        discount_type: DiscountType,
        discount_value: i64,
        usage_limit: Option<i64>,
        rules: CouponRules,
    ) {
        let input = NewCoupon {
            code: code.to_string(),
            discount_type,
            discount_value,
            expires_at: start() + days(90),
            usage_limit,
            rules,
        };
        self.engine.coupons().create_coupon(&self.admin, input).await.unwrap();
    }

    // -------------------------------------------------------------------------
    // Orders
    // -------------------------------------------------------------------------

    /// Paid offline checkout with a bank reference.
    pub fn request(&self, lines: Vec<CheckoutLine>, coupon: Option<&str>) -> CheckoutRequest {
        CheckoutRequest {
            lines,
            payment_method: PaymentMethod::Offline,
            payment_proof: Some("BANK-REF-0001".to_string()),
            coupon_code: coupon.map(str::to_string),
        }
    }

    pub async fn checkout(&self, actor: &Actor, item: ItemRef, period_count: i64) -> OrderReceipt {
        let request = self.request(vec![CheckoutLine::new(item, period_count)], None);
        self.engine.create_order(actor, request).await.unwrap()
    }

    pub async fn set_status(&self, order_id: &str, status: OrderStatus) {
        self.engine
            .set_order_status(&self.admin, order_id, status, None)
            .await
            .unwrap();
    }

    /// Places and approves a one-line order.
    pub async fn buy(&self, actor: &Actor, item: ItemRef, period_count: i64) -> OrderReceipt {
        let receipt = self.checkout(actor, item, period_count).await;
        self.set_status(&receipt.order_id, OrderStatus::Approved).await;
        receipt
    }

    // -------------------------------------------------------------------------
    // Subscriptions
    // -------------------------------------------------------------------------

    pub async fn subscriptions(&self, user_id: &str) -> Vec<Subscription> {
        self.engine
            .subscriptions()
            .list_user_subscriptions(&self.admin, user_id)
            .await
            .unwrap()
    }

    /// The newest subscription row for (user, item).
    pub async fn subscription(&self, user_id: &str, item: &ItemRef) -> Option<Subscription> {
        self.subscriptions(user_id)
            .await
            .into_iter()
            .filter(|s| &s.item() == item)
            .last()
    }

    pub async fn active_subscription(&self, user_id: &str, item: &ItemRef) -> Option<Subscription> {
        self.subscriptions(user_id)
            .await
            .into_iter()
            .find(|s| &s.item() == item && s.status == SubscriptionStatus::Active)
    }
}

pub fn customer(id: &str) -> Actor {
    Actor::user(id, format!("{id}@example.com"))
}
