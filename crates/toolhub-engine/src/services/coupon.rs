//! # Coupon Service
//!
//! Storefront coupon checks and the admin coupon screen.
//!
//! ```text
//! code ──► normalize ──► lookup ──► history? ──► core::coupon::validate
//!           (trim,        by code    only when      │
//!            upper)                  user_type      ├── Ok  → CouponQuote
//!                                    != all         └── Err → CouponRejected
//! ```
//!
//! The same evaluation runs again inside `create_order`, so a quote shown
//! on the storefront is never trusted at checkout.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{debug, info};

use toolhub_core::coupon::{needs_history, validate, CouponQuote, SubscriptionHistory};
use toolhub_core::order::{validate_cart_shape, CheckoutLine, PricedCart};
use toolhub_core::validation::{normalize_coupon_code, normalize_email, validate_discount_value};
use toolhub_core::{
    Actor, Coupon, CouponRejection, CouponRules, CouponStatus, DiscountType, ValidationError,
};
use toolhub_db::repository::{coupon, subscription};
use toolhub_db::Database;

use crate::clock::Clock;
use crate::config::OrderSettings;
use crate::error::{ServiceError, ServiceResult};
use crate::services::order::resolve_cart;
use crate::services::{new_id, require_admin};

/// Normalizes an optional coupon code from a request.
///
/// A blank code means no coupon. A code that cannot be normalized can
/// never match a stored coupon, so it is reported as unknown.
pub(crate) fn parse_code(code: Option<&str>) -> ServiceResult<Option<String>> {
    match code.map(str::trim).filter(|c| !c.is_empty()) {
        None => Ok(None),
        Some(raw) => normalize_coupon_code(raw)
            .map(Some)
            .map_err(|_| CouponRejection::NotFound.into()),
    }
}

/// Loads a coupon by normalized code and runs every eligibility rule.
pub(crate) async fn evaluate_coupon(
    conn: &mut SqliteConnection,
    code: &str,
    actor: Option<&Actor>,
    cart: &PricedCart,
    now: DateTime<Utc>,
) -> ServiceResult<Coupon> {
    let found = coupon::fetch_by_code(conn, code)
        .await?
        .ok_or(CouponRejection::NotFound)?;

    let history = match actor {
        Some(actor) if needs_history(&found) => {
            let subs = subscription::list_for_user(conn, &actor.user_id).await?;
            SubscriptionHistory::from_subscriptions(&subs, now)
        }
        _ => SubscriptionHistory::default(),
    };

    if let Err(rejection) = validate(&found, actor, &history, cart, now) {
        debug!(
            code = %code,
            reason = rejection.reason_code(),
            user_id = ?actor.map(|a| a.user_id.as_str()),
            "Coupon rejected"
        );
        return Err(rejection.into());
    }

    Ok(found)
}

// =============================================================================
// Admin Input
// =============================================================================

/// Fields an admin fills in when creating a coupon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCoupon {
    pub code: String,
    pub discount_type: DiscountType,
    /// Basis points for percentage coupons, cents for flat ones.
    pub discount_value: i64,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub usage_limit: Option<i64>,
    #[serde(default)]
    pub rules: CouponRules,
}

// =============================================================================
// Coupon Service
// =============================================================================

#[derive(Debug, Clone)]
pub struct CouponService {
    db: Database,
    clock: Arc<dyn Clock>,
    settings: OrderSettings,
}

impl CouponService {
    pub fn new(db: Database, clock: Arc<dyn Clock>, settings: OrderSettings) -> Self {
        CouponService { db, clock, settings }
    }

    /// Checks a coupon against a cart without placing an order.
    ///
    /// Anonymous visitors pass `None`; coupons aimed at a user type then
    /// fail with `LoginRequired`.
    pub async fn validate_coupon(
        &self,
        code: &str,
        actor: Option<&Actor>,
        lines: &[CheckoutLine],
    ) -> ServiceResult<CouponQuote> {
        let code = parse_code(Some(code))?.ok_or(CouponRejection::NotFound)?;
        validate_cart_shape(lines, self.settings.max_cart_lines, self.settings.max_period_count)?;
        let now = self.clock.now();

        let mut conn = self.db.pool().acquire().await?;
        let cart = resolve_cart(&mut conn, lines).await?;
        let found = evaluate_coupon(&mut conn, &code, actor, &cart, now).await?;

        let quote = CouponQuote::new(&found, &cart);
        debug!(code = %quote.code, discount_cents = quote.discount_cents, "Coupon quoted");
        Ok(quote)
    }

    pub async fn create_coupon(&self, actor: &Actor, input: NewCoupon) -> ServiceResult<Coupon> {
        require_admin(actor)?;

        let code = normalize_coupon_code(&input.code)?;
        validate_discount_value(input.discount_type, input.discount_value)?;
        if let Some(limit) = input.usage_limit {
            if limit <= 0 {
                return Err(ValidationError::MustBePositive {
                    field: "usage_limit".to_string(),
                }
                .into());
            }
        }
        if input.rules.min_order_cents < 0 {
            return Err(ValidationError::MustNotBeNegative {
                field: "min_order_cents".to_string(),
            }
            .into());
        }

        let now = self.clock.now();
        let mut rules = input.rules;
        rules.specific_emails = rules
            .specific_emails
            .iter()
            .map(|e| normalize_email(e))
            .filter(|e| !e.is_empty())
            .collect();

        let created = Coupon {
            id: new_id(),
            code,
            discount_type: input.discount_type,
            discount_value: input.discount_value,
            expires_at: input.expires_at,
            usage_limit: input.usage_limit,
            used_count: 0,
            status: CouponStatus::Active,
            rules,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.db.begin().await?;
        if coupon::fetch_by_code(&mut tx, &created.code).await?.is_some() {
            return Err(ValidationError::Duplicate {
                field: "code".to_string(),
                value: created.code,
            }
            .into());
        }
        coupon::insert_coupon(&mut tx, &created).await?;
        tx.commit().await?;

        info!(id = %created.id, code = %created.code, admin = %actor.user_id, "Coupon created");
        Ok(created)
    }

    pub async fn set_coupon_status(
        &self,
        actor: &Actor,
        coupon_id: &str,
        status: CouponStatus,
    ) -> ServiceResult<Coupon> {
        require_admin(actor)?;

        let repo = self.db.coupons();
        if !repo.set_status(coupon_id, status, self.clock.now()).await? {
            return Err(ServiceError::not_found("Coupon", coupon_id));
        }
        info!(id = %coupon_id, status = ?status, admin = %actor.user_id, "Coupon status changed");

        repo.get_by_id(coupon_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Coupon", coupon_id))
    }

    /// Every coupon, newest first.
    pub async fn list_coupons(&self, actor: &Actor) -> ServiceResult<Vec<Coupon>> {
        require_admin(actor)?;
        Ok(self.db.coupons().list().await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
