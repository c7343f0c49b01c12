//! # Domain Types
//!
//! Core domain types used throughout ToolHub.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Catalog                    Commerce                 Entitlement        │
//! │  ─────────────────────      ────────────────────     ────────────────── │
//! │  Tool ◄──┐                  Order                    Subscription       │
//! │          │ tool_ids         └── OrderLine ──► ItemRef    ▲              │
//! │  Package ┘                  Coupon                       │              │
//! │     │                       └── CouponRules          SubscriptionGrant  │
//! │     └─► PurchasableItem                              (per order line)   │
//! │                                                                         │
//! │  ItemRef { kind, id } names "a tool or a package" everywhere.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A Tool is a leaf product. A Package bundles tools; a package with exactly
//! one tool is that tool's *shadow package*, kept in sync by the catalog.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Item References
// =============================================================================

/// Which catalog table a purchasable item lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Package,
    Tool,
}

impl ItemKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Package => "package",
            ItemKind::Tool => "tool",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed pointer to a tool or a package.
///
/// Order lines and subscriptions carry one of these instead of a bare id,
/// so a lookup never has to guess which table an id belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ItemRef {
    pub kind: ItemKind,
    pub id: String,
}

impl ItemRef {
    pub fn new(kind: ItemKind, id: impl Into<String>) -> Self {
        ItemRef { kind, id: id.into() }
    }

    pub fn package(id: impl Into<String>) -> Self {
        ItemRef::new(ItemKind::Package, id)
    }

    pub fn tool(id: impl Into<String>) -> Self {
        ItemRef::new(ItemKind::Tool, id)
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

// =============================================================================
// Catalog Enums
// =============================================================================

/// How long one billing period of an item lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum BillingInterval {
    Monthly,
    Yearly,
    Lifetime,
}

impl Default for BillingInterval {
    fn default() -> Self {
        BillingInterval::Monthly
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl Default for Visibility {
    fn default() -> Self {
        Visibility::Public
    }
}

/// Operational state of a tool.
///
/// Only `Active` tools appear in a customer's accessible tool list; the
/// other states hide the tool without touching anyone's subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Active,
    Maintenance,
    Inactive,
    Down,
    StockOut,
}

impl Default for ToolStatus {
    fn default() -> Self {
        ToolStatus::Active
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PackageStatus {
    Active,
    Inactive,
}

impl Default for PackageStatus {
    fn default() -> Self {
        PackageStatus::Active
    }
}

// =============================================================================
// Tool
// =============================================================================

/// A single tool customers can be granted access to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Tool {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    /// Where the customer is sent once access is granted.
    pub url: Option<String>,
    pub price_cents: i64,
    pub interval: BillingInterval,
    pub visibility: Visibility,
    pub status: ToolStatus,
    /// The tool's shadow package, once the catalog has created it.
    pub package_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Tool {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    pub fn item_ref(&self) -> ItemRef {
        ItemRef::tool(self.id.clone())
    }
}

// =============================================================================
// Package
// =============================================================================

/// A priced bundle of tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Package {
    pub id: String,
    pub name: String,
    pub price_cents: i64,
    pub interval: BillingInterval,
    pub is_trial: bool,
    /// Explicit grant length for trials. Overrides the interval.
    pub trial_duration_days: Option<i64>,
    pub visibility: Visibility,
    pub status: PackageStatus,
    pub features: Vec<String>,
    /// Member tools in display order.
    pub tool_ids: Vec<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Package {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    pub fn item_ref(&self) -> ItemRef {
        ItemRef::package(self.id.clone())
    }

    /// True when this package is the single-tool mirror of `tool_id`.
    pub fn is_shadow_of(&self, tool_id: &str) -> bool {
        self.tool_ids.len() == 1 && self.tool_ids[0] == tool_id
    }
}

// =============================================================================
// Purchasable Item
// =============================================================================

/// A tool or package resolved from the catalog, as seen by checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PurchasableItem {
    Tool(Tool),
    Package(Package),
}

impl PurchasableItem {
    pub fn item_ref(&self) -> ItemRef {
        match self {
            PurchasableItem::Tool(tool) => tool.item_ref(),
            PurchasableItem::Package(package) => package.item_ref(),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            PurchasableItem::Tool(tool) => &tool.id,
            PurchasableItem::Package(package) => &package.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            PurchasableItem::Tool(tool) => &tool.name,
            PurchasableItem::Package(package) => &package.name,
        }
    }

    pub fn price(&self) -> Money {
        match self {
            PurchasableItem::Tool(tool) => tool.price(),
            PurchasableItem::Package(package) => package.price(),
        }
    }

    pub fn interval(&self) -> BillingInterval {
        match self {
            PurchasableItem::Tool(tool) => tool.interval,
            PurchasableItem::Package(package) => package.interval,
        }
    }

    /// Tools are never trials; only packages carry the trial flag.
    pub fn is_trial(&self) -> bool {
        match self {
            PurchasableItem::Tool(_) => false,
            PurchasableItem::Package(package) => package.is_trial,
        }
    }

    pub fn trial_duration_days(&self) -> Option<i64> {
        match self {
            PurchasableItem::Tool(_) => None,
            PurchasableItem::Package(package) => package.trial_duration_days,
        }
    }

    /// Tool ids a subscription to this item unlocks.
    pub fn granted_tools(&self) -> Vec<String> {
        match self {
            PurchasableItem::Tool(tool) => vec![tool.id.clone()],
            PurchasableItem::Package(package) => package.tool_ids.clone(),
        }
    }

    /// Whether checkout may sell this item right now.
    pub fn is_purchasable(&self) -> bool {
        match self {
            PurchasableItem::Tool(tool) => {
                !matches!(tool.status, ToolStatus::Inactive | ToolStatus::StockOut)
            }
            PurchasableItem::Package(package) => package.status == PackageStatus::Active,
        }
    }
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Nothing to pay (after discounts).
    Free,
    /// Bank transfer or cash, verified by an admin.
    Offline,
    /// Card or wallet payment with a reference as proof.
    Online,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PaymentMethod::Free => "free",
            PaymentMethod::Offline => "offline",
            PaymentMethod::Online => "online",
        })
    }
}

/// Order lifecycle status.
///
/// ```text
///            ┌──────────┐
///    ┌──────►│ Approved │◄─────┐
///    │       └────┬─────┘      │
///    │  grant     │ revoke     │ grant
/// ┌──┴──────┐     ▼       ┌────┴─────┐
/// │ Pending │────────────►│ Rejected │
/// └─────────┘   relabel   └──────────┘
/// ```
/// Every status can move to every other; only moves into or out of
/// `Approved` change entitlements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Approved,
    Rejected,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Approved => "approved",
            OrderStatus::Rejected => "rejected",
        })
    }
}

/// One purchased item on an order.
/// Price and name are frozen at checkout time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderLine {
    pub id: String,
    pub order_id: String,
    pub item_kind: ItemKind,
    pub item_id: String,
    /// Name at time of purchase (frozen).
    pub name_snapshot: String,
    /// Number of billing periods bought. Always at least 1.
    pub period_count: i64,
    pub unit_price_cents: i64,
    /// unit_price × period_count
    pub line_total_cents: i64,
}

impl OrderLine {
    pub fn item(&self) -> ItemRef {
        ItemRef::new(self.item_kind, self.item_id.clone())
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

/// A customer's purchase request and its settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub lines: Vec<OrderLine>,
    pub total_cents: i64,
    pub discount_cents: i64,
    pub final_cents: i64,
    pub payment_method: PaymentMethod,
    pub payment_proof: Option<String>,
    pub coupon_id: Option<String>,
    pub status: OrderStatus,
    pub admin_note: Option<String>,
    /// Bumped on every status change; guards concurrent admin edits.
    pub version: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    pub fn discount(&self) -> Money {
        Money::from_cents(self.discount_cents)
    }

    pub fn final_amount(&self) -> Money {
        Money::from_cents(self.final_cents)
    }
}

// =============================================================================
// Subscriptions
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Expired,
    Cancelled,
}

/// A time-bounded right of one user to one item.
///
/// At most one `Active` subscription exists per (user, item); new grants
/// extend it instead of creating a second row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Subscription {
    pub id: String,
    pub user_id: String,
    pub item_kind: ItemKind,
    pub item_id: String,
    #[ts(as = "String")]
    pub start_date: DateTime<Utc>,
    #[ts(as = "String")]
    pub end_date: DateTime<Utc>,
    pub status: SubscriptionStatus,
    pub auto_renew: bool,
    /// The order that most recently created or extended this subscription.
    pub order_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn item(&self) -> ItemRef {
        ItemRef::new(self.item_kind, self.item_id.clone())
    }

    /// Active status and an end date still in the future.
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && self.end_date > now
    }
}

/// Ledger entry recording how many days one order line added to a
/// subscription. Revocation subtracts exactly this amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SubscriptionGrant {
    pub id: String,
    pub subscription_id: String,
    /// None for grants made by an admin without an order.
    pub order_id: Option<String>,
    pub item_kind: ItemKind,
    pub item_id: String,
    pub duration_days: i64,
    pub granted_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Coupons
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    /// `discount_value` is in basis points (10000 = 100%).
    Percentage,
    /// `discount_value` is in cents.
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum CouponStatus {
    Active,
    Inactive,
}

/// Which customers a coupon targets, judged by subscription history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    /// Anyone, including anonymous visitors.
    All,
    /// Never held a subscription.
    New,
    /// Holds at least one current subscription.
    Active,
    /// Has history but nothing current.
    Old,
}

impl Default for UserType {
    fn default() -> Self {
        UserType::All
    }
}

/// Optional eligibility restrictions. Empty sets mean "no restriction".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CouponRules {
    pub user_type: UserType,
    /// Lower-cased emails allowed to redeem.
    pub specific_emails: BTreeSet<String>,
    /// Package or tool ids; the cart must contain at least one.
    pub specific_packages: BTreeSet<String>,
    /// Tool ids; at least one cart line must grant one of them.
    pub specific_tools: BTreeSet<String>,
    pub min_order_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: String,
    /// Upper-cased, trimmed.
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub expires_at: DateTime<Utc>,
    pub usage_limit: Option<i64>,
    pub used_count: i64,
    pub status: CouponStatus,
    pub rules: CouponRules,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Actors and Access
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// The authenticated caller of an operation.
///
/// Identity is established upstream; the engine only trusts what it is
/// handed here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub role: Role,
    pub email: Option<String>,
}

impl Actor {
    pub fn user(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Actor {
            user_id: user_id.into(),
            role: Role::User,
            email: Some(email.into()),
        }
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Actor {
            user_id: user_id.into(),
            role: Role::Admin,
            email: None,
        }
    }

    #[inline]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum AccessStatus {
    Active,
    Expired,
}

/// A user's effective access to one tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AccessGrantView {
    pub status: AccessStatus,
    /// None for admin bypass.
    #[ts(as = "Option<String>")]
    pub expiry_date: Option<DateTime<Utc>>,
    /// The subscribed item the access came through.
    pub source: Option<ItemRef>,
}

/// A tool plus the caller's access to it, as listed on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ToolWithAccess {
    pub tool: Tool,
    pub access: AccessGrantView,
}

// =============================================================================
// Unit Tests
// =============================================================================
