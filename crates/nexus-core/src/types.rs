//! # Domain Types
//!
//! Core domain types for the Nexus POS sale engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────────┐   │
//! │  │      Sale       │   │     Coupon      │   │ PaymentTransaction  │   │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────────  │   │
//! │  │  id (UUID)      │   │  code (unique)  │   │  session_id         │   │
//! │  │  items[]        │   │  discount rule  │   │  sale_id (FK)       │   │
//! │  │  totals (cents) │   │  usage counter  │   │  status             │   │
//! │  │  payment_status │   │  validity window│   │  amount_cents       │   │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────────┘   │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────────┐   │
//! │  │   TaxSettings   │   │  InventoryItem  │   │      Customer       │   │
//! │  │  rate + enabled │   │  category/stock │   │  display name only  │   │
//! │  │  exempt cats    │   │  selling price  │   │                     │   │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Entities carry a UUID `id` for relations plus a business key where one
//! exists (coupon `code`, provider `session_id`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 825 bps = 8.25%, 1000 bps = 10%
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a percentage (for convenience).
    pub fn from_percentage(pct: f64) -> Self {
        TaxRate((pct * 100.0).round() as u32)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    /// Checks if the tax rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Line Item
// =============================================================================

/// A line item in a sale.
///
/// Uses the snapshot pattern: name and price are frozen at time of sale so
/// the record survives later catalog edits.
///
/// ## Tamper Resistance
/// `line_subtotal_cents` is never trusted from a caller. It is recomputed
/// as `unit_price_cents * quantity` when the line is built, which closes
/// the price-mismatch hole a client could otherwise exploit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    /// Inventory item this line refers to.
    pub item_id: String,
    /// Item name at time of sale (frozen).
    pub item_name: String,
    /// Quantity sold. Always > 0.
    pub quantity: i64,
    /// Unit price in cents at time of sale (frozen). Always >= 0.
    pub unit_price_cents: i64,
    /// Line subtotal in cents. Always `unit_price_cents * quantity`.
    pub line_subtotal_cents: i64,
}

impl LineItem {
    /// Builds a line item, recomputing the subtotal from its parts.
    pub fn new(item_id: impl Into<String>, item_name: impl Into<String>, quantity: i64, unit_price_cents: i64) -> Self {
        LineItem {
            item_id: item_id.into(),
            item_name: item_name.into(),
            quantity,
            unit_price_cents,
            line_subtotal_cents: unit_price_cents * quantity,
        }
    }

    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns the recomputed line subtotal as Money.
    ///
    /// Always derived from `unit_price * quantity`, regardless of what the
    /// stored field says.
    #[inline]
    pub fn line_subtotal(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Tax Settings
// =============================================================================

/// Process-wide tax configuration.
///
/// ## Lifecycle
/// Created with defaults (rate 0, disabled, no exemptions) on first access,
/// updated in place by an admin, never deleted. The calculator receives an
/// immutable snapshot per computation; it never reads global state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxSettings {
    /// Tax rate in basis points (1000 = 10%).
    pub tax_rate_bps: u32,
    /// Master switch. When false, tax is zero regardless of rate.
    pub tax_enabled: bool,
    /// Item categories excluded from the taxable base.
    /// Matching is case-insensitive.
    pub tax_exempt_categories: Vec<String>,
    /// ISO currency code, display only.
    pub currency: String,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<String>,
}

impl TaxSettings {
    /// Default settings used on first access: tax off, nothing exempt.
    pub fn defaults() -> Self {
        TaxSettings {
            tax_rate_bps: 0,
            tax_enabled: false,
            tax_exempt_categories: Vec::new(),
            currency: "USD".to_string(),
            updated_at: Utc::now(),
            updated_by: None,
        }
    }

    /// Returns the configured rate.
    #[inline]
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps)
    }

    /// Checks whether a category is tax-exempt (case-insensitive).
    pub fn is_exempt(&self, category: &str) -> bool {
        self.tax_exempt_categories
            .iter()
            .any(|c| c.eq_ignore_ascii_case(category))
    }
}

impl Default for TaxSettings {
    fn default() -> Self {
        TaxSettings::defaults()
    }
}

// =============================================================================
// Coupon
// =============================================================================

/// How a coupon's `discount_value` is interpreted.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// `discount_value` is basis points off the subtotal (2000 = 20%).
    Percentage,
    /// `discount_value` is a fixed amount in cents.
    Fixed,
}

/// A discount coupon.
///
/// ## Invariant
/// `usage_limit == None || usage_count <= usage_limit`. The counter is only
/// ever advanced by an atomic storage-layer increment, so two checkouts
/// racing at the limit cannot both win.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coupon {
    pub id: String,
    /// Unique redemption code. Stored uppercased; lookups uppercase first.
    pub code: String,
    pub discount_type: DiscountType,
    /// Basis points for `Percentage`, cents for `Fixed`.
    pub discount_value: i64,
    /// Minimum cart subtotal (cents) required to redeem.
    pub min_purchase_cents: i64,
    /// Cap on the computed discount (cents), for percentage coupons.
    pub max_discount_cents: Option<i64>,
    /// Maximum number of redemptions, `None` = unlimited.
    pub usage_limit: Option<i64>,
    /// Redemptions so far. Never exceeds `usage_limit`.
    pub usage_count: i64,
    pub is_active: bool,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Coupon {
    /// Checks whether the usage limit still has headroom.
    pub fn has_uses_remaining(&self) -> bool {
        match self.usage_limit {
            Some(limit) => self.usage_count < limit,
            None => true,
        }
    }
}

// =============================================================================
// Payment Method & Status
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash, settled at the counter.
    Cash,
    /// Stripe checkout session, settled asynchronously.
    Stripe,
    /// PayPal order, settled asynchronously.
    PayPal,
}

impl PaymentMethod {
    /// Cash settles immediately; card/PayPal sales start out pending.
    #[inline]
    pub fn is_immediate(&self) -> bool {
        matches!(self, PaymentMethod::Cash)
    }
}

/// Payment state of a sale.
///
/// Exactly one forward transition exists: `Pending → Completed`.
/// `Completed` is terminal.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Awaiting provider confirmation.
    Pending,
    /// Paid. Terminal.
    Completed,
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

/// State of a provider payment transaction (the Sale's shadow record).
///
/// Unlike `PaymentStatus`, a transaction can record a provider-reported
/// failure. The owning Sale stays `Pending` in that case so the customer
/// can retry.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

// =============================================================================
// Sale
// =============================================================================

/// A sale transaction.
///
/// ## Invariants
/// - `total == subtotal + tax - discount`, and `total >= 0`
/// - Totals are frozen at creation; only `payment_status` and the provider
///   reference ids mutate afterwards
/// - Line items are embedded (no independent lifecycle)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sale {
    pub id: String,
    pub items: Vec<LineItem>,
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub payment_method: PaymentMethod,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub discount_cents: i64,
    /// Redeemed coupon code, absent when no coupon applied.
    pub coupon_code: Option<String>,
    pub coupon_id: Option<String>,
    pub total_cents: i64,
    pub payment_status: PaymentStatus,
    pub stripe_session_id: Option<String>,
    pub paypal_order_id: Option<String>,
    /// Username of the cashier who rang the sale up.
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Sale {
    /// Returns the grand total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// True once payment has settled.
    #[inline]
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Completed
    }
}

// =============================================================================
// Payment Transaction
// =============================================================================

/// One-to-one shadow of a Sale's in-flight provider payment.
///
/// Created at checkout initiation, mutated exactly once on confirmation,
/// never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: String,
    /// Provider's identifier (Stripe session id or PayPal order id).
    pub session_id: String,
    pub sale_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: TransactionStatus,
    /// Free-form provider metadata.
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Inventory Item
// =============================================================================

/// An item in the shop's inventory.
///
/// The sale engine reads `category` (taxability) and `quantity` (stock),
/// and applies a single `quantity -= sold` decrement per completed sale.
/// Negative stock is a valid, reportable state rather than a hard error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: String,
    pub name: String,
    /// Item category/type, e.g. "phone", "part", "accessory".
    /// Drives tax exemption lookups.
    pub category: String,
    pub barcode: Option<String>,
    pub quantity: i64,
    pub selling_price_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    /// Returns the selling price as Money.
    #[inline]
    pub fn selling_price(&self) -> Money {
        Money::from_cents(self.selling_price_cents)
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A walk-in or account customer. The sale engine only needs the display
/// name; everything else belongs to the CRM layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_rate_from_bps() {
        let rate = TaxRate::from_bps(825);
        assert_eq!(rate.bps(), 825);
        assert!((rate.percentage() - 8.25).abs() < 0.001);
    }

    #[test]
    fn test_tax_rate_from_percentage() {
        assert_eq!(TaxRate::from_percentage(8.25).bps(), 825);
        assert_eq!(TaxRate::from_percentage(10.0).bps(), 1000);
    }

    #[test]
    fn test_line_item_recomputes_subtotal() {
        let line = LineItem::new("item-1", "Screen protector", 3, 499);
        assert_eq!(line.line_subtotal_cents, 1497);
        assert_eq!(line.line_subtotal().cents(), 1497);
    }

    #[test]
    fn test_line_item_subtotal_ignores_tampered_field() {
        let mut line = LineItem::new("item-1", "Screen protector", 2, 1000);
        // A client lying about its subtotal must not affect the math
        line.line_subtotal_cents = 1;
        assert_eq!(line.line_subtotal().cents(), 2000);
    }

    #[test]
    fn test_settings_exemption_case_insensitive() {
        let settings = TaxSettings {
            tax_exempt_categories: vec!["Part".to_string(), "screen".to_string()],
            ..TaxSettings::defaults()
        };
        assert!(settings.is_exempt("part"));
        assert!(settings.is_exempt("PART"));
        assert!(settings.is_exempt("Screen"));
        assert!(!settings.is_exempt("phone"));
    }

    #[test]
    fn test_coupon_uses_remaining() {
        let mut coupon = Coupon {
            id: "c1".to_string(),
            code: "SAVE20".to_string(),
            discount_type: DiscountType::Percentage,
            discount_value: 2000,
            min_purchase_cents: 0,
            max_discount_cents: None,
            usage_limit: Some(2),
            usage_count: 1,
            is_active: true,
            valid_from: None,
            valid_until: None,
            created_at: Utc::now(),
        };
        assert!(coupon.has_uses_remaining());

        coupon.usage_count = 2;
        assert!(!coupon.has_uses_remaining());

        coupon.usage_limit = None;
        assert!(coupon.has_uses_remaining());
    }

    #[test]
    fn test_payment_method_immediacy() {
        assert!(PaymentMethod::Cash.is_immediate());
        assert!(!PaymentMethod::Stripe.is_immediate());
        assert!(!PaymentMethod::PayPal.is_immediate());
    }
}
