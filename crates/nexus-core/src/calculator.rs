//! # Tax & Discount Calculator
//!
//! The pure computation at the center of every checkout: given a cart, a
//! tax settings snapshot, a category resolver, and an optional coupon,
//! produce the monetary totals for the sale.
//!
//! ## Data Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     compute_sale_totals                                 │
//! │                                                                         │
//! │  [LineItem]                                                            │
//! │      │  recompute each subtotal from unit_price × qty                  │
//! │      ▼                                                                  │
//! │  subtotal ───────────────────────────────┐                              │
//! │      │                                   │                              │
//! │      │ resolver(item_id) → category      │ coupon rule checks           │
//! │      ▼                                   ▼                              │
//! │  taxable_subtotal (exempt cats out)   discount (clamped)               │
//! │      │                                   │                              │
//! │      ▼                                   │                              │
//! │  tax = taxable × rate (banker's)         │                              │
//! │      │                                   │                              │
//! │      └────────► total = subtotal + tax - discount ◄────────┘            │
//! │                                                                         │
//! │  NO I/O. Same inputs always produce the same totals.                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The settings snapshot is passed in by the caller; the calculator never
//! reads global state, which is what keeps it trivially testable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::coupon::{check_coupon, discount_for};
use crate::money::Money;
use crate::types::{Coupon, LineItem, TaxSettings};

// =============================================================================
// Sale Totals
// =============================================================================

/// The computed monetary breakdown of a cart.
///
/// Invariants (enforced by construction):
/// - `total_cents == subtotal_cents + tax_cents - discount_cents`
/// - `total_cents >= 0`
/// - `taxable_subtotal_cents <= subtotal_cents`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleTotals {
    pub subtotal_cents: i64,
    /// Portion of the subtotal subject to tax after category exemptions.
    pub taxable_subtotal_cents: i64,
    pub tax_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    /// Whether the supplied coupon passed validation and produced the
    /// discount. The orchestrator uses this to decide redemption.
    pub coupon_applied: bool,
}

impl SaleTotals {
    /// All-zero totals for an empty cart.
    pub const fn empty() -> Self {
        SaleTotals {
            subtotal_cents: 0,
            taxable_subtotal_cents: 0,
            tax_cents: 0,
            discount_cents: 0,
            total_cents: 0,
            coupon_applied: false,
        }
    }
}

// =============================================================================
// Computation
// =============================================================================

/// Computes subtotal, taxable subtotal, tax, discount, and total for a cart.
///
/// ## Arguments
/// * `items` - Cart line items. Subtotals are recomputed from
///   `unit_price × quantity`; a caller-supplied `line_subtotal_cents` is
///   never trusted.
/// * `settings` - Immutable tax settings snapshot for this computation.
/// * `resolve_category` - Maps an item id to its catalog category.
///   Returning `None` (unknown item or missing category) makes the line
///   taxable: silently exempting unknown categories would leak revenue.
/// * `coupon` - Already-resolved coupon, or `None`. A coupon that fails
///   any rule check contributes `discount = 0` (the caller can rerun the
///   checks itself when it needs the reason).
/// * `now` - Clock input for the coupon validity window, supplied by the
///   caller so the function stays deterministic.
///
/// ## Rounding
/// Tax and percentage discounts round half-to-even exactly once, inside
/// [`Money::mul_bps`]. Everything else is exact integer arithmetic.
pub fn compute_sale_totals<R>(
    items: &[LineItem],
    settings: &TaxSettings,
    resolve_category: R,
    coupon: Option<&Coupon>,
    now: DateTime<Utc>,
) -> SaleTotals
where
    R: Fn(&str) -> Option<String>,
{
    // Step 1: subtotal from recomputed line subtotals.
    let subtotal: Money = items
        .iter()
        .map(|item| item.line_subtotal())
        .fold(Money::zero(), |acc, line| acc + line);

    // Step 2: taxable base and tax.
    let taxable_subtotal = if settings.tax_enabled {
        items
            .iter()
            .filter(|item| {
                match resolve_category(&item.item_id) {
                    Some(category) => !settings.is_exempt(&category),
                    // Unknown category defaults to taxable.
                    None => true,
                }
            })
            .map(|item| item.line_subtotal())
            .fold(Money::zero(), |acc, line| acc + line)
    } else {
        Money::zero()
    };

    let tax = if settings.tax_enabled {
        taxable_subtotal.calculate_tax(settings.tax_rate())
    } else {
        Money::zero()
    };

    // Step 3: discount, only when the coupon passes every rule check.
    let (discount, coupon_applied) = match check_coupon(coupon, subtotal, now) {
        Ok(valid) => (discount_for(valid, subtotal), true),
        Err(_) => (Money::zero(), false),
    };

    // Step 4: total. Discount is already capped at subtotal and tax is
    // non-negative, so the clamp is a belt the math never relies on.
    let total = (subtotal + tax - discount).clamp_non_negative();

    SaleTotals {
        subtotal_cents: subtotal.cents(),
        taxable_subtotal_cents: taxable_subtotal.cents(),
        tax_cents: tax.cents(),
        discount_cents: discount.cents(),
        total_cents: total.cents(),
        coupon_applied,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
