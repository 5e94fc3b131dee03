//! # Coupon Rules
//!
//! Pure validation and discount math for coupons.
//!
//! ## Validation Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │             Coupon checks run in this strict order                      │
//! │                                                                         │
//! │  1. Exists (lookup by uppercased code)  → NotFound                     │
//! │  2. is_active                           → Inactive                     │
//! │  3. usage_count < usage_limit           → UsageLimitReached            │
//! │  4. subtotal >= min_purchase            → MinimumNotMet                │
//! │  5. now >= valid_from (if set)          → NotYetValid                  │
//! │  6. now <= valid_until (if set)         → Expired                      │
//! │                                                                         │
//! │  First failing check wins. The caller decides what a failure means:    │
//! │  the checkout path degrades to discount = 0, the standalone validate   │
//! │  endpoint surfaces the reason as a hard error.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing in this module mutates the coupon. Redemption (the atomic
//! `usage_count` increment) lives in the storage layer.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::money::Money;
use crate::types::{Coupon, DiscountType};

// =============================================================================
// Rejection Reasons
// =============================================================================

/// Why a coupon cannot be applied. One variant per check, in check order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponRejection {
    #[error("Coupon code not found")]
    NotFound,
    #[error("Coupon is not active")]
    Inactive,
    #[error("Coupon usage limit reached")]
    UsageLimitReached,
    #[error("Cart subtotal is below the coupon minimum purchase")]
    MinimumNotMet,
    #[error("Coupon is not valid yet")]
    NotYetValid,
    #[error("Coupon has expired")]
    Expired,
}

// =============================================================================
// Validation
// =============================================================================

/// Runs the ordered rule checks against a resolved coupon.
///
/// `coupon` is `None` when the code lookup found nothing, which maps to
/// `NotFound` so callers handle the whole state machine through one path.
///
/// Fail-fast: the first failing check is returned, later checks don't run.
pub fn check_coupon<'a>(
    coupon: Option<&'a Coupon>,
    subtotal: Money,
    now: DateTime<Utc>,
) -> Result<&'a Coupon, CouponRejection> {
    let coupon = coupon.ok_or(CouponRejection::NotFound)?;

    if !coupon.is_active {
        return Err(CouponRejection::Inactive);
    }

    if !coupon.has_uses_remaining() {
        return Err(CouponRejection::UsageLimitReached);
    }

    if subtotal.cents() < coupon.min_purchase_cents {
        return Err(CouponRejection::MinimumNotMet);
    }

    if let Some(from) = coupon.valid_from {
        if now < from {
            return Err(CouponRejection::NotYetValid);
        }
    }

    if let Some(until) = coupon.valid_until {
        if now > until {
            return Err(CouponRejection::Expired);
        }
    }

    Ok(coupon)
}

// =============================================================================
// Discount Computation
// =============================================================================

/// Computes the discount a (validated) coupon grants on a subtotal.
///
/// ## Clamping
/// - `Percentage`: `subtotal * value_bps`, capped at `max_discount_cents`
///   when set
/// - `Fixed`: `min(value, subtotal)`; a discount can never exceed the
///   subtotal, which together with `tax >= 0` keeps totals non-negative
///
/// ## Example
/// ```rust
/// use chrono::Utc;
/// use nexus_core::coupon::discount_for;
/// use nexus_core::money::Money;
/// use nexus_core::types::{Coupon, DiscountType};
///
/// let coupon = Coupon {
///     id: "c1".into(),
///     code: "SAVE20".into(),
///     discount_type: DiscountType::Percentage,
///     discount_value: 2000, // 20%
///     min_purchase_cents: 0,
///     max_discount_cents: Some(1500),
///     usage_limit: None,
///     usage_count: 0,
///     is_active: true,
///     valid_from: None,
///     valid_until: None,
///     created_at: Utc::now(),
/// };
///
/// // 20% of $100.00 is $20.00, clamped to the $15.00 cap
/// assert_eq!(discount_for(&coupon, Money::from_cents(10_000)).cents(), 1500);
/// ```
pub fn discount_for(coupon: &Coupon, subtotal: Money) -> Money {
    match coupon.discount_type {
        DiscountType::Percentage => {
            let raw = subtotal.mul_bps(coupon.discount_value.max(0) as u32);
            match coupon.max_discount_cents {
                Some(cap) => raw.min(Money::from_cents(cap)),
                None => raw,
            }
        }
        DiscountType::Fixed => Money::from_cents(coupon.discount_value.max(0)).min(subtotal),
    }
}

/// Normalizes a user-entered coupon code for lookup.
///
/// Codes are unique case-insensitively; the store keeps them uppercased.
#[inline]
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

// =============================================================================
// Unit Tests
// =============================================================================
