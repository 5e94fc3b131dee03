//! # nexus-core: Pure Business Logic for the Nexus POS Backend
//!
//! This crate is the **heart** of the sale engine. It contains all business
//! logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Nexus POS Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                HTTP layer (out of scope here)                   │   │
//! │  │    create sale, validate coupon, payment webhooks               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                nexus-checkout (orchestration)                   │   │
//! │  │    CheckoutService, ReconciliationService                       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ nexus-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐   │   │
//! │  │   │   types   │  │   money   │  │calculator │  │  coupon   │   │   │
//! │  │   │   Sale    │  │   Money   │  │ totals    │  │  rules    │   │   │
//! │  │   │  Coupon   │  │  TaxRate  │  │ tax math  │  │ discounts │   │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘   │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  nexus-db (Database Layer)                      │   │
//! │  │            SQLite queries, migrations, repositories             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Sale, Coupon, TaxSettings, etc.)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`calculator`] - The tax & discount computation for a cart
//! - [`coupon`] - Coupon rule checks and discount math
//! - [`error`] - Domain error types
//! - [`validation`] - Cart input validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64) to avoid float errors
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::Utc;
//! use nexus_core::calculator::compute_sale_totals;
//! use nexus_core::types::{LineItem, TaxSettings};
//!
//! let cart = vec![LineItem::new("itm-1", "Phone case", 2, 1999)];
//! let settings = TaxSettings {
//!     tax_rate_bps: 1000, // 10%
//!     tax_enabled: true,
//!     ..TaxSettings::defaults()
//! };
//!
//! let totals = compute_sale_totals(
//!     &cart,
//!     &settings,
//!     |_id| Some("accessory".to_string()),
//!     None,
//!     Utc::now(),
//! );
//!
//! assert_eq!(totals.subtotal_cents, 3998);
//! assert_eq!(totals.tax_cents, 400);
//! assert_eq!(totals.total_cents, 4398);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod calculator;
pub mod coupon;
pub mod error;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use nexus_core::Money` instead of
// `use nexus_core::money::Money`

pub use calculator::{compute_sale_totals, SaleTotals};
pub use coupon::{check_coupon, discount_for, normalize_code, CouponRejection};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity of a single line item.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
/// Can be made configurable per-shop in a future version.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Singleton row id for the settings record.
///
/// There is exactly one `TaxSettings` per installation; the settings
/// repository keys it by this constant.
pub const SETTINGS_ID: &str = "app_settings";
