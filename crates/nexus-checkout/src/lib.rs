//! # nexus-checkout: Sale Orchestration for the Nexus POS Backend
//!
//! The glue between pure computation and storage: this crate sequences a
//! checkout end to end and settles provider payments exactly once.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │   HTTP layer (out of scope)                                             │
//! │      │ create sale        │ validate coupon      │ payment webhooks     │
//! │      ▼                    ▼                      ▼                      │
//! │  ┌───────────────────────────────────────────────────────────────────┐  │
//! │  │              ★ nexus-checkout (THIS CRATE) ★                      │  │
//! │  │                                                                   │  │
//! │  │   CheckoutService            ReconciliationService                │  │
//! │  │   create_sale                reconcile (idempotent,               │  │
//! │  │   validate_coupon             per-sale lock + CAS)                │  │
//! │  │   begin_provider_payment                                          │  │
//! │  └───────────────┬───────────────────────────┬───────────────────────┘  │
//! │                  ▼                           ▼                          │
//! │           nexus-core (math)           nexus-db (storage)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## The Two Races This Crate Closes
//!
//! 1. **Coupon exhaustion**: two carts racing for the last use of a
//!    limited coupon. Exactly one gets the discount; the other degrades
//!    to discount 0 and still checks out.
//! 2. **Double settlement**: a success poll and a webhook confirming the
//!    same payment. Exactly one call completes the sale and decrements
//!    inventory; the other reports `already_completed`.

pub mod checkout;
pub mod error;
pub mod reconcile;

pub use checkout::{CartLine, CheckoutService, CouponPreview, CreateSaleRequest};
pub use error::{CheckoutError, CheckoutResult};
pub use reconcile::{ReconcileOutcome, ReconciliationService, ReportedStatus};
