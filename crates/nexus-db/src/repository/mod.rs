//! # Repository Implementations
//!
//! One repository per entity type. Repositories own all SQL; nothing
//! outside this module writes queries.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Database (pool.rs)                                                     │
//! │     │                                                                   │
//! │     ├── sales()      → SaleRepository       insert / CAS complete       │
//! │     ├── inventory()  → InventoryRepository  lookups / qty deltas        │
//! │     ├── coupons()    → CouponRepository     atomic usage counter        │
//! │     ├── settings()   → SettingsRepository   singleton snapshot          │
//! │     ├── payments()   → PaymentTransactionRepository                     │
//! │     └── customers()  → CustomerRepository   name lookups                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The conditional updates in `coupon` and `sale` are load-bearing: they
//! are what makes coupon redemption and payment completion safe under
//! concurrent requests (see nexus-checkout).

pub mod coupon;
pub mod customer;
pub mod inventory;
pub mod payment;
pub mod sale;
pub mod settings;
