//! # nexus-db: Database Layer for the Nexus POS Backend
//!
//! SQLite persistence for the sale engine: connection pooling, embedded
//! migrations, and one repository per entity.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  nexus-checkout ──▶ ★ nexus-db (THIS CRATE) ★ ──▶ SQLite (WAL)         │
//! │  (orchestration)                                                        │
//! │                      ┌──────────┐ ┌──────────────┐ ┌─────────────────┐  │
//! │                      │  pool    │ │  migrations  │ │  repository/*   │  │
//! │                      │ Database │ │  embedded    │ │  all SQL lives  │  │
//! │                      │ DbConfig │ │  SQL files   │ │  here           │  │
//! │                      └──────────┘ └──────────────┘ └─────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency Contract
//! The two invariants the sale engine leans on are enforced here, in SQL:
//!
//! - Coupon usage never exceeds its limit: [`repository::coupon`] claims a
//!   use with a conditional increment.
//! - A sale completes exactly once: [`repository::sale`] transitions
//!   `payment_status` with a conditional update. `rows_affected` tells the
//!   caller whether it won.
//!
//! ## Example Usage
//! ```rust,ignore
//! use nexus_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./nexus.db")).await?;
//! let settings = db.settings().get().await?;
//! let completed_now = db.sales().complete(&sale_id).await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::coupon::CouponRepository;
pub use repository::customer::CustomerRepository;
pub use repository::inventory::InventoryRepository;
pub use repository::payment::PaymentTransactionRepository;
pub use repository::sale::SaleRepository;
pub use repository::settings::{SettingsPatch, SettingsRepository};
