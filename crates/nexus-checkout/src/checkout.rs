//! # Checkout Service
//!
//! Sequences a sale from cart submission to persisted record.
//!
//! ## Checkout Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     CheckoutService::create_sale                        │
//! │                                                                         │
//! │  1. validate cart shape (empty, quantities, ids)                        │
//! │  2. resolve items against inventory  → ItemNotFound (no writes yet)     │
//! │  3. resolve customer display name    → CustomerNotFound                 │
//! │  4. load settings snapshot                                              │
//! │  5. compute totals (nexus-core, pure)                                   │
//! │  6. coupon: claim a use atomically; lost race → degrade to 0            │
//! │  7. insert Sale (+ compensating coupon release on failure)              │
//! │  8. cash only: decrement inventory (failures logged, sale stands)       │
//! │                                                                         │
//! │  Steps 1-5 are read-only. The first write is the coupon claim in 6.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Coupon Degradation
//! The checkout path never aborts over a coupon. Any rule failure, or a
//! lost race for the last use, produces a sale with discount 0 and no
//! coupon reference. The standalone [`CheckoutService::validate_coupon`]
//! is the strict path that tells the cashier *why* a code doesn't work.

use std::collections::HashMap;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use nexus_core::{
    check_coupon, compute_sale_totals, discount_for, validation::validate_cart, CoreError, Coupon,
    DiscountType, LineItem, Money, PaymentMethod, PaymentStatus, PaymentTransaction, Sale,
    TransactionStatus,
};
use nexus_db::Database;

use crate::error::{CheckoutError, CheckoutResult};

// =============================================================================
// Request / Response Types
// =============================================================================

/// One cart line as submitted by the caller.
///
/// Only the item reference and quantity are accepted; names and prices are
/// snapshotted from the catalog so a client cannot price its own cart.
#[derive(Debug, Clone)]
pub struct CartLine {
    pub item_id: String,
    pub quantity: i64,
}

/// A checkout submission.
#[derive(Debug, Clone)]
pub struct CreateSaleRequest {
    pub items: Vec<CartLine>,
    pub customer_id: Option<String>,
    /// Explicit display name; wins over the customer lookup when present.
    pub customer_name: Option<String>,
    pub payment_method: PaymentMethod,
    pub coupon_code: Option<String>,
    /// Username of the cashier ringing the sale up.
    pub created_by: String,
}

/// Strict coupon preview returned by [`CheckoutService::validate_coupon`].
#[derive(Debug, Clone, Serialize)]
pub struct CouponPreview {
    pub code: String,
    pub discount_type: DiscountType,
    /// Discount the checkout would apply to this subtotal.
    pub discount_cents: i64,
}

// =============================================================================
// Checkout Service
// =============================================================================

/// Orchestrates checkout: pure math from nexus-core, writes via nexus-db.
#[derive(Debug, Clone)]
pub struct CheckoutService {
    db: Database,
}

impl CheckoutService {
    pub fn new(db: Database) -> Self {
        CheckoutService { db }
    }

    /// Creates a sale from a cart submission.
    ///
    /// Cash sales settle immediately (status `Completed`, inventory
    /// decremented before returning). Provider sales come back `Pending`
    /// and settle later through reconciliation.
    pub async fn create_sale(&self, request: CreateSaleRequest) -> CheckoutResult<Sale> {
        // ----- Read-only phase: resolve and compute -----

        let (lines, categories) = self.resolve_items(&request.items).await?;
        validate_cart(&lines).map_err(CoreError::Validation)?;

        let customer_name = self.resolve_customer_name(&request).await?;
        let settings = self.db.settings().get().await?;

        let coupon = match &request.coupon_code {
            Some(code) => self.db.coupons().find_by_code(code).await?,
            None => None,
        };

        let now = Utc::now();
        let mut totals = compute_sale_totals(
            &lines,
            &settings,
            |item_id| categories.get(item_id).cloned(),
            coupon.as_ref(),
            now,
        );

        // ----- Write phase starts here: claim the coupon use -----

        let mut redeemed: Option<&Coupon> = None;
        if totals.coupon_applied {
            // coupon_applied implies Some; the destructure is for the borrow
            if let Some(c) = coupon.as_ref() {
                if self.db.coupons().try_redeem(&c.id).await? {
                    redeemed = Some(c);
                } else {
                    // Lost the race for the last use: degrade, don't abort
                    info!(code = %c.code, "Coupon race lost, selling without discount");
                    totals = compute_sale_totals(
                        &lines,
                        &settings,
                        |item_id| categories.get(item_id).cloned(),
                        None,
                        now,
                    );
                }
            }
        }

        let payment_status = if request.payment_method.is_immediate() {
            PaymentStatus::Completed
        } else {
            PaymentStatus::Pending
        };

        let sale = Sale {
            id: Uuid::new_v4().to_string(),
            items: lines,
            customer_id: request.customer_id.clone(),
            customer_name,
            payment_method: request.payment_method,
            subtotal_cents: totals.subtotal_cents,
            tax_cents: totals.tax_cents,
            discount_cents: totals.discount_cents,
            coupon_code: redeemed.map(|c| c.code.clone()),
            coupon_id: redeemed.map(|c| c.id.clone()),
            total_cents: totals.total_cents,
            payment_status,
            stripe_session_id: None,
            paypal_order_id: None,
            created_by: request.created_by,
            created_at: now,
        };

        if let Err(err) = self.db.sales().insert(&sale).await {
            // Give the claimed coupon use back before surfacing the failure
            if let Some(c) = redeemed {
                if let Err(release_err) = self.db.coupons().release(&c.id).await {
                    warn!(
                        coupon_id = %c.id,
                        error = %release_err,
                        "Failed to release coupon use after sale insert failure"
                    );
                }
            }
            return Err(err.into());
        }

        info!(
            sale_id = %sale.id,
            total_cents = sale.total_cents,
            method = ?sale.payment_method,
            status = ?sale.payment_status,
            "Sale created"
        );

        // Cash settles at the counter: decrement stock now. The sale is
        // already persisted, so a decrement failure is logged and fixed up
        // out of band rather than unwinding the sale.
        if sale.payment_status == PaymentStatus::Completed {
            decrement_inventory(&self.db, &sale.id, &sale.items).await;
        }

        Ok(sale)
    }

    /// Strict, read-only coupon check for the cashier-facing validate
    /// entry point. Surfaces the exact rejection reason; nothing is
    /// redeemed or written.
    pub async fn validate_coupon(
        &self,
        code: &str,
        subtotal_cents: i64,
    ) -> CheckoutResult<CouponPreview> {
        let coupon = self.db.coupons().find_by_code(code).await?;
        let subtotal = Money::from_cents(subtotal_cents);

        let valid = check_coupon(coupon.as_ref(), subtotal, Utc::now())?;

        Ok(CouponPreview {
            code: valid.code.clone(),
            discount_type: valid.discount_type,
            discount_cents: discount_for(valid, subtotal).cents(),
        })
    }

    /// Records a provider session/order id against a pending sale and
    /// opens its payment transaction shadow record.
    ///
    /// Called once the provider has been asked for a checkout session;
    /// reconciliation later finds the sale through this record.
    pub async fn begin_provider_payment(
        &self,
        sale_id: &str,
        session_id: &str,
    ) -> CheckoutResult<PaymentTransaction> {
        let sale = self
            .db
            .sales()
            .get_by_id(sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;

        if sale.payment_status == PaymentStatus::Completed {
            return Err(CoreError::InvalidSaleStatus {
                sale_id: sale_id.to_string(),
                current_status: "completed".to_string(),
            }
            .into());
        }

        match sale.payment_method {
            PaymentMethod::Stripe => {
                self.db.sales().set_stripe_session(sale_id, session_id).await?;
            }
            PaymentMethod::PayPal => {
                self.db.sales().set_paypal_order(sale_id, session_id).await?;
            }
            PaymentMethod::Cash => {
                return Err(CheckoutError::NotAProviderMethod {
                    method: "cash".to_string(),
                });
            }
        }

        let settings = self.db.settings().get().await?;
        let tx = PaymentTransaction {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            sale_id: sale_id.to_string(),
            amount_cents: sale.total_cents,
            currency: settings.currency,
            status: TransactionStatus::Pending,
            metadata: None,
            created_at: Utc::now(),
        };
        self.db.payments().insert(&tx).await?;

        debug!(sale_id, session_id, "Provider payment initiated");
        Ok(tx)
    }

    // ----- Resolution helpers -----

    /// Resolves cart lines against the catalog, snapshotting name and
    /// price. Fails with `ItemNotFound` before any write happens.
    async fn resolve_items(
        &self,
        cart: &[CartLine],
    ) -> CheckoutResult<(Vec<LineItem>, HashMap<String, String>)> {
        let mut lines = Vec::with_capacity(cart.len());
        let mut categories = HashMap::new();

        for entry in cart {
            let item = self
                .db
                .inventory()
                .get_by_id(&entry.item_id)
                .await?
                .ok_or_else(|| CoreError::ItemNotFound(entry.item_id.clone()))?;

            categories.insert(item.id.clone(), item.category.clone());
            lines.push(LineItem::new(
                item.id,
                item.name,
                entry.quantity,
                item.selling_price_cents,
            ));
        }

        Ok((lines, categories))
    }

    /// Resolves the display name to freeze on the sale:
    /// explicit name > customer lookup > anonymous.
    async fn resolve_customer_name(
        &self,
        request: &CreateSaleRequest,
    ) -> CheckoutResult<Option<String>> {
        if let Some(name) = &request.customer_name {
            return Ok(Some(name.clone()));
        }

        match &request.customer_id {
            Some(id) => {
                let customer = self
                    .db
                    .customers()
                    .get_by_id(id)
                    .await?
                    .ok_or_else(|| CoreError::CustomerNotFound(id.clone()))?;
                Ok(Some(customer.name))
            }
            None => Ok(None),
        }
    }
}

// =============================================================================
// Shared Side Effects
// =============================================================================

/// Applies the per-sale inventory decrement, at most once per sale.
///
/// Runs after the sale (or its completion) is already durable; per-item
/// failures are logged and skipped so one missing catalog row cannot
/// block settlement.
pub(crate) async fn decrement_inventory(db: &Database, sale_id: &str, items: &[LineItem]) {
    for item in items {
        if let Err(err) = db.inventory().adjust_quantity(&item.item_id, -item.quantity).await {
            warn!(
                sale_id,
                item_id = %item.item_id,
                error = %err,
                "Inventory decrement failed, needs manual fix-up"
            );
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_core::{Coupon, Customer, InventoryItem};
    use nexus_db::{DbConfig, SettingsPatch};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_item(db: &Database, id: &str, category: &str, price_cents: i64, stock: i64) {
        db.inventory()
            .insert(&InventoryItem {
                id: id.to_string(),
                name: format!("Item {id}"),
                category: category.to_string(),
                barcode: None,
                quantity: stock,
                selling_price_cents: price_cents,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    async fn seed_coupon(db: &Database, id: &str, code: &str, coupon: Coupon) {
        let mut coupon = coupon;
        coupon.id = id.to_string();
        coupon.code = code.to_string();
        db.coupons().insert(&coupon).await.unwrap();
    }

    fn percentage_coupon(value_bps: i64, cap: Option<i64>, usage_limit: Option<i64>) -> Coupon {
        Coupon {
            id: String::new(),
            code: String::new(),
            discount_type: DiscountType::Percentage,
            discount_value: value_bps,
            min_purchase_cents: 0,
            max_discount_cents: cap,
            usage_limit,
            usage_count: 0,
            is_active: true,
            valid_from: None,
            valid_until: None,
            created_at: Utc::now(),
        }
    }

    fn cash_request(items: Vec<CartLine>) -> CreateSaleRequest {
        CreateSaleRequest {
            items,
            customer_id: None,
            customer_name: None,
            payment_method: PaymentMethod::Cash,
            coupon_code: None,
            created_by: "cashier".to_string(),
        }
    }

    #[tokio::test]
    async fn test_cash_sale_completes_and_decrements_stock() {
        let db = test_db().await;
        seed_item(&db, "i1", "phone", 10_000, 10).await;
        let service = CheckoutService::new(db.clone());

        let sale = service
            .create_sale(cash_request(vec![CartLine {
                item_id: "i1".to_string(),
                quantity: 2,
            }]))
            .await
            .unwrap();

        assert_eq!(sale.payment_status, PaymentStatus::Completed);
        assert_eq!(sale.subtotal_cents, 20_000);
        assert_eq!(sale.total_cents, 20_000); // tax defaults off
        assert_eq!(sale.items[0].item_name, "Item i1");

        // Persisted and stock moved
        let stored = db.sales().get_by_id(&sale.id).await.unwrap().unwrap();
        assert!(stored.is_paid());
        assert_eq!(db.inventory().get_by_id("i1").await.unwrap().unwrap().quantity, 8);
    }

    #[tokio::test]
    async fn test_provider_sale_stays_pending_without_decrement() {
        let db = test_db().await;
        seed_item(&db, "i1", "phone", 10_000, 10).await;
        let service = CheckoutService::new(db.clone());

        let mut request = cash_request(vec![CartLine {
            item_id: "i1".to_string(),
            quantity: 1,
        }]);
        request.payment_method = PaymentMethod::Stripe;

        let sale = service.create_sale(request).await.unwrap();
        assert_eq!(sale.payment_status, PaymentStatus::Pending);
        // Stock untouched until the payment settles
        assert_eq!(db.inventory().get_by_id("i1").await.unwrap().unwrap().quantity, 10);
    }

    #[tokio::test]
    async fn test_tax_applied_from_settings_snapshot() {
        let db = test_db().await;
        seed_item(&db, "phone-1", "phone", 10_000, 10).await;
        seed_item(&db, "part-1", "part", 10_000, 10).await;
        db.settings()
            .update(
                SettingsPatch {
                    tax_rate_bps: Some(1000),
                    tax_enabled: Some(true),
                    tax_exempt_categories: Some(vec!["part".to_string()]),
                    ..SettingsPatch::default()
                },
                "admin",
            )
            .await
            .unwrap();
        let service = CheckoutService::new(db);

        let sale = service
            .create_sale(cash_request(vec![
                CartLine { item_id: "phone-1".to_string(), quantity: 1 },
                CartLine { item_id: "part-1".to_string(), quantity: 1 },
            ]))
            .await
            .unwrap();

        // Only the phone line is taxed
        assert_eq!(sale.subtotal_cents, 20_000);
        assert_eq!(sale.tax_cents, 1_000);
        assert_eq!(sale.total_cents, 21_000);
    }

    #[tokio::test]
    async fn test_unknown_item_rejected_before_any_write() {
        let db = test_db().await;
        let service = CheckoutService::new(db.clone());

        let err = service
            .create_sale(cash_request(vec![CartLine {
                item_id: "ghost".to_string(),
                quantity: 1,
            }]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::Core(CoreError::ItemNotFound(ref id)) if id == "ghost"
        ));
        assert!(db.sales().list_recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_cart_rejected() {
        let db = test_db().await;
        let service = CheckoutService::new(db);

        let err = service.create_sale(cash_request(vec![])).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Core(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_unknown_customer_rejected() {
        let db = test_db().await;
        seed_item(&db, "i1", "phone", 1000, 5).await;
        let service = CheckoutService::new(db);

        let mut request = cash_request(vec![CartLine {
            item_id: "i1".to_string(),
            quantity: 1,
        }]);
        request.customer_id = Some("nobody".to_string());

        let err = service.create_sale(request).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Core(CoreError::CustomerNotFound(_))));
    }

    #[tokio::test]
    async fn test_customer_name_resolution_precedence() {
        let db = test_db().await;
        seed_item(&db, "i1", "phone", 1000, 5).await;
        db.customers()
            .insert(&Customer {
                id: "c1".to_string(),
                name: "Account Holder".to_string(),
                phone: None,
                email: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        let service = CheckoutService::new(db);

        // Explicit name wins over the lookup
        let mut request = cash_request(vec![CartLine { item_id: "i1".to_string(), quantity: 1 }]);
        request.customer_id = Some("c1".to_string());
        request.customer_name = Some("Walk-in".to_string());
        let sale = service.create_sale(request).await.unwrap();
        assert_eq!(sale.customer_name.as_deref(), Some("Walk-in"));

        // Lookup fills the name when no explicit one is given
        let mut request = cash_request(vec![CartLine { item_id: "i1".to_string(), quantity: 1 }]);
        request.customer_id = Some("c1".to_string());
        let sale = service.create_sale(request).await.unwrap();
        assert_eq!(sale.customer_name.as_deref(), Some("Account Holder"));
    }

    #[tokio::test]
    async fn test_coupon_applied_and_redeemed() {
        let db = test_db().await;
        seed_item(&db, "i1", "phone", 10_000, 10).await;
        seed_coupon(&db, "c1", "SAVE20", percentage_coupon(2000, Some(1500), None)).await;
        let service = CheckoutService::new(db.clone());

        let mut request = cash_request(vec![CartLine { item_id: "i1".to_string(), quantity: 1 }]);
        request.coupon_code = Some("save20".to_string());

        let sale = service.create_sale(request).await.unwrap();
        // 20% of $100 clamped to the $15 cap
        assert_eq!(sale.discount_cents, 1500);
        assert_eq!(sale.total_cents, 8500);
        assert_eq!(sale.coupon_code.as_deref(), Some("SAVE20"));
        assert_eq!(sale.coupon_id.as_deref(), Some("c1"));

        let coupon = db.coupons().get_by_id("c1").await.unwrap().unwrap();
        assert_eq!(coupon.usage_count, 1);
    }

    #[tokio::test]
    async fn test_failing_coupon_degrades_silently() {
        let db = test_db().await;
        seed_item(&db, "i1", "phone", 1000, 10).await;
        let mut coupon = percentage_coupon(2000, None, None);
        coupon.min_purchase_cents = 5000;
        seed_coupon(&db, "c1", "BIG", coupon).await;
        let service = CheckoutService::new(db.clone());

        let mut request = cash_request(vec![CartLine { item_id: "i1".to_string(), quantity: 1 }]);
        request.coupon_code = Some("BIG".to_string());

        // Checkout succeeds with no discount and no coupon reference
        let sale = service.create_sale(request).await.unwrap();
        assert_eq!(sale.discount_cents, 0);
        assert_eq!(sale.total_cents, 1000);
        assert!(sale.coupon_code.is_none());
        assert!(sale.coupon_id.is_none());

        // And no use was consumed
        assert_eq!(db.coupons().get_by_id("c1").await.unwrap().unwrap().usage_count, 0);
    }

    #[tokio::test]
    async fn test_last_coupon_use_goes_to_one_sale() {
        let db = test_db().await;
        seed_item(&db, "i1", "phone", 10_000, 10).await;
        seed_coupon(&db, "c1", "ONCE", percentage_coupon(1000, None, Some(1))).await;
        let service = CheckoutService::new(db.clone());

        let request = |code: &str| {
            let mut r = cash_request(vec![CartLine { item_id: "i1".to_string(), quantity: 1 }]);
            r.coupon_code = Some(code.to_string());
            r
        };

        let first = service.create_sale(request("ONCE")).await.unwrap();
        assert_eq!(first.discount_cents, 1000);

        // The second sale sees the exhausted limit and degrades
        let second = service.create_sale(request("ONCE")).await.unwrap();
        assert_eq!(second.discount_cents, 0);
        assert!(second.coupon_code.is_none());

        assert_eq!(db.coupons().get_by_id("c1").await.unwrap().unwrap().usage_count, 1);
    }

    #[tokio::test]
    async fn test_concurrent_checkouts_race_for_last_coupon_use() {
        let db = test_db().await;
        seed_item(&db, "i1", "phone", 10_000, 20).await;
        seed_coupon(&db, "c1", "ONCE", percentage_coupon(1000, None, Some(1))).await;
        let service = CheckoutService::new(db.clone());

        let request = || {
            let mut r = cash_request(vec![CartLine { item_id: "i1".to_string(), quantity: 1 }]);
            r.coupon_code = Some("ONCE".to_string());
            r
        };

        let (a, b) = tokio::join!(service.create_sale(request()), service.create_sale(request()));
        let (a, b) = (a.unwrap(), b.unwrap());

        // Exactly one sale carries the discount, the other degraded to 0
        let discounts = [a.discount_cents, b.discount_cents];
        assert!(discounts.contains(&1000) && discounts.contains(&0));
        assert_eq!(
            [&a, &b].iter().filter(|s| s.coupon_id.is_some()).count(),
            1
        );

        // The counter never exceeds the limit
        assert_eq!(db.coupons().get_by_id("c1").await.unwrap().unwrap().usage_count, 1);
    }

    #[tokio::test]
    async fn test_validate_coupon_strict() {
        let db = test_db().await;
        seed_coupon(&db, "c1", "SAVE20", percentage_coupon(2000, Some(1500), None)).await;
        let mut expired = percentage_coupon(1000, None, None);
        expired.valid_until = Some(Utc::now() - chrono::Duration::hours(1));
        seed_coupon(&db, "c2", "OLD", expired).await;
        let service = CheckoutService::new(db);

        let preview = service.validate_coupon("save20", 10_000).await.unwrap();
        assert_eq!(preview.code, "SAVE20");
        assert_eq!(preview.discount_cents, 1500);

        // Unlike checkout, validation surfaces the reason as an error
        let err = service.validate_coupon("OLD", 10_000).await.unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::CouponRejected(nexus_core::CouponRejection::Expired)
        ));

        let err = service.validate_coupon("MISSING", 10_000).await.unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::CouponRejected(nexus_core::CouponRejection::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_begin_provider_payment() {
        let db = test_db().await;
        seed_item(&db, "i1", "phone", 10_000, 10).await;
        let service = CheckoutService::new(db.clone());

        let mut request = cash_request(vec![CartLine { item_id: "i1".to_string(), quantity: 1 }]);
        request.payment_method = PaymentMethod::Stripe;
        let sale = service.create_sale(request).await.unwrap();

        let tx = service.begin_provider_payment(&sale.id, "cs_test_1").await.unwrap();
        assert_eq!(tx.amount_cents, 10_000);
        assert_eq!(tx.status, TransactionStatus::Pending);

        let stored = db.sales().get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(stored.stripe_session_id.as_deref(), Some("cs_test_1"));
    }

    #[tokio::test]
    async fn test_begin_provider_payment_rejects_completed_sale() {
        let db = test_db().await;
        seed_item(&db, "i1", "phone", 10_000, 10).await;
        let service = CheckoutService::new(db);

        let sale = service
            .create_sale(cash_request(vec![CartLine { item_id: "i1".to_string(), quantity: 1 }]))
            .await
            .unwrap();

        let err = service.begin_provider_payment(&sale.id, "cs_test_1").await.unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Core(CoreError::InvalidSaleStatus { .. })
        ));
    }
}
