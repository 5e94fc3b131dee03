//! # Payment Reconciliation
//!
//! The single idempotent settlement path for provider payments. Success
//! polls, webhooks, and capture callbacks all funnel into
//! [`ReconciliationService::reconcile`]; none of them carries its own
//! completion logic.
//!
//! ## Idempotency Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  reconcile(session_id, Paid)                                            │
//! │                                                                         │
//! │  layer 1: per-sale async lock  (serializes triggers in this process)    │
//! │  layer 2: sale completion CAS  (serializes across processes;            │
//! │           rows_affected picks exactly one winner)                       │
//! │                                                                         │
//! │  only the CAS winner decrements inventory. Every later call             │
//! │  short-circuits with already_completed = true.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A provider-reported failure marks the transaction `Failed` and leaves
//! the sale `Pending`, so the customer can retry. A later paid report for
//! the same session still settles the sale and moves the transaction on
//! to `Completed`; only `Completed` is terminal.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{info, warn};

use nexus_core::{PaymentStatus, TransactionStatus};
use nexus_db::Database;

use crate::checkout::decrement_inventory;
use crate::error::{CheckoutError, CheckoutResult};

// =============================================================================
// Types
// =============================================================================

/// What the payment provider reported for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportedStatus {
    /// Provider confirms the payment settled.
    Paid,
    /// Provider reports the payment did not go through.
    Failed,
}

/// Result of a reconciliation call.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileOutcome {
    pub sale_id: String,
    /// True when the sale had already settled before this call; completion
    /// side effects were NOT repeated.
    pub already_completed: bool,
    /// Sale payment status after this call.
    pub payment_status: PaymentStatus,
}

// =============================================================================
// Reconciliation Service
// =============================================================================

/// Settles provider payments exactly once.
#[derive(Debug, Clone)]
pub struct ReconciliationService {
    db: Database,
    /// Per-sale-id locks. Entries are never evicted; the map holds one
    /// slot per sale this process has reconciled.
    locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl ReconciliationService {
    pub fn new(db: Database) -> Self {
        ReconciliationService {
            db,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Applies a provider-reported outcome to the owning sale.
    ///
    /// Safe to call any number of times, from any trigger, concurrently.
    pub async fn reconcile(
        &self,
        session_id: &str,
        reported: ReportedStatus,
    ) -> CheckoutResult<ReconcileOutcome> {
        let tx = self
            .db
            .payments()
            .find_by_session(session_id)
            .await?
            .ok_or_else(|| CheckoutError::TransactionNotFound(session_id.to_string()))?;

        let lock = self.sale_lock(&tx.sale_id);
        let _guard = lock.lock().await;

        match reported {
            ReportedStatus::Failed => {
                let marked = self
                    .db
                    .payments()
                    .mark(session_id, TransactionStatus::Failed)
                    .await?;
                if marked {
                    info!(session_id, sale_id = %tx.sale_id, "Payment failed, sale stays pending");
                } else {
                    warn!(session_id, "Failure report for an already-settled transaction");
                }

                // Report the sale's actual state: a failure replayed after
                // settlement must not claim the sale is still pending.
                let status = self
                    .db
                    .sales()
                    .get_by_id(&tx.sale_id)
                    .await?
                    .map(|s| s.payment_status)
                    .unwrap_or(PaymentStatus::Pending);

                Ok(ReconcileOutcome {
                    sale_id: tx.sale_id,
                    already_completed: status == PaymentStatus::Completed,
                    payment_status: status,
                })
            }

            ReportedStatus::Paid => {
                // The CAS picks exactly one winner across all triggers and
                // processes; only the winner runs completion side effects.
                let won = self.db.sales().complete(&tx.sale_id).await?;

                // Converge the shadow record regardless of who won; a
                // transaction that failed earlier moves to completed here.
                self.db
                    .payments()
                    .mark(session_id, TransactionStatus::Completed)
                    .await?;

                if won {
                    let items = self.db.sales().get_items(&tx.sale_id).await?;
                    decrement_inventory(&self.db, &tx.sale_id, &items).await;

                    info!(session_id, sale_id = %tx.sale_id, "Payment reconciled, sale completed");
                } else {
                    info!(session_id, sale_id = %tx.sale_id, "Repeat confirmation, no-op");
                }

                Ok(ReconcileOutcome {
                    sale_id: tx.sale_id,
                    already_completed: !won,
                    payment_status: PaymentStatus::Completed,
                })
            }
        }
    }

    /// Returns the lock slot for a sale, creating it on first use.
    fn sale_lock(&self, sale_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = match self.locks.lock() {
            Ok(map) => map,
            // A poisoned map only means another thread panicked while
            // inserting; the data is still a valid HashMap.
            Err(poisoned) => poisoned.into_inner(),
        };
        map.entry(sale_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::{CartLine, CheckoutService, CreateSaleRequest};
    use chrono::Utc;
    use nexus_core::{InventoryItem, PaymentMethod, Sale};
    use nexus_db::DbConfig;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    /// Seeds an item, creates a pending Stripe sale for it, and opens the
    /// payment transaction. Returns the sale.
    async fn pending_stripe_sale(db: &Database, session_id: &str) -> Sale {
        db.inventory()
            .insert(&InventoryItem {
                id: "i1".to_string(),
                name: "Phone".to_string(),
                category: "phone".to_string(),
                barcode: None,
                quantity: 10,
                selling_price_cents: 10_000,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();

        let checkout = CheckoutService::new(db.clone());
        let sale = checkout
            .create_sale(CreateSaleRequest {
                items: vec![CartLine {
                    item_id: "i1".to_string(),
                    quantity: 2,
                }],
                customer_id: None,
                customer_name: None,
                payment_method: PaymentMethod::Stripe,
                coupon_code: None,
                created_by: "cashier".to_string(),
            })
            .await
            .unwrap();
        checkout
            .begin_provider_payment(&sale.id, session_id)
            .await
            .unwrap();
        sale
    }

    #[tokio::test]
    async fn test_paid_reconcile_completes_sale_and_decrements_once() {
        let db = test_db().await;
        let sale = pending_stripe_sale(&db, "sess_1").await;
        let service = ReconciliationService::new(db.clone());

        let outcome = service.reconcile("sess_1", ReportedStatus::Paid).await.unwrap();
        assert_eq!(outcome.sale_id, sale.id);
        assert!(!outcome.already_completed);
        assert_eq!(outcome.payment_status, PaymentStatus::Completed);

        let stored = db.sales().get_by_id(&sale.id).await.unwrap().unwrap();
        assert!(stored.is_paid());
        assert_eq!(db.inventory().get_by_id("i1").await.unwrap().unwrap().quantity, 8);

        let tx = db.payments().find_by_session("sess_1").await.unwrap().unwrap();
        assert_eq!(tx.status, TransactionStatus::Completed);
    }

    #[tokio::test]
    async fn test_repeat_confirmation_is_a_noop() {
        let db = test_db().await;
        pending_stripe_sale(&db, "sess_1").await;
        let service = ReconciliationService::new(db.clone());

        service.reconcile("sess_1", ReportedStatus::Paid).await.unwrap();
        // Webhook and poll both confirming: second call must not decrement
        let outcome = service.reconcile("sess_1", ReportedStatus::Paid).await.unwrap();
        assert!(outcome.already_completed);

        assert_eq!(db.inventory().get_by_id("i1").await.unwrap().unwrap().quantity, 8);
    }

    #[tokio::test]
    async fn test_concurrent_confirmations_decrement_once() {
        let db = test_db().await;
        pending_stripe_sale(&db, "sess_1").await;
        let service = ReconciliationService::new(db.clone());

        let (a, b) = tokio::join!(
            service.reconcile("sess_1", ReportedStatus::Paid),
            service.reconcile("sess_1", ReportedStatus::Paid),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        // Exactly one winner
        assert!(a.already_completed != b.already_completed);
        assert_eq!(db.inventory().get_by_id("i1").await.unwrap().unwrap().quantity, 8);
    }

    #[tokio::test]
    async fn test_failed_report_leaves_sale_pending() {
        let db = test_db().await;
        let sale = pending_stripe_sale(&db, "sess_1").await;
        let service = ReconciliationService::new(db.clone());

        let outcome = service.reconcile("sess_1", ReportedStatus::Failed).await.unwrap();
        assert!(!outcome.already_completed);
        assert_eq!(outcome.payment_status, PaymentStatus::Pending);

        let stored = db.sales().get_by_id(&sale.id).await.unwrap().unwrap();
        assert!(!stored.is_paid());
        // No decrement on failure
        assert_eq!(db.inventory().get_by_id("i1").await.unwrap().unwrap().quantity, 10);

        let tx = db.payments().find_by_session("sess_1").await.unwrap().unwrap();
        assert_eq!(tx.status, TransactionStatus::Failed);
    }

    #[tokio::test]
    async fn test_failed_then_paid_converges() {
        let db = test_db().await;
        let sale = pending_stripe_sale(&db, "sess_1").await;
        let service = ReconciliationService::new(db.clone());

        // Provider first reports a failure, then the retried payment lands
        service.reconcile("sess_1", ReportedStatus::Failed).await.unwrap();
        let outcome = service.reconcile("sess_1", ReportedStatus::Paid).await.unwrap();
        assert!(!outcome.already_completed);

        // Sale and shadow transaction must agree
        let stored = db.sales().get_by_id(&sale.id).await.unwrap().unwrap();
        assert!(stored.is_paid());
        let tx = db.payments().find_by_session("sess_1").await.unwrap().unwrap();
        assert_eq!(tx.status, TransactionStatus::Completed);

        assert_eq!(db.inventory().get_by_id("i1").await.unwrap().unwrap().quantity, 8);
    }

    #[tokio::test]
    async fn test_late_failure_report_reflects_settled_sale() {
        let db = test_db().await;
        pending_stripe_sale(&db, "sess_1").await;
        let service = ReconciliationService::new(db.clone());

        service.reconcile("sess_1", ReportedStatus::Paid).await.unwrap();

        // A stale failure report must describe what actually happened
        let outcome = service.reconcile("sess_1", ReportedStatus::Failed).await.unwrap();
        assert!(outcome.already_completed);
        assert_eq!(outcome.payment_status, PaymentStatus::Completed);

        let tx = db.payments().find_by_session("sess_1").await.unwrap().unwrap();
        assert_eq!(tx.status, TransactionStatus::Completed);
    }

    #[tokio::test]
    async fn test_unknown_session_rejected() {
        let db = test_db().await;
        let service = ReconciliationService::new(db);

        let err = service.reconcile("sess_x", ReportedStatus::Paid).await.unwrap_err();
        assert!(matches!(err, CheckoutError::TransactionNotFound(_)));
    }
}
