//! # Sale Repository
//!
//! Sale persistence and the payment-completion CAS.
//!
//! ## Write Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  insert()    sale row + all line items in ONE transaction               │
//! │              (a sale with half its items is never observable)           │
//! │                                                                         │
//! │  complete()  UPDATE ... SET payment_status = 'completed'                │
//! │              WHERE id = ? AND payment_status = 'pending'                │
//! │              → rows_affected tells the caller whether THIS call         │
//! │                performed the transition. Exactly one concurrent         │
//! │                confirmation wins; everyone else sees `false`.           │
//! │                                                                         │
//! │  totals      frozen at insert, never updated                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use nexus_core::{LineItem, PaymentMethod, PaymentStatus, Sale};

use crate::error::DbResult;

/// Repository for sales and their embedded line items.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct SaleRow {
    id: String,
    customer_id: Option<String>,
    customer_name: Option<String>,
    payment_method: PaymentMethod,
    subtotal_cents: i64,
    tax_cents: i64,
    discount_cents: i64,
    coupon_code: Option<String>,
    coupon_id: Option<String>,
    total_cents: i64,
    payment_status: PaymentStatus,
    stripe_session_id: Option<String>,
    paypal_order_id: Option<String>,
    created_by: String,
    created_at: DateTime<Utc>,
}

impl SaleRow {
    fn into_sale(self, items: Vec<LineItem>) -> Sale {
        Sale {
            id: self.id,
            items,
            customer_id: self.customer_id,
            customer_name: self.customer_name,
            payment_method: self.payment_method,
            subtotal_cents: self.subtotal_cents,
            tax_cents: self.tax_cents,
            discount_cents: self.discount_cents,
            coupon_code: self.coupon_code,
            coupon_id: self.coupon_id,
            total_cents: self.total_cents,
            payment_status: self.payment_status,
            stripe_session_id: self.stripe_session_id,
            paypal_order_id: self.paypal_order_id,
            created_by: self.created_by,
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SaleItemRow {
    item_id: String,
    item_name: String,
    quantity: i64,
    unit_price_cents: i64,
    line_subtotal_cents: i64,
}

impl From<SaleItemRow> for LineItem {
    fn from(row: SaleItemRow) -> Self {
        LineItem {
            item_id: row.item_id,
            item_name: row.item_name,
            quantity: row.quantity,
            unit_price_cents: row.unit_price_cents,
            line_subtotal_cents: row.line_subtotal_cents,
        }
    }
}

const SALE_COLUMNS: &str = "id, customer_id, customer_name, payment_method, subtotal_cents, \
     tax_cents, discount_cents, coupon_code, coupon_id, total_cents, payment_status, \
     stripe_session_id, paypal_order_id, created_by, created_at";

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Persists a sale and all its line items atomically.
    pub async fn insert(&self, sale: &Sale) -> DbResult<()> {
        debug!(sale_id = %sale.id, items = sale.items.len(), total_cents = sale.total_cents, "Inserting sale");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO sales
                (id, customer_id, customer_name, payment_method, subtotal_cents,
                 tax_cents, discount_cents, coupon_code, coupon_id, total_cents,
                 payment_status, stripe_session_id, paypal_order_id, created_by, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.customer_id)
        .bind(&sale.customer_name)
        .bind(sale.payment_method)
        .bind(sale.subtotal_cents)
        .bind(sale.tax_cents)
        .bind(sale.discount_cents)
        .bind(&sale.coupon_code)
        .bind(&sale.coupon_id)
        .bind(sale.total_cents)
        .bind(sale.payment_status)
        .bind(&sale.stripe_session_id)
        .bind(&sale.paypal_order_id)
        .bind(&sale.created_by)
        .bind(sale.created_at)
        .execute(&mut *tx)
        .await?;

        for item in &sale.items {
            sqlx::query(
                r#"
                INSERT INTO sale_items
                    (id, sale_id, item_id, item_name, quantity, unit_price_cents, line_subtotal_cents)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&sale.id)
            .bind(&item.item_id)
            .bind(&item.item_name)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.line_subtotal_cents)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Fetches a sale with its line items.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let row = sqlx::query_as::<_, SaleRow>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let items = self.get_items(id).await?;
                Ok(Some(row.into_sale(items)))
            }
            None => Ok(None),
        }
    }

    /// Fetches the line items of a sale, in insertion order.
    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<LineItem>> {
        let rows = sqlx::query_as::<_, SaleItemRow>(
            "SELECT item_id, item_name, quantity, unit_price_cents, line_subtotal_cents
             FROM sale_items WHERE sale_id = ? ORDER BY rowid",
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(LineItem::from).collect())
    }

    /// The payment-completion CAS: moves a pending sale to completed.
    ///
    /// Returns `true` only for the call that performed the transition.
    /// Concurrent or replayed confirmations for the same sale get `false`
    /// and must not repeat completion side effects (inventory decrement).
    pub async fn complete(&self, id: &str) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE sales SET payment_status = 'completed' WHERE id = ? AND payment_status = 'pending'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        let transitioned = result.rows_affected() == 1;
        debug!(sale_id = %id, transitioned, "Sale completion attempt");
        Ok(transitioned)
    }

    /// Records the Stripe checkout session id on a sale.
    pub async fn set_stripe_session(&self, id: &str, session_id: &str) -> DbResult<()> {
        sqlx::query("UPDATE sales SET stripe_session_id = ? WHERE id = ?")
            .bind(session_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Records the PayPal order id on a sale.
    pub async fn set_paypal_order(&self, id: &str, order_id: &str) -> DbResult<()> {
        sqlx::query("UPDATE sales SET paypal_order_id = ? WHERE id = ?")
            .bind(order_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Most recent sales first, without line items (list views).
    pub async fn list_recent(&self, limit: i64) -> DbResult<Vec<Sale>> {
        let rows = sqlx::query_as::<_, SaleRow>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales ORDER BY created_at DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_sale(Vec::new())).collect())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
