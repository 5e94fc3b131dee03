//! # Payment Transaction Repository
//!
//! Shadow records for in-flight provider payments, keyed by the provider's
//! session/order id. `mark()` only ever moves a transaction out of
//! `pending`, so a replayed confirmation cannot overwrite a settled state.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use nexus_core::{PaymentTransaction, TransactionStatus};

use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
pub struct PaymentTransactionRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct PaymentTransactionRow {
    id: String,
    session_id: String,
    sale_id: String,
    amount_cents: i64,
    currency: String,
    status: TransactionStatus,
    metadata: Option<String>,
    created_at: DateTime<Utc>,
}

impl PaymentTransactionRow {
    fn into_transaction(self) -> DbResult<PaymentTransaction> {
        let metadata = match self.metadata {
            Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| DbError::CorruptColumn {
                entity: "PaymentTransaction".to_string(),
                id: self.id.clone(),
                column: "metadata".to_string(),
                message: e.to_string(),
            })?),
            None => None,
        };

        Ok(PaymentTransaction {
            id: self.id,
            session_id: self.session_id,
            sale_id: self.sale_id,
            amount_cents: self.amount_cents,
            currency: self.currency,
            status: self.status,
            metadata,
            created_at: self.created_at,
        })
    }
}

impl PaymentTransactionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PaymentTransactionRepository { pool }
    }

    /// Inserts a new transaction. The unique index on `session_id` rejects
    /// a duplicate provider session.
    pub async fn insert(&self, tx: &PaymentTransaction) -> DbResult<()> {
        debug!(session_id = %tx.session_id, sale_id = %tx.sale_id, "Inserting payment transaction");

        let metadata_json = match &tx.metadata {
            Some(value) => {
                Some(serde_json::to_string(value).map_err(|e| DbError::Internal(e.to_string()))?)
            }
            None => None,
        };

        sqlx::query(
            r#"
            INSERT INTO payment_transactions
                (id, session_id, sale_id, amount_cents, currency, status, metadata, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&tx.id)
        .bind(&tx.session_id)
        .bind(&tx.sale_id)
        .bind(tx.amount_cents)
        .bind(&tx.currency)
        .bind(tx.status)
        .bind(metadata_json)
        .bind(tx.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Looks up a transaction by the provider's session/order id.
    pub async fn find_by_session(&self, session_id: &str) -> DbResult<Option<PaymentTransaction>> {
        let row = sqlx::query_as::<_, PaymentTransactionRow>(
            "SELECT id, session_id, sale_id, amount_cents, currency, status, metadata, created_at
             FROM payment_transactions WHERE session_id = ?",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PaymentTransactionRow::into_transaction).transpose()
    }

    /// Transitions a transaction to `status`. `completed` is terminal;
    /// a `failed` transaction can still move to `completed` (the provider
    /// retried and the payment went through), but never back to `pending`
    /// or `failed`. Returns `false` when no transition happened, which is
    /// how replayed provider confirmations are detected.
    pub async fn mark(&self, session_id: &str, status: TransactionStatus) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE payment_transactions SET status = ?
             WHERE session_id = ? AND status != 'completed' AND status != ?",
        )
        .bind(status)
        .bind(session_id)
        .bind(status)
        .execute(&self.pool)
        .await?;

        let transitioned = result.rows_affected() == 1;
        debug!(session_id, ?status, transitioned, "Payment transaction mark");
        Ok(transitioned)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
