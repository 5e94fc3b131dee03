//! # Coupon Repository
//!
//! Coupon lookups plus the atomic usage counter.
//!
//! ## The Redemption Race
//! Two checkouts can race for the last use of a limited coupon. The fix
//! lives here, not in application code: `try_redeem` is one conditional
//! UPDATE whose WHERE clause re-checks the limit, so SQLite's write
//! serialization guarantees at most `usage_limit` increments ever land.
//! The caller learns whether it won from `rows_affected`.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use nexus_core::{normalize_code, Coupon, DiscountType};

use crate::error::DbResult;

#[derive(Debug, Clone)]
pub struct CouponRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct CouponRow {
    id: String,
    code: String,
    discount_type: DiscountType,
    discount_value: i64,
    min_purchase_cents: i64,
    max_discount_cents: Option<i64>,
    usage_limit: Option<i64>,
    usage_count: i64,
    is_active: bool,
    valid_from: Option<DateTime<Utc>>,
    valid_until: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<CouponRow> for Coupon {
    fn from(row: CouponRow) -> Self {
        Coupon {
            id: row.id,
            code: row.code,
            discount_type: row.discount_type,
            discount_value: row.discount_value,
            min_purchase_cents: row.min_purchase_cents,
            max_discount_cents: row.max_discount_cents,
            usage_limit: row.usage_limit,
            usage_count: row.usage_count,
            is_active: row.is_active,
            valid_from: row.valid_from,
            valid_until: row.valid_until,
            created_at: row.created_at,
        }
    }
}

const COUPON_COLUMNS: &str = "id, code, discount_type, discount_value, min_purchase_cents, \
     max_discount_cents, usage_limit, usage_count, is_active, valid_from, valid_until, created_at";

impl CouponRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CouponRepository { pool }
    }

    /// Inserts a new coupon. The code is stored uppercased.
    pub async fn insert(&self, coupon: &Coupon) -> DbResult<()> {
        debug!(code = %coupon.code, "Inserting coupon");

        sqlx::query(
            r#"
            INSERT INTO coupons
                (id, code, discount_type, discount_value, min_purchase_cents,
                 max_discount_cents, usage_limit, usage_count, is_active,
                 valid_from, valid_until, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&coupon.id)
        .bind(normalize_code(&coupon.code))
        .bind(coupon.discount_type)
        .bind(coupon.discount_value)
        .bind(coupon.min_purchase_cents)
        .bind(coupon.max_discount_cents)
        .bind(coupon.usage_limit)
        .bind(coupon.usage_count)
        .bind(coupon.is_active)
        .bind(coupon.valid_from)
        .bind(coupon.valid_until)
        .bind(coupon.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Looks up a coupon by code. Input is normalized (trimmed, uppercased)
    /// before the lookup, matching how codes are stored.
    pub async fn find_by_code(&self, code: &str) -> DbResult<Option<Coupon>> {
        let row = sqlx::query_as::<_, CouponRow>(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons WHERE code = ?"
        ))
        .bind(normalize_code(code))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Coupon::from))
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Coupon>> {
        let row = sqlx::query_as::<_, CouponRow>(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Coupon::from))
    }

    /// Atomically claims one use of the coupon.
    ///
    /// Returns `true` when this call won an increment, `false` when the
    /// coupon is inactive, missing, or already at its usage limit. The
    /// WHERE clause is the whole point: the limit check and the increment
    /// happen in one serialized write.
    pub async fn try_redeem(&self, id: &str) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE coupons
            SET usage_count = usage_count + 1
            WHERE id = ?
              AND is_active = 1
              AND (usage_limit IS NULL OR usage_count < usage_limit)
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        let won = result.rows_affected() == 1;
        debug!(coupon_id = %id, won, "Coupon redemption attempt");
        Ok(won)
    }

    /// Compensating decrement for a redemption whose sale failed to persist.
    ///
    /// Guarded by `usage_count > 0` so a stray release can never drive the
    /// counter negative.
    pub async fn release(&self, id: &str) -> DbResult<()> {
        debug!(coupon_id = %id, "Releasing coupon use");

        sqlx::query(
            "UPDATE coupons SET usage_count = usage_count - 1 WHERE id = ? AND usage_count > 0",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
