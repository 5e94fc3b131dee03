//! # Inventory Repository
//!
//! Catalog lookups and stock adjustments.
//!
//! The sale engine touches inventory in exactly two ways: reading an item
//! (price, name, category) while building a cart, and applying a quantity
//! delta once a sale's payment settles. The delta is a single in-SQL
//! `quantity = quantity + ?` update so concurrent sales never lose a
//! decrement to a read-modify-write race.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use nexus_core::InventoryItem;

use crate::error::{DbError, DbResult};

/// Repository for inventory items.
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

/// Raw database row, converted to the domain type after fetch.
#[derive(sqlx::FromRow)]
struct InventoryRow {
    id: String,
    name: String,
    category: String,
    barcode: Option<String>,
    quantity: i64,
    selling_price_cents: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<InventoryRow> for InventoryItem {
    fn from(row: InventoryRow) -> Self {
        InventoryItem {
            id: row.id,
            name: row.name,
            category: row.category,
            barcode: row.barcode,
            quantity: row.quantity,
            selling_price_cents: row.selling_price_cents,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl InventoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    /// Inserts a new inventory item.
    pub async fn insert(&self, item: &InventoryItem) -> DbResult<()> {
        debug!(item_id = %item.id, name = %item.name, "Inserting inventory item");

        sqlx::query(
            r#"
            INSERT INTO inventory
                (id, name, category, barcode, quantity, selling_price_cents, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.id)
        .bind(&item.name)
        .bind(&item.category)
        .bind(&item.barcode)
        .bind(item.quantity)
        .bind(item.selling_price_cents)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fetches an item by id. Returns `None` when absent.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<InventoryItem>> {
        let row = sqlx::query_as::<_, InventoryRow>(
            "SELECT id, name, category, barcode, quantity, selling_price_cents, created_at, updated_at
             FROM inventory WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(InventoryItem::from))
    }

    /// Fetches an item by barcode.
    pub async fn get_by_barcode(&self, barcode: &str) -> DbResult<Option<InventoryItem>> {
        let row = sqlx::query_as::<_, InventoryRow>(
            "SELECT id, name, category, barcode, quantity, selling_price_cents, created_at, updated_at
             FROM inventory WHERE barcode = ?",
        )
        .bind(barcode)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(InventoryItem::from))
    }

    /// Lists all items, ordered by name.
    pub async fn list(&self) -> DbResult<Vec<InventoryItem>> {
        let rows = sqlx::query_as::<_, InventoryRow>(
            "SELECT id, name, category, barcode, quantity, selling_price_cents, created_at, updated_at
             FROM inventory ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(InventoryItem::from).collect())
    }

    /// Applies a quantity delta (negative to decrement) in a single update.
    ///
    /// Quantity is allowed to go negative; an oversell shows up in stock
    /// reports rather than blocking the sale that already settled.
    ///
    /// Returns `DbError::NotFound` when no row matches.
    pub async fn adjust_quantity(&self, id: &str, delta: i64) -> DbResult<()> {
        debug!(item_id = %id, delta, "Adjusting inventory quantity");

        let result = sqlx::query(
            "UPDATE inventory SET quantity = quantity + ?, updated_at = ? WHERE id = ?",
        )
        .bind(delta)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("InventoryItem", id));
        }

        Ok(())
    }

    /// Lists items at or below the given stock threshold.
    pub async fn low_stock(&self, threshold: i64) -> DbResult<Vec<InventoryItem>> {
        let rows = sqlx::query_as::<_, InventoryRow>(
            "SELECT id, name, category, barcode, quantity, selling_price_cents, created_at, updated_at
             FROM inventory WHERE quantity <= ? ORDER BY quantity",
        )
        .bind(threshold)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(InventoryItem::from).collect())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn sample_item(id: &str, quantity: i64) -> InventoryItem {
        InventoryItem {
            id: id.to_string(),
            name: format!("Item {id}"),
            category: "accessory".to_string(),
            barcode: Some(format!("bc-{id}")),
            quantity,
            selling_price_cents: 1999,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.inventory();

        repo.insert(&sample_item("i1", 10)).await.unwrap();

        let found = repo.get_by_id("i1").await.unwrap().unwrap();
        assert_eq!(found.name, "Item i1");
        assert_eq!(found.quantity, 10);
        assert_eq!(found.selling_price_cents, 1999);

        assert!(repo.get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_by_barcode() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.inventory();

        repo.insert(&sample_item("i1", 5)).await.unwrap();

        let found = repo.get_by_barcode("bc-i1").await.unwrap().unwrap();
        assert_eq!(found.id, "i1");
        assert!(repo.get_by_barcode("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_adjust_quantity_delta() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.inventory();

        repo.insert(&sample_item("i1", 10)).await.unwrap();

        repo.adjust_quantity("i1", -3).await.unwrap();
        assert_eq!(repo.get_by_id("i1").await.unwrap().unwrap().quantity, 7);

        // Quantity may go negative (oversell is reportable, not fatal)
        repo.adjust_quantity("i1", -20).await.unwrap();
        assert_eq!(repo.get_by_id("i1").await.unwrap().unwrap().quantity, -13);
    }

    #[tokio::test]
    async fn test_adjust_quantity_missing_item() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.inventory();

        let err = repo.adjust_quantity("ghost", -1).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_low_stock() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.inventory();

        repo.insert(&sample_item("a", 2)).await.unwrap();
        repo.insert(&sample_item("b", 50)).await.unwrap();
        repo.insert(&sample_item("c", 0)).await.unwrap();

        let low = repo.low_stock(5).await.unwrap();
        let ids: Vec<&str> = low.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
    }
}
