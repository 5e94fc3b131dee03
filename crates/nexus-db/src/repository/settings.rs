//! # Settings Repository
//!
//! The singleton tax configuration row.
//!
//! `get()` lazily seeds the row with defaults on first access (INSERT OR
//! IGNORE, so two racing first reads can't both insert). `update()` applies
//! a partial patch: only the fields present in the patch change, the rest
//! keep their stored values.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use nexus_core::{TaxSettings, SETTINGS_ID};

use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

/// Partial update for the settings row. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct SettingsPatch {
    pub tax_rate_bps: Option<u32>,
    pub tax_enabled: Option<bool>,
    pub tax_exempt_categories: Option<Vec<String>>,
    pub currency: Option<String>,
}

#[derive(sqlx::FromRow)]
struct SettingsRow {
    tax_rate_bps: i64,
    tax_enabled: bool,
    tax_exempt_categories: String,
    currency: String,
    updated_at: DateTime<Utc>,
    updated_by: Option<String>,
}

impl SettingsRow {
    /// Decodes the JSON exempt-category column, surfacing corruption
    /// instead of silently dropping exemptions.
    fn into_settings(self) -> DbResult<TaxSettings> {
        let tax_exempt_categories: Vec<String> =
            serde_json::from_str(&self.tax_exempt_categories).map_err(|e| {
                DbError::CorruptColumn {
                    entity: "Settings".to_string(),
                    id: SETTINGS_ID.to_string(),
                    column: "tax_exempt_categories".to_string(),
                    message: e.to_string(),
                }
            })?;

        Ok(TaxSettings {
            tax_rate_bps: self.tax_rate_bps as u32,
            tax_enabled: self.tax_enabled,
            tax_exempt_categories,
            currency: self.currency,
            updated_at: self.updated_at,
            updated_by: self.updated_by,
        })
    }
}

impl SettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SettingsRepository { pool }
    }

    /// Fetches the settings snapshot, seeding defaults on first access.
    pub async fn get(&self) -> DbResult<TaxSettings> {
        // INSERT OR IGNORE makes first-access seeding race-safe
        let defaults = TaxSettings::defaults();
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO settings
                (id, tax_rate_bps, tax_enabled, tax_exempt_categories, currency, updated_at, updated_by)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(SETTINGS_ID)
        .bind(defaults.tax_rate_bps as i64)
        .bind(defaults.tax_enabled)
        .bind("[]")
        .bind(&defaults.currency)
        .bind(defaults.updated_at)
        .bind(&defaults.updated_by)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query_as::<_, SettingsRow>(
            "SELECT tax_rate_bps, tax_enabled, tax_exempt_categories, currency, updated_at, updated_by
             FROM settings WHERE id = ?",
        )
        .bind(SETTINGS_ID)
        .fetch_one(&self.pool)
        .await?;

        row.into_settings()
    }

    /// Applies a partial patch and returns the updated snapshot.
    ///
    /// `updated_by` records which admin made the change.
    pub async fn update(&self, patch: SettingsPatch, updated_by: &str) -> DbResult<TaxSettings> {
        let current = self.get().await?;

        let tax_rate_bps = patch.tax_rate_bps.unwrap_or(current.tax_rate_bps);
        let tax_enabled = patch.tax_enabled.unwrap_or(current.tax_enabled);
        let tax_exempt_categories = patch
            .tax_exempt_categories
            .unwrap_or(current.tax_exempt_categories);
        let currency = patch.currency.unwrap_or(current.currency);

        let categories_json =
            serde_json::to_string(&tax_exempt_categories).map_err(|e| DbError::Internal(e.to_string()))?;

        debug!(
            tax_rate_bps,
            tax_enabled,
            exempt = tax_exempt_categories.len(),
            "Updating settings"
        );

        let updated_at = Utc::now();
        sqlx::query(
            r#"
            UPDATE settings
            SET tax_rate_bps = ?, tax_enabled = ?, tax_exempt_categories = ?,
                currency = ?, updated_at = ?, updated_by = ?
            WHERE id = ?
            "#,
        )
        .bind(tax_rate_bps as i64)
        .bind(tax_enabled)
        .bind(&categories_json)
        .bind(&currency)
        .bind(updated_at)
        .bind(updated_by)
        .bind(SETTINGS_ID)
        .execute(&self.pool)
        .await?;

        info!(updated_by, "Settings updated");

        Ok(TaxSettings {
            tax_rate_bps,
            tax_enabled,
            tax_exempt_categories,
            currency,
            updated_at,
            updated_by: Some(updated_by.to_string()),
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
