//! # Settings Repository
//!
//! Store configuration rows and the typed key/value settings table.
//!
//! The active store row is loaded once per unit of work and passed into the
//! operations that need it (numbering, currency formatting); domain code
//! never reaches back in here mid-transaction.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tillbook_core::{
    validation, SettingKind, SettingValue, StoreConfig, SystemSetting,
    DEFAULT_RECEIPT_NUMBER_FORMAT,
};

/// Repository for store configuration and system settings.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SettingsRepository { pool }
    }

    // =========================================================================
    // Store Configuration
    // =========================================================================

    /// The active store row. Errors when none is configured.
    pub async fn active_store(&self) -> DbResult<StoreConfig> {
        let store = sqlx::query_as::<_, StoreConfig>(
            "SELECT * FROM stores WHERE is_active = 1 ORDER BY created_at LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        store.ok_or_else(|| DbError::not_found("Store", "active"))
    }

    /// Creates a store with defaults and marks it active.
    pub async fn create_store(&self, name: &str) -> DbResult<StoreConfig> {
        validation::validate_name("name", name)?;

        let now = Utc::now();
        let store = StoreConfig {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            business_name: None,
            address: None,
            phone: None,
            email: None,
            business_registration_number: None,
            logo_path: None,
            business_hours: None,
            currency: "USD".to_string(),
            currency_symbol: "$".to_string(),
            receipt_settings: None,
            receipt_footer: None,
            receipt_number_format: DEFAULT_RECEIPT_NUMBER_FORMAT.to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.upsert_store(&store).await?;
        Ok(store)
    }

    /// Inserts or fully updates a store row by id.
    pub async fn upsert_store(&self, store: &StoreConfig) -> DbResult<()> {
        validation::validate_name("name", &store.name)?;

        sqlx::query(
            "INSERT INTO stores
             (id, name, business_name, address, phone, email,
              business_registration_number, logo_path, business_hours, currency,
              currency_symbol, receipt_settings, receipt_footer, receipt_number_format,
              is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 business_name = excluded.business_name,
                 address = excluded.address,
                 phone = excluded.phone,
                 email = excluded.email,
                 business_registration_number = excluded.business_registration_number,
                 logo_path = excluded.logo_path,
                 business_hours = excluded.business_hours,
                 currency = excluded.currency,
                 currency_symbol = excluded.currency_symbol,
                 receipt_settings = excluded.receipt_settings,
                 receipt_footer = excluded.receipt_footer,
                 receipt_number_format = excluded.receipt_number_format,
                 is_active = excluded.is_active,
                 updated_at = ?18",
        )
        .bind(&store.id)
        .bind(&store.name)
        .bind(&store.business_name)
        .bind(&store.address)
        .bind(&store.phone)
        .bind(&store.email)
        .bind(&store.business_registration_number)
        .bind(&store.logo_path)
        .bind(&store.business_hours)
        .bind(&store.currency)
        .bind(&store.currency_symbol)
        .bind(&store.receipt_settings)
        .bind(&store.receipt_footer)
        .bind(&store.receipt_number_format)
        .bind(store.is_active)
        .bind(store.created_at)
        .bind(store.updated_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        debug!(id = %store.id, name = %store.name, "Store saved");
        Ok(())
    }

    // =========================================================================
    // System Settings
    // =========================================================================

    /// Fetches one setting row by key.
    pub async fn get(&self, key: &str) -> DbResult<Option<SystemSetting>> {
        let setting =
            sqlx::query_as::<_, SystemSetting>("SELECT * FROM system_settings WHERE key = ?1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(setting)
    }

    /// The stored value coerced to its declared kind. Missing key or NULL
    /// value both yield `None`.
    pub async fn value(&self, key: &str) -> DbResult<Option<SettingValue>> {
        Ok(self.get(key).await?.and_then(|s| s.typed_value()))
    }

    /// Inserts or updates a setting by key.
    pub async fn set(
        &self,
        key: &str,
        value: Option<&str>,
        kind: SettingKind,
        description: Option<&str>,
        is_public: bool,
    ) -> DbResult<SystemSetting> {
        validation::validate_setting_key(key)?;

        let now = Utc::now();
        sqlx::query(
            "INSERT INTO system_settings
             (id, key, value, type, description, is_public, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             ON CONFLICT(key) DO UPDATE SET
                 value = excluded.value,
                 type = excluded.type,
                 description = excluded.description,
                 is_public = excluded.is_public,
                 updated_at = ?7",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(key)
        .bind(value)
        .bind(kind)
        .bind(description)
        .bind(is_public)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get(key)
            .await?
            .ok_or_else(|| DbError::not_found("Setting", key))
    }

    /// All settings flagged public, sorted by key.
    pub async fn public_settings(&self) -> DbResult<Vec<SystemSetting>> {
        let settings = sqlx::query_as::<_, SystemSetting>(
            "SELECT * FROM system_settings WHERE is_public = 1 ORDER BY key",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(settings)
    }

    /// Deletes a setting. Missing keys are not an error.
    pub async fn delete(&self, key: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM system_settings WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
