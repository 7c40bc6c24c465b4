//! # Vendor Repository
//!
//! Supplier accounts. Mirrors the customer repository: the outstanding
//! balance accrues when a purchase is received with an unpaid remainder and
//! settles through credit payments, floored at zero.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tillbook_core::{validation, Money, Vendor};

/// Input for creating a vendor.
#[derive(Debug, Clone, Default)]
pub struct NewVendor {
    pub name: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub tax_id: Option<String>,
    pub credit_limit: Money,
    pub payment_terms: Option<String>,
    pub notes: Option<String>,
}

/// Repository for vendor database operations.
#[derive(Debug, Clone)]
pub struct VendorRepository {
    pool: SqlitePool,
}

impl VendorRepository {
    pub fn new(pool: SqlitePool) -> Self {
        VendorRepository { pool }
    }

    pub async fn create(&self, new: NewVendor) -> DbResult<Vendor> {
        validation::validate_name("name", &new.name)?;

        let now = Utc::now();
        let vendor = Vendor {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            contact_person: new.contact_person,
            phone: new.phone,
            email: new.email,
            address: new.address,
            tax_id: new.tax_id,
            outstanding_balance: Money::zero(),
            credit_limit: new.credit_limit,
            payment_terms: new.payment_terms,
            total_purchases: Money::zero(),
            total_orders: 0,
            notes: new.notes,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO vendors
             (id, name, contact_person, phone, email, address, tax_id,
              outstanding_balance, credit_limit, payment_terms, total_purchases,
              total_orders, notes, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        )
        .bind(&vendor.id)
        .bind(&vendor.name)
        .bind(&vendor.contact_person)
        .bind(&vendor.phone)
        .bind(&vendor.email)
        .bind(&vendor.address)
        .bind(&vendor.tax_id)
        .bind(vendor.outstanding_balance)
        .bind(vendor.credit_limit)
        .bind(&vendor.payment_terms)
        .bind(vendor.total_purchases)
        .bind(vendor.total_orders)
        .bind(&vendor.notes)
        .bind(vendor.is_active)
        .bind(vendor.created_at)
        .bind(vendor.updated_at)
        .execute(&self.pool)
        .await?;

        debug!(id = %vendor.id, name = %vendor.name, "Vendor created");
        Ok(vendor)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Vendor>> {
        let vendor = sqlx::query_as::<_, Vendor>("SELECT * FROM vendors WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(vendor)
    }

    /// Searches active vendors across name, contact person, and phone.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Vendor>> {
        let pattern = format!("%{}%", query.trim());
        let vendors = sqlx::query_as::<_, Vendor>(
            "SELECT * FROM vendors
             WHERE is_active = 1
               AND (name LIKE ?1 OR contact_person LIKE ?1 OR phone LIKE ?1)
             ORDER BY name
             LIMIT ?2",
        )
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(vendors)
    }

    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Vendor>> {
        let vendors = sqlx::query_as::<_, Vendor>(
            "SELECT * FROM vendors WHERE is_active = 1 ORDER BY name LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(vendors)
    }

    /// Vendors we owe money to, largest balance first.
    pub async fn list_with_balance(&self) -> DbResult<Vec<Vendor>> {
        let vendors = sqlx::query_as::<_, Vendor>(
            "SELECT * FROM vendors
             WHERE outstanding_balance > 0
             ORDER BY outstanding_balance DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(vendors)
    }

    /// Updates contact and terms fields; balances and lifetime totals are
    /// not writable here.
    pub async fn update(&self, vendor: &Vendor) -> DbResult<()> {
        validation::validate_name("name", &vendor.name)?;

        let result = sqlx::query(
            "UPDATE vendors
             SET name = ?2, contact_person = ?3, phone = ?4, email = ?5, address = ?6,
                 tax_id = ?7, credit_limit = ?8, payment_terms = ?9, notes = ?10,
                 is_active = ?11, updated_at = ?12
             WHERE id = ?1",
        )
        .bind(&vendor.id)
        .bind(&vendor.name)
        .bind(&vendor.contact_person)
        .bind(&vendor.phone)
        .bind(&vendor.email)
        .bind(&vendor.address)
        .bind(&vendor.tax_id)
        .bind(vendor.credit_limit)
        .bind(&vendor.payment_terms)
        .bind(&vendor.notes)
        .bind(vendor.is_active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Vendor", &vendor.id));
        }

        Ok(())
    }

    /// Adds an unpaid remainder to the vendor's balance and bumps the
    /// lifetime totals. The same amount lands in both `outstanding_balance`
    /// and `total_purchases`; lifetime purchases count only what went on
    /// account. Runs on the caller's transaction.
    pub(crate) async fn accrue_in_tx(
        conn: &mut SqliteConnection,
        vendor_id: &str,
        amount: Money,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE vendors
             SET outstanding_balance = outstanding_balance + ?2,
                 total_purchases = total_purchases + ?2,
                 total_orders = total_orders + 1,
                 updated_at = ?3
             WHERE id = ?1",
        )
        .bind(vendor_id)
        .bind(amount)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Vendor", vendor_id));
        }

        Ok(())
    }

    /// Settles part of the vendor's balance, floored at zero.
    pub(crate) async fn settle_in_tx(
        conn: &mut SqliteConnection,
        vendor_id: &str,
        amount: Money,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE vendors
             SET outstanding_balance = MAX(0, outstanding_balance - ?2),
                 updated_at = ?3
             WHERE id = ?1",
        )
        .bind(vendor_id)
        .bind(amount)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Vendor", vendor_id));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn acme() -> NewVendor {
        NewVendor {
            name: "Acme Supply Co".to_string(),
            contact_person: Some("Sam Smith".to_string()),
            payment_terms: Some("Net 30".to_string()),
            credit_limit: Money::from_cents(200_000),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_and_fetch() {
        let repo = test_db().await.vendors();
        let v = repo.create(acme()).await.unwrap();

        let reloaded = repo.get_by_id(&v.id).await.unwrap().unwrap();
        assert_eq!(reloaded.name, "Acme Supply Co");
        assert!(reloaded.outstanding_balance.is_zero());
        assert_eq!(reloaded.total_orders, 0);
    }

    #[tokio::test]
    async fn test_search_by_contact() {
        let repo = test_db().await.vendors();
        repo.create(acme()).await.unwrap();

        assert_eq!(repo.search("sam", 10).await.unwrap().len(), 1);
        assert!(repo.search("nobody", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_terms() {
        let repo = test_db().await.vendors();
        let mut v = repo.create(acme()).await.unwrap();

        v.payment_terms = Some("Net 60".to_string());
        repo.update(&v).await.unwrap();

        let reloaded = repo.get_by_id(&v.id).await.unwrap().unwrap();
        assert_eq!(reloaded.payment_terms.as_deref(), Some("Net 60"));
    }
}
