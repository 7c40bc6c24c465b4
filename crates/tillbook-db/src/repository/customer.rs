//! # Customer Repository
//!
//! Customer accounts and their credit balances.
//!
//! ## Balance Discipline
//! `outstanding_balance` mirrors the stock counter discipline: it moves only
//! through `accrue_in_tx` (sale completion with an unpaid remainder) and
//! `settle_in_tx` (credit payment, floored at zero). Both run on a caller's
//! open transaction so a document transition and its balance effect commit
//! together.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tillbook_core::{validation, CreditStatus, Customer, Money, CUSTOMER_CODE_PREFIX};

/// Input for creating a customer.
#[derive(Debug, Clone, Default)]
pub struct NewCustomer {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub credit_limit: Money,
    pub notes: Option<String>,
}

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Creates a customer with a generated `CUST000001`-style code.
    ///
    /// The code is derived from the row count; the unique index backs it up
    /// if two creations race.
    pub async fn create(&self, new: NewCustomer) -> DbResult<Customer> {
        validation::validate_name("name", &new.name)?;

        let mut tx = self.pool.begin().await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(&mut *tx)
            .await?;
        let customer_code = format!("{}{:06}", CUSTOMER_CODE_PREFIX, count + 1);

        let now = Utc::now();
        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            customer_code,
            name: new.name,
            phone: new.phone,
            email: new.email,
            address: new.address,
            outstanding_balance: Money::zero(),
            credit_limit: new.credit_limit,
            credit_status: CreditStatus::Active,
            last_payment_date: None,
            total_purchases: Money::zero(),
            total_transactions: 0,
            notes: new.notes,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO customers
             (id, customer_code, name, phone, email, address, outstanding_balance,
              credit_limit, credit_status, last_payment_date, total_purchases,
              total_transactions, notes, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        )
        .bind(&customer.id)
        .bind(&customer.customer_code)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(&customer.address)
        .bind(customer.outstanding_balance)
        .bind(customer.credit_limit)
        .bind(customer.credit_status)
        .bind(customer.last_payment_date)
        .bind(customer.total_purchases)
        .bind(customer.total_transactions)
        .bind(&customer.notes)
        .bind(customer.is_active)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(id = %customer.id, code = %customer.customer_code, "Customer created");
        Ok(customer)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(customer)
    }

    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Customer>> {
        let customer =
            sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE customer_code = ?1")
                .bind(code)
                .fetch_optional(&self.pool)
                .await?;

        Ok(customer)
    }

    /// Searches active customers across name, phone, and code.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Customer>> {
        let pattern = format!("%{}%", query.trim());
        let customers = sqlx::query_as::<_, Customer>(
            "SELECT * FROM customers
             WHERE is_active = 1
               AND (name LIKE ?1 OR phone LIKE ?1 OR customer_code LIKE ?1)
             ORDER BY name
             LIMIT ?2",
        )
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(customers)
    }

    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>(
            "SELECT * FROM customers WHERE is_active = 1 ORDER BY name LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(customers)
    }

    /// Customers carrying an unpaid balance, largest first.
    pub async fn list_with_balance(&self) -> DbResult<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>(
            "SELECT * FROM customers
             WHERE outstanding_balance > 0
             ORDER BY outstanding_balance DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(customers)
    }

    /// Updates contact and credit-policy fields. Balances and lifetime
    /// totals are not writable here.
    pub async fn update(&self, customer: &Customer) -> DbResult<()> {
        validation::validate_name("name", &customer.name)?;

        let result = sqlx::query(
            "UPDATE customers
             SET name = ?2, phone = ?3, email = ?4, address = ?5, credit_limit = ?6,
                 credit_status = ?7, notes = ?8, is_active = ?9, updated_at = ?10
             WHERE id = ?1",
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(&customer.address)
        .bind(customer.credit_limit)
        .bind(customer.credit_status)
        .bind(&customer.notes)
        .bind(customer.is_active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", &customer.id));
        }

        Ok(())
    }

    /// Adds an unpaid remainder to the customer's balance and bumps the
    /// lifetime totals. The same amount lands in both `outstanding_balance`
    /// and `total_purchases`; lifetime purchases count only what went on
    /// account. Runs on the caller's transaction.
    pub(crate) async fn accrue_in_tx(
        conn: &mut SqliteConnection,
        customer_id: &str,
        amount: Money,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE customers
             SET outstanding_balance = outstanding_balance + ?2,
                 total_purchases = total_purchases + ?2,
                 total_transactions = total_transactions + 1,
                 updated_at = ?3
             WHERE id = ?1",
        )
        .bind(customer_id)
        .bind(amount)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", customer_id));
        }

        Ok(())
    }

    /// Settles part of the customer's balance, floored at zero, and stamps
    /// the last payment date. Runs on the caller's transaction.
    pub(crate) async fn settle_in_tx(
        conn: &mut SqliteConnection,
        customer_id: &str,
        amount: Money,
    ) -> DbResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE customers
             SET outstanding_balance = MAX(0, outstanding_balance - ?2),
                 last_payment_date = ?3,
                 updated_at = ?4
             WHERE id = ?1",
        )
        .bind(customer_id)
        .bind(amount)
        .bind(now.date_naive())
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", customer_id));
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

    fn jane() -> NewCustomer {
        NewCustomer {
            name: "Jane Doe".to_string(),
            phone: Some("555-0100".to_string()),
            credit_limit: Money::from_cents(50_000),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_generates_sequential_codes() {
        let repo = test_db().await.customers();

        let a = repo.create(jane()).await.unwrap();
        let b = repo
            .create(NewCustomer {
                name: "John Roe".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(a.customer_code, "CUST000001");
        assert_eq!(b.customer_code, "CUST000002");
        assert_eq!(
            repo.get_by_code("CUST000002").await.unwrap().unwrap().name,
            "John Roe"
        );
    }

    #[tokio::test]
    async fn test_new_customer_starts_clean() {
        let repo = test_db().await.customers();
        let c = repo.create(jane()).await.unwrap();

        assert!(c.outstanding_balance.is_zero());
        assert_eq!(c.credit_status, CreditStatus::Active);
        assert_eq!(c.total_transactions, 0);
        assert!(c.can_purchase(Money::from_cents(50_000)));
    }

    #[tokio::test]
    async fn test_search() {
        let repo = test_db().await.customers();
        repo.create(jane()).await.unwrap();

        assert_eq!(repo.search("jane", 10).await.unwrap().len(), 1);
        assert_eq!(repo.search("555-01", 10).await.unwrap().len(), 1);
        assert_eq!(repo.search("CUST0000", 10).await.unwrap().len(), 1);
        assert!(repo.search("nobody", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_credit_policy() {
        let repo = test_db().await.customers();
        let mut c = repo.create(jane()).await.unwrap();

        c.credit_status = CreditStatus::Suspended;
        c.credit_limit = Money::from_cents(10_000);
        repo.update(&c).await.unwrap();

        let reloaded = repo.get_by_id(&c.id).await.unwrap().unwrap();
        assert_eq!(reloaded.credit_status, CreditStatus::Suspended);
        assert!(!reloaded.can_purchase(Money::from_cents(1)));
    }
}
