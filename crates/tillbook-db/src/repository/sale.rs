//! # Sale Repository
//!
//! Sales transactions: draft assembly, totals derivation, and the terminal
//! transitions that drive the stock ledger and customer balances.
//!
//! ## Transition Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │   create ──► DRAFT ──complete()──► COMPLETED ──cancel()──► CANCELLED   │
//! │                │                        │                               │
//! │                │                        ├─ stock −qty per line (sale)  │
//! │                │                        └─ customer accrues remainder  │
//! │                │                                                        │
//! │                └──cancel()──► CANCELLED (no stock ever moved)          │
//! │                                                                         │
//! │   cancel() of a COMPLETED sale appends reversing `return` movements;   │
//! │   the customer balance is NOT reversed (disputes are settled through   │
//! │   payments, not by rewriting the ledger).                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every transition runs in one transaction: status flip, movements, and
//! balance effects land together or not at all.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::customer::CustomerRepository;
use crate::repository::movement::{apply_adjustment, StockAdjustment};
use tillbook_core::document::{self, DocumentTotals};
use tillbook_core::{
    numbering, validation, CoreError, Customer, Money, MovementRef, MovementType, Payment,
    PaymentStatus, PaymentType, SaleStatus, SalesItem, SalesTransaction, StoreConfig,
};

/// Input for creating a draft sale.
#[derive(Debug, Clone, Default)]
pub struct NewSale {
    pub customer_id: Option<String>,
    pub user_id: Option<String>,
    pub discount_amount: Money,
    pub notes: Option<String>,
}

/// Repository for sales transaction operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Creates a draft sale. The receipt number comes from the store's
    /// configured template at creation time; the unique index on
    /// `transaction_number` is the final word on uniqueness.
    pub async fn create(&self, store: &StoreConfig, new: NewSale) -> DbResult<SalesTransaction> {
        validation::validate_price_cents(new.discount_amount.cents())?;

        let now = Utc::now();
        let sale = SalesTransaction {
            id: Uuid::new_v4().to_string(),
            transaction_number: numbering::generate_with_timestamp(
                &store.receipt_number_format,
                now,
            ),
            customer_id: new.customer_id,
            user_id: new.user_id,
            subtotal: Money::zero(),
            discount_amount: new.discount_amount,
            total_amount: Money::zero() - new.discount_amount,
            amount_paid: Money::zero(),
            remaining_balance: Money::zero() - new.discount_amount,
            payment_status: PaymentStatus::Paid,
            status: SaleStatus::Draft,
            notes: new.notes,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO sales_transactions
             (id, transaction_number, customer_id, user_id, subtotal, discount_amount,
              total_amount, amount_paid, remaining_balance, payment_status, status,
              notes, completed_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        )
        .bind(&sale.id)
        .bind(&sale.transaction_number)
        .bind(&sale.customer_id)
        .bind(&sale.user_id)
        .bind(sale.subtotal)
        .bind(sale.discount_amount)
        .bind(sale.total_amount)
        .bind(sale.amount_paid)
        .bind(sale.remaining_balance)
        .bind(sale.payment_status)
        .bind(sale.status)
        .bind(&sale.notes)
        .bind(sale.completed_at)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .execute(&mut *tx)
        .await?;

        // Totals start consistent even for an empty draft.
        Self::recompute_in_tx(&mut tx, &sale.id).await?;
        tx.commit().await?;

        debug!(id = %sale.id, number = %sale.transaction_number, "Draft sale created");
        self.require(&sale.id).await
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<SalesTransaction>> {
        let sale =
            sqlx::query_as::<_, SalesTransaction>("SELECT * FROM sales_transactions WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(sale)
    }

    pub async fn get_by_number(&self, number: &str) -> DbResult<Option<SalesTransaction>> {
        let sale = sqlx::query_as::<_, SalesTransaction>(
            "SELECT * FROM sales_transactions WHERE transaction_number = ?1",
        )
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sale)
    }

    /// Most recent sales first.
    pub async fn list_recent(&self, limit: u32) -> DbResult<Vec<SalesTransaction>> {
        let sales = sqlx::query_as::<_, SalesTransaction>(
            "SELECT * FROM sales_transactions ORDER BY created_at DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Line items in insertion order.
    pub async fn items(&self, sale_id: &str) -> DbResult<Vec<SalesItem>> {
        let items = sqlx::query_as::<_, SalesItem>(
            "SELECT * FROM sales_items WHERE sales_transaction_id = ?1 ORDER BY created_at, id",
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Payments recorded against the sale, oldest first.
    pub async fn payments(&self, sale_id: &str) -> DbResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE sales_transaction_id = ?1 ORDER BY created_at",
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// Adds a line item to a draft sale and re-derives the totals in the
    /// same transaction. `unit_price` defaults to the product's selling
    /// price when not given.
    pub async fn add_item(
        &self,
        sale_id: &str,
        product_id: &str,
        quantity: i64,
        unit_price: Option<Money>,
    ) -> DbResult<SalesItem> {
        validation::validate_quantity(quantity)?;
        if let Some(price) = unit_price {
            validation::validate_price_cents(price.cents())?;
        }

        let mut tx = self.pool.begin().await?;

        let sale = Self::require_in_tx(&mut tx, sale_id).await?;
        if sale.status != SaleStatus::Draft {
            return Err(CoreError::InvalidTransition {
                entity: "Sale",
                id: sale.id,
                status: sale.status.as_str().to_string(),
                operation: "add items",
            }
            .into());
        }

        let selling_price: Option<Money> =
            sqlx::query_scalar("SELECT selling_price FROM products WHERE id = ?1")
                .bind(product_id)
                .fetch_optional(&mut *tx)
                .await?;
        let unit_price =
            unit_price.unwrap_or(selling_price.ok_or_else(|| DbError::not_found("Product", product_id))?);

        let now = Utc::now();
        let item = SalesItem {
            id: Uuid::new_v4().to_string(),
            sales_transaction_id: sale_id.to_string(),
            product_id: product_id.to_string(),
            quantity,
            unit_price,
            total_price: document::line_total(quantity, unit_price),
            created_at: now,
        };

        sqlx::query(
            "INSERT INTO sales_items
             (id, sales_transaction_id, product_id, quantity, unit_price, total_price, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&item.id)
        .bind(&item.sales_transaction_id)
        .bind(&item.product_id)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.total_price)
        .bind(item.created_at)
        .execute(&mut *tx)
        .await?;

        Self::recompute_in_tx(&mut tx, sale_id).await?;
        tx.commit().await?;

        Ok(item)
    }

    /// Removes a line item from a draft sale.
    pub async fn remove_item(&self, sale_id: &str, item_id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let sale = Self::require_in_tx(&mut tx, sale_id).await?;
        if sale.status != SaleStatus::Draft {
            return Err(CoreError::InvalidTransition {
                entity: "Sale",
                id: sale.id,
                status: sale.status.as_str().to_string(),
                operation: "remove items",
            }
            .into());
        }

        let result =
            sqlx::query("DELETE FROM sales_items WHERE id = ?1 AND sales_transaction_id = ?2")
                .bind(item_id)
                .bind(sale_id)
                .execute(&mut *tx)
                .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sales item", item_id));
        }

        Self::recompute_in_tx(&mut tx, sale_id).await?;
        tx.commit().await?;

        Ok(())
    }

    /// Completes a draft sale.
    ///
    /// In one transaction: decrements stock per line (recording `sale`
    /// movements that reference this document), flips the status, and
    /// accrues any unpaid remainder onto the customer's balance. A
    /// negative-stock rejection on any line rolls back everything.
    pub async fn complete(
        &self,
        sale_id: &str,
        user_id: Option<&str>,
    ) -> DbResult<SalesTransaction> {
        let mut tx = self.pool.begin().await?;

        let sale = Self::require_in_tx(&mut tx, sale_id).await?;
        if !sale.status.can_complete() {
            return Err(CoreError::InvalidTransition {
                entity: "Sale",
                id: sale.id,
                status: sale.status.as_str().to_string(),
                operation: "complete",
            }
            .into());
        }

        // Credit gate: an unpaid remainder is a new charge on the customer's
        // account and must fit the credit policy before anything moves.
        if let Some(customer_id) = &sale.customer_id {
            if sale.remaining_balance.is_positive() {
                let customer =
                    sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = ?1")
                        .bind(customer_id)
                        .fetch_optional(&mut *tx)
                        .await?
                        .ok_or_else(|| DbError::not_found("Customer", customer_id))?;
                if !customer.can_purchase(sale.remaining_balance) {
                    return Err(CoreError::CreditNotAllowed {
                        customer: customer.customer_code,
                        requested: sale.remaining_balance.cents(),
                        balance: customer.outstanding_balance.cents(),
                        limit: customer.credit_limit.cents(),
                    }
                    .into());
                }
            }
        }

        let items = sqlx::query_as::<_, SalesItem>(
            "SELECT * FROM sales_items WHERE sales_transaction_id = ?1 ORDER BY created_at, id",
        )
        .bind(sale_id)
        .fetch_all(&mut *tx)
        .await?;

        let now = Utc::now();
        let reference = MovementRef::SalesTransaction(sale.id.clone());
        let reason = format!("Sale {}", sale.transaction_number);

        for item in &items {
            apply_adjustment(
                &mut tx,
                StockAdjustment {
                    product_id: &item.product_id,
                    quantity_change: -item.quantity,
                    movement_type: MovementType::Sale,
                    reference: Some(&reference),
                    user_id,
                    reason: Some(&reason),
                },
                now,
            )
            .await?;
        }

        // Status guard repeated in the WHERE clause: a concurrent completion
        // loses here and rolls back.
        let result = sqlx::query(
            "UPDATE sales_transactions
             SET status = ?2, completed_at = ?3, updated_at = ?3
             WHERE id = ?1 AND status = 'draft'",
        )
        .bind(&sale.id)
        .bind(SaleStatus::Completed)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::InvalidTransition {
                entity: "Sale",
                id: sale.id,
                status: "not draft".to_string(),
                operation: "complete",
            }
            .into());
        }

        if let Some(customer_id) = &sale.customer_id {
            if sale.remaining_balance.is_positive() {
                CustomerRepository::accrue_in_tx(&mut tx, customer_id, sale.remaining_balance)
                    .await?;
            }
        }

        tx.commit().await?;

        info!(
            id = %sale.id,
            number = %sale.transaction_number,
            total = %sale.total_amount,
            "Sale completed"
        );
        self.require(sale_id).await
    }

    /// Cancels a draft or completed sale.
    ///
    /// Cancelling a completed sale appends reversing `return` movements for
    /// each line; a draft cancellation never touched stock, so there is
    /// nothing to reverse. The customer balance stays as accrued.
    pub async fn cancel(&self, sale_id: &str, user_id: Option<&str>) -> DbResult<SalesTransaction> {
        let mut tx = self.pool.begin().await?;

        let sale = Self::require_in_tx(&mut tx, sale_id).await?;
        if !sale.status.can_cancel() {
            return Err(CoreError::InvalidTransition {
                entity: "Sale",
                id: sale.id,
                status: sale.status.as_str().to_string(),
                operation: "cancel",
            }
            .into());
        }
        let was_completed = sale.status == SaleStatus::Completed;

        let now = Utc::now();
        sqlx::query(
            "UPDATE sales_transactions
             SET status = ?2, payment_status = ?3, updated_at = ?4
             WHERE id = ?1",
        )
        .bind(&sale.id)
        .bind(SaleStatus::Cancelled)
        .bind(PaymentStatus::Cancelled)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if was_completed {
            let items = sqlx::query_as::<_, SalesItem>(
                "SELECT * FROM sales_items WHERE sales_transaction_id = ?1 ORDER BY created_at, id",
            )
            .bind(sale_id)
            .fetch_all(&mut *tx)
            .await?;

            let reference = MovementRef::SalesTransaction(sale.id.clone());
            let reason = format!("Cancelled sale {}", sale.transaction_number);
            for item in &items {
                apply_adjustment(
                    &mut tx,
                    StockAdjustment {
                        product_id: &item.product_id,
                        quantity_change: item.quantity,
                        movement_type: MovementType::Return,
                        reference: Some(&reference),
                        user_id,
                        reason: Some(&reason),
                    },
                    now,
                )
                .await?;
            }
        }

        tx.commit().await?;

        info!(id = %sale.id, number = %sale.transaction_number, "Sale cancelled");
        self.require(sale_id).await
    }

    /// Records a payment against the sale and re-derives its totals.
    ///
    /// A `credit_payment` additionally settles the customer's outstanding
    /// balance (floored at zero), all in the same transaction.
    pub async fn add_payment(
        &self,
        sale_id: &str,
        amount: Money,
        payment_type: PaymentType,
        user_id: Option<&str>,
        notes: Option<&str>,
    ) -> DbResult<Payment> {
        if !amount.is_positive() {
            return Err(CoreError::InvalidPaymentAmount {
                cents: amount.cents(),
            }
            .into());
        }

        let mut tx = self.pool.begin().await?;

        let sale = Self::require_in_tx(&mut tx, sale_id).await?;
        if sale.status == SaleStatus::Cancelled {
            return Err(CoreError::InvalidTransition {
                entity: "Sale",
                id: sale.id,
                status: sale.status.as_str().to_string(),
                operation: "accept payment",
            }
            .into());
        }

        let now = Utc::now();
        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            sales_transaction_id: Some(sale.id.clone()),
            purchase_id: None,
            customer_id: sale.customer_id.clone(),
            user_id: user_id.map(str::to_string),
            payment_type,
            amount,
            payment_reference: Some(sale.transaction_number.clone()),
            notes: notes.map(str::to_string),
            payment_date: now,
            created_at: now,
        };

        sqlx::query(
            "INSERT INTO payments
             (id, sales_transaction_id, purchase_id, customer_id, user_id, payment_type,
              amount, payment_reference, notes, payment_date, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(&payment.id)
        .bind(&payment.sales_transaction_id)
        .bind(&payment.purchase_id)
        .bind(&payment.customer_id)
        .bind(&payment.user_id)
        .bind(payment.payment_type)
        .bind(payment.amount)
        .bind(&payment.payment_reference)
        .bind(&payment.notes)
        .bind(payment.payment_date)
        .bind(payment.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE sales_transactions
             SET amount_paid = amount_paid + ?2, updated_at = ?3
             WHERE id = ?1",
        )
        .bind(sale_id)
        .bind(amount)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        Self::recompute_in_tx(&mut tx, sale_id).await?;

        if payment_type == PaymentType::CreditPayment {
            if let Some(customer_id) = &sale.customer_id {
                CustomerRepository::settle_in_tx(&mut tx, customer_id, amount).await?;
            }
        }

        tx.commit().await?;

        debug!(sale_id = %sale_id, amount = %amount, payment_type = ?payment_type, "Payment recorded");
        Ok(payment)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn require(&self, id: &str) -> DbResult<SalesTransaction> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", id))
    }

    async fn require_in_tx(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<SalesTransaction> {
        sqlx::query_as::<_, SalesTransaction>("SELECT * FROM sales_transactions WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", id))
    }

    /// Re-derives subtotal, total, remaining balance, and payment status
    /// from the line items and persists them. Called after every line or
    /// payment mutation, inside that mutation's transaction.
    async fn recompute_in_tx(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<DocumentTotals> {
        let subtotal: Option<i64> = sqlx::query_scalar(
            "SELECT SUM(total_price) FROM sales_items WHERE sales_transaction_id = ?1",
        )
        .bind(sale_id)
        .fetch_one(&mut *conn)
        .await?;

        let row: Option<(Money, Money)> = sqlx::query_as(
            "SELECT discount_amount, amount_paid FROM sales_transactions WHERE id = ?1",
        )
        .bind(sale_id)
        .fetch_optional(&mut *conn)
        .await?;
        let (discount, paid) = row.ok_or_else(|| DbError::not_found("Sale", sale_id))?;

        let totals = document::sale_totals(Money::from_cents(subtotal.unwrap_or(0)), discount, paid);

        sqlx::query(
            "UPDATE sales_transactions
             SET subtotal = ?2, total_amount = ?3, remaining_balance = ?4,
                 payment_status = ?5, updated_at = ?6
             WHERE id = ?1",
        )
        .bind(sale_id)
        .bind(totals.subtotal)
        .bind(totals.total_amount)
        .bind(totals.remaining_balance)
        .bind(totals.payment_status)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::customer::NewCustomer;
    use crate::repository::product::NewProduct;

    fn store() -> StoreConfig {
        let now = Utc::now();
        StoreConfig {
            id: "s1".to_string(),
            name: "Main Street".to_string(),
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
            receipt_number_format: "POS-{YYYY}-{MM}-{DD}-{0000}".to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_product(db: &Database, sku: &str, price_cents: i64, stock: i64) -> String {
        db.products()
            .create(NewProduct {
                name: format!("Product {sku}"),
                sku: sku.to_string(),
                selling_price: Money::from_cents(price_cents),
                cost_price: Money::from_cents(price_cents / 2),
                initial_stock: stock,
                ..Default::default()
            })
            .await
            .unwrap()
            .id
    }

    async fn seed_customer(db: &Database, limit_cents: i64) -> String {
        db.customers()
            .create(NewCustomer {
                name: "Jane Doe".to_string(),
                credit_limit: Money::from_cents(limit_cents),
                ..Default::default()
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_create_uses_store_number_template() {
        let db = test_db().await;
        let sale = db.sales().create(&store(), NewSale::default()).await.unwrap();

        assert!(sale.transaction_number.starts_with("POS-"));
        let suffix = sale.transaction_number.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 6);
        assert_eq!(sale.status, SaleStatus::Draft);
    }

    #[tokio::test]
    async fn test_items_drive_totals() {
        let db = test_db().await;
        let sales = db.sales();
        let p = seed_product(&db, "A-1", 1000, 50).await;

        let sale = sales
            .create(
                &store(),
                NewSale {
                    discount_amount: Money::from_cents(500),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        sales.add_item(&sale.id, &p, 3, None).await.unwrap();
        let item = sales
            .add_item(&sale.id, &p, 1, Some(Money::from_cents(800)))
            .await
            .unwrap();
        assert_eq!(item.total_price.cents(), 800);

        let sale = sales.get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(sale.subtotal.cents(), 3800);
        assert_eq!(sale.total_amount.cents(), 3300);
        assert_eq!(sale.remaining_balance.cents(), 3300);
        assert_eq!(sale.payment_status, PaymentStatus::Pending);

        sales.remove_item(&sale.id, &item.id).await.unwrap();
        let sale = sales.get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(sale.subtotal.cents(), 3000);
        assert_eq!(sale.total_amount.cents(), 2500);
    }

    #[tokio::test]
    async fn test_complete_moves_stock_and_accrues_balance() {
        let db = test_db().await;
        let sales = db.sales();
        let p = seed_product(&db, "A-2", 1000, 10).await;
        let c = seed_customer(&db, 100_000).await;

        let sale = sales
            .create(
                &store(),
                NewSale {
                    customer_id: Some(c.clone()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        sales.add_item(&sale.id, &p, 4, None).await.unwrap();
        sales
            .add_payment(&sale.id, Money::from_cents(1500), PaymentType::Cash, None, None)
            .await
            .unwrap();

        let completed = sales.complete(&sale.id, Some("u1")).await.unwrap();
        assert_eq!(completed.status, SaleStatus::Completed);
        assert!(completed.completed_at.is_some());
        assert_eq!(completed.payment_status, PaymentStatus::Partial);

        // stock moved
        let product = db.products().get_by_id(&p).await.unwrap().unwrap();
        assert_eq!(product.current_stock, 6);
        let moved = db
            .movements()
            .list_for_reference(&MovementRef::SalesTransaction(sale.id.clone()))
            .await
            .unwrap();
        assert_eq!(moved.len(), 1);
        assert_eq!(moved[0].quantity_change, -4);
        assert_eq!(moved[0].movement_type, MovementType::Sale);

        // unpaid remainder accrued; lifetime purchases count the same
        // on-account amount, not the document total
        let customer = db.customers().get_by_id(&c).await.unwrap().unwrap();
        assert_eq!(customer.outstanding_balance.cents(), 2500);
        assert_eq!(customer.total_purchases.cents(), 2500);
        assert_eq!(customer.total_transactions, 1);
    }

    #[tokio::test]
    async fn test_complete_is_one_way() {
        let db = test_db().await;
        let sales = db.sales();
        let p = seed_product(&db, "A-3", 500, 10).await;

        let sale = sales.create(&store(), NewSale::default()).await.unwrap();
        sales.add_item(&sale.id, &p, 1, None).await.unwrap();
        sales.complete(&sale.id, None).await.unwrap();

        let err = sales.complete(&sale.id, None).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InvalidTransition { .. })
        ));
        // stock deducted exactly once
        assert_eq!(
            db.products().get_by_id(&p).await.unwrap().unwrap().current_stock,
            9
        );
    }

    #[tokio::test]
    async fn test_insufficient_stock_rolls_back_whole_completion() {
        let db = test_db().await;
        let sales = db.sales();
        let ok = seed_product(&db, "A-4", 500, 10).await;
        let scarce = seed_product(&db, "A-5", 500, 1).await;

        let sale = sales.create(&store(), NewSale::default()).await.unwrap();
        sales.add_item(&sale.id, &ok, 2, None).await.unwrap();
        sales.add_item(&sale.id, &scarce, 5, None).await.unwrap();

        let err = sales.complete(&sale.id, None).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { .. })
        ));

        // nothing moved, sale still draft
        assert_eq!(
            db.products().get_by_id(&ok).await.unwrap().unwrap().current_stock,
            10
        );
        let sale = sales.get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(sale.status, SaleStatus::Draft);
    }

    #[tokio::test]
    async fn test_cancel_completed_reverses_stock_not_balance() {
        let db = test_db().await;
        let sales = db.sales();
        let p = seed_product(&db, "A-6", 1000, 10).await;
        let c = seed_customer(&db, 100_000).await;

        let sale = sales
            .create(
                &store(),
                NewSale {
                    customer_id: Some(c.clone()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        sales.add_item(&sale.id, &p, 3, None).await.unwrap();
        sales.complete(&sale.id, None).await.unwrap();

        let cancelled = sales.cancel(&sale.id, None).await.unwrap();
        assert_eq!(cancelled.status, SaleStatus::Cancelled);
        assert_eq!(cancelled.payment_status, PaymentStatus::Cancelled);

        // stock restored through reversing movements
        assert_eq!(
            db.products().get_by_id(&p).await.unwrap().unwrap().current_stock,
            10
        );
        let history = db.movements().list_for_product(&p, 10).await.unwrap();
        assert!(history
            .iter()
            .any(|m| m.movement_type == MovementType::Return && m.quantity_change == 3));

        // balance deliberately untouched
        let customer = db.customers().get_by_id(&c).await.unwrap().unwrap();
        assert_eq!(customer.outstanding_balance.cents(), 3000);

        // terminal: cannot cancel twice
        assert!(sales.cancel(&sale.id, None).await.is_err());
    }

    #[tokio::test]
    async fn test_cancel_draft_leaves_no_movements() {
        let db = test_db().await;
        let sales = db.sales();
        let p = seed_product(&db, "A-7", 1000, 10).await;

        let sale = sales.create(&store(), NewSale::default()).await.unwrap();
        sales.add_item(&sale.id, &p, 3, None).await.unwrap();
        sales.cancel(&sale.id, None).await.unwrap();

        let moved = db
            .movements()
            .list_for_reference(&MovementRef::SalesTransaction(sale.id.clone()))
            .await
            .unwrap();
        assert!(moved.is_empty());
        assert_eq!(
            db.products().get_by_id(&p).await.unwrap().unwrap().current_stock,
            10
        );
    }

    #[tokio::test]
    async fn test_payments_walk_status_to_paid() {
        let db = test_db().await;
        let sales = db.sales();
        let p = seed_product(&db, "A-8", 1000, 10).await;

        let sale = sales.create(&store(), NewSale::default()).await.unwrap();
        sales.add_item(&sale.id, &p, 2, None).await.unwrap();

        sales
            .add_payment(&sale.id, Money::from_cents(1200), PaymentType::Cash, None, None)
            .await
            .unwrap();
        let s = sales.get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(s.payment_status, PaymentStatus::Partial);
        assert_eq!(s.remaining_balance.cents(), 800);

        sales
            .add_payment(&sale.id, Money::from_cents(800), PaymentType::Cash, None, None)
            .await
            .unwrap();
        let s = sales.get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(s.payment_status, PaymentStatus::Paid);
        assert_eq!(s.remaining_balance.cents(), 0);

        assert_eq!(sales.payments(&sale.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_credit_payment_settles_customer_floored_at_zero() {
        let db = test_db().await;
        let sales = db.sales();
        let p = seed_product(&db, "A-9", 1000, 10).await;
        let c = seed_customer(&db, 100_000).await;

        let sale = sales
            .create(
                &store(),
                NewSale {
                    customer_id: Some(c.clone()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        sales.add_item(&sale.id, &p, 2, None).await.unwrap();
        sales.complete(&sale.id, None).await.unwrap();

        let before = db.customers().get_by_id(&c).await.unwrap().unwrap();
        assert_eq!(before.outstanding_balance.cents(), 2000);

        // overpay on credit: balance floors at zero, never negative
        sales
            .add_payment(
                &sale.id,
                Money::from_cents(5000),
                PaymentType::CreditPayment,
                None,
                None,
            )
            .await
            .unwrap();

        let after = db.customers().get_by_id(&c).await.unwrap().unwrap();
        assert_eq!(after.outstanding_balance.cents(), 0);
        assert!(after.last_payment_date.is_some());
    }

    #[tokio::test]
    async fn test_invalid_payments_rejected() {
        let db = test_db().await;
        let sales = db.sales();
        let sale = sales.create(&store(), NewSale::default()).await.unwrap();

        let err = sales
            .add_payment(&sale.id, Money::zero(), PaymentType::Cash, None, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InvalidPaymentAmount { cents: 0 })
        ));
        assert!(sales
            .add_payment(&sale.id, Money::from_cents(-100), PaymentType::Cash, None, None)
            .await
            .is_err());

        sales.cancel(&sale.id, None).await.unwrap();
        let err = sales
            .add_payment(&sale.id, Money::from_cents(100), PaymentType::Cash, None, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_complete_rejects_charge_over_credit_limit() {
        let db = test_db().await;
        let sales = db.sales();
        let p = seed_product(&db, "A-11", 1000, 10).await;
        let c = seed_customer(&db, 1000).await;

        let sale = sales
            .create(
                &store(),
                NewSale {
                    customer_id: Some(c.clone()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        sales.add_item(&sale.id, &p, 2, None).await.unwrap();

        let err = sales.complete(&sale.id, None).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::CreditNotAllowed {
                requested: 2000,
                limit: 1000,
                ..
            })
        ));

        // stock untouched, sale still a draft, nothing accrued
        assert_eq!(
            db.products().get_by_id(&p).await.unwrap().unwrap().current_stock,
            10
        );
        let sale = sales.get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(sale.status, SaleStatus::Draft);
        let customer = db.customers().get_by_id(&c).await.unwrap().unwrap();
        assert!(customer.outstanding_balance.is_zero());
    }

    #[tokio::test]
    async fn test_complete_allows_fully_paid_sale_over_limit() {
        let db = test_db().await;
        let sales = db.sales();
        let p = seed_product(&db, "A-12", 1000, 10).await;
        let c = seed_customer(&db, 1000).await;

        let sale = sales
            .create(
                &store(),
                NewSale {
                    customer_id: Some(c.clone()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        sales.add_item(&sale.id, &p, 5, None).await.unwrap();
        sales
            .add_payment(&sale.id, Money::from_cents(5000), PaymentType::Cash, None, None)
            .await
            .unwrap();

        // nothing left on account, so the limit never comes into play
        let completed = sales.complete(&sale.id, None).await.unwrap();
        assert_eq!(completed.status, SaleStatus::Completed);
        assert_eq!(completed.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_items_rejected_after_draft() {
        let db = test_db().await;
        let sales = db.sales();
        let p = seed_product(&db, "A-10", 1000, 10).await;

        let sale = sales.create(&store(), NewSale::default()).await.unwrap();
        sales.add_item(&sale.id, &p, 1, None).await.unwrap();
        sales.complete(&sale.id, None).await.unwrap();

        assert!(sales.add_item(&sale.id, &p, 1, None).await.is_err());
    }
}
