//! # Purchase Repository
//!
//! Purchase orders: the inbound mirror of the sales document.
//!
//! ## Transition Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create ──► DRAFT ──mark_ordered()──► ORDERED                          │
//! │               │                          │                              │
//! │               └────────mark_received()───┴──► RECEIVED                 │
//! │                              │                    │                     │
//! │                              │                    └─cancel()─► CANCELLED│
//! │                              │                                          │
//! │  mark_received, in one transaction:                                     │
//! │    · stock +quantity_received per line (purchase movements)            │
//! │    · product cost_price overwritten with the line's unit_cost          │
//! │    · vendor accrues the unpaid remainder                               │
//! │                                                                         │
//! │  cancel() of a RECEIVED purchase appends reversing `return` movements  │
//! │  (goods going back to the vendor); the vendor balance is NOT reversed. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::movement::{apply_adjustment, StockAdjustment};
use crate::repository::vendor::VendorRepository;
use tillbook_core::document::{self, DocumentTotals};
use tillbook_core::{
    numbering, validation, CoreError, Money, MovementRef, MovementType, Payment, PaymentStatus,
    PaymentType, Purchase, PurchaseItem, PurchaseStatus, DEFAULT_PURCHASE_NUMBER_FORMAT,
};

/// Input for creating a draft purchase order.
#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub vendor_id: String,
    pub user_id: Option<String>,
    pub tax_amount: Money,
    pub order_date: NaiveDate,
    pub expected_delivery_date: Option<NaiveDate>,
    pub invoice_number: Option<String>,
    pub notes: Option<String>,
}

/// Repository for purchase order operations.
#[derive(Debug, Clone)]
pub struct PurchaseRepository {
    pool: SqlitePool,
}

impl PurchaseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PurchaseRepository { pool }
    }

    /// Creates a draft purchase order with a generated PO number.
    pub async fn create(&self, new: NewPurchase) -> DbResult<Purchase> {
        validation::validate_price_cents(new.tax_amount.cents())?;

        let now = Utc::now();
        let purchase = Purchase {
            id: Uuid::new_v4().to_string(),
            purchase_number: numbering::generate_with_timestamp(
                DEFAULT_PURCHASE_NUMBER_FORMAT,
                now,
            ),
            vendor_id: new.vendor_id,
            user_id: new.user_id,
            subtotal: Money::zero(),
            tax_amount: new.tax_amount,
            total_amount: new.tax_amount,
            amount_paid: Money::zero(),
            remaining_balance: new.tax_amount,
            payment_status: PaymentStatus::Pending,
            status: PurchaseStatus::Draft,
            order_date: new.order_date,
            expected_delivery_date: new.expected_delivery_date,
            received_date: None,
            invoice_number: new.invoice_number,
            notes: new.notes,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO purchases
             (id, purchase_number, vendor_id, user_id, subtotal, tax_amount, total_amount,
              amount_paid, remaining_balance, payment_status, status, order_date,
              expected_delivery_date, received_date, invoice_number, notes,
              created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        )
        .bind(&purchase.id)
        .bind(&purchase.purchase_number)
        .bind(&purchase.vendor_id)
        .bind(&purchase.user_id)
        .bind(purchase.subtotal)
        .bind(purchase.tax_amount)
        .bind(purchase.total_amount)
        .bind(purchase.amount_paid)
        .bind(purchase.remaining_balance)
        .bind(purchase.payment_status)
        .bind(purchase.status)
        .bind(purchase.order_date)
        .bind(purchase.expected_delivery_date)
        .bind(purchase.received_date)
        .bind(&purchase.invoice_number)
        .bind(&purchase.notes)
        .bind(purchase.created_at)
        .bind(purchase.updated_at)
        .execute(&mut *tx)
        .await?;

        Self::recompute_in_tx(&mut tx, &purchase.id).await?;
        tx.commit().await?;

        debug!(id = %purchase.id, number = %purchase.purchase_number, "Draft purchase created");
        self.require(&purchase.id).await
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Purchase>> {
        let purchase = sqlx::query_as::<_, Purchase>("SELECT * FROM purchases WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(purchase)
    }

    pub async fn get_by_number(&self, number: &str) -> DbResult<Option<Purchase>> {
        let purchase =
            sqlx::query_as::<_, Purchase>("SELECT * FROM purchases WHERE purchase_number = ?1")
                .bind(number)
                .fetch_optional(&self.pool)
                .await?;

        Ok(purchase)
    }

    pub async fn list_recent(&self, limit: u32) -> DbResult<Vec<Purchase>> {
        let purchases = sqlx::query_as::<_, Purchase>(
            "SELECT * FROM purchases ORDER BY created_at DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(purchases)
    }

    /// Line items in insertion order.
    pub async fn items(&self, purchase_id: &str) -> DbResult<Vec<PurchaseItem>> {
        let items = sqlx::query_as::<_, PurchaseItem>(
            "SELECT * FROM purchase_items WHERE purchase_id = ?1 ORDER BY created_at, id",
        )
        .bind(purchase_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Payments recorded against the purchase, oldest first.
    pub async fn payments(&self, purchase_id: &str) -> DbResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE purchase_id = ?1 ORDER BY created_at",
        )
        .bind(purchase_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// Adds a line to a draft purchase. `total_cost` is always
    /// `quantity_ordered × unit_cost`; the received quantity starts at zero.
    pub async fn add_item(
        &self,
        purchase_id: &str,
        product_id: &str,
        quantity_ordered: i64,
        unit_cost: Money,
    ) -> DbResult<PurchaseItem> {
        validation::validate_quantity(quantity_ordered)?;
        validation::validate_price_cents(unit_cost.cents())?;

        let mut tx = self.pool.begin().await?;

        let purchase = Self::require_in_tx(&mut tx, purchase_id).await?;
        if purchase.status != PurchaseStatus::Draft {
            return Err(CoreError::InvalidTransition {
                entity: "Purchase",
                id: purchase.id,
                status: purchase.status.as_str().to_string(),
                operation: "add items",
            }
            .into());
        }

        let exists: Option<String> = sqlx::query_scalar("SELECT id FROM products WHERE id = ?1")
            .bind(product_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(DbError::not_found("Product", product_id));
        }

        let now = Utc::now();
        let item = PurchaseItem {
            id: Uuid::new_v4().to_string(),
            purchase_id: purchase_id.to_string(),
            product_id: product_id.to_string(),
            quantity_ordered,
            quantity_received: 0,
            unit_cost,
            total_cost: document::line_total(quantity_ordered, unit_cost),
            created_at: now,
        };

        sqlx::query(
            "INSERT INTO purchase_items
             (id, purchase_id, product_id, quantity_ordered, quantity_received,
              unit_cost, total_cost, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&item.id)
        .bind(&item.purchase_id)
        .bind(&item.product_id)
        .bind(item.quantity_ordered)
        .bind(item.quantity_received)
        .bind(item.unit_cost)
        .bind(item.total_cost)
        .bind(item.created_at)
        .execute(&mut *tx)
        .await?;

        Self::recompute_in_tx(&mut tx, purchase_id).await?;
        tx.commit().await?;

        Ok(item)
    }

    /// Marks a draft as ordered (sent to the vendor).
    pub async fn mark_ordered(&self, purchase_id: &str) -> DbResult<Purchase> {
        let result = sqlx::query(
            "UPDATE purchases SET status = ?2, updated_at = ?3 WHERE id = ?1 AND status = 'draft'",
        )
        .bind(purchase_id)
        .bind(PurchaseStatus::Ordered)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let purchase = self.require(purchase_id).await?;
            return Err(CoreError::InvalidTransition {
                entity: "Purchase",
                id: purchase.id,
                status: purchase.status.as_str().to_string(),
                operation: "mark ordered",
            }
            .into());
        }

        self.require(purchase_id).await
    }

    /// Sets the received quantity on a line ahead of `mark_received`.
    /// Allowed while the purchase can still be received.
    pub async fn update_received_quantity(
        &self,
        purchase_id: &str,
        item_id: &str,
        quantity_received: i64,
    ) -> DbResult<()> {
        if quantity_received < 0 {
            return Err(tillbook_core::ValidationError::MustBePositive {
                field: "quantity_received".to_string(),
            }
            .into());
        }

        let mut tx = self.pool.begin().await?;

        let purchase = Self::require_in_tx(&mut tx, purchase_id).await?;
        if !purchase.status.can_receive() {
            return Err(CoreError::InvalidTransition {
                entity: "Purchase",
                id: purchase.id,
                status: purchase.status.as_str().to_string(),
                operation: "update received quantities",
            }
            .into());
        }

        let result =
            sqlx::query("UPDATE purchase_items SET quantity_received = ?3 WHERE id = ?1 AND purchase_id = ?2")
                .bind(item_id)
                .bind(purchase_id)
                .bind(quantity_received)
                .execute(&mut *tx)
                .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Purchase item", item_id));
        }

        tx.commit().await?;
        Ok(())
    }

    /// Receives the purchase.
    ///
    /// In one transaction, for every line with `quantity_received > 0`:
    /// stock goes up by the received quantity (recording a `purchase`
    /// movement that references this document) and the product's cost price
    /// is overwritten with the line's unit cost. The status flips to
    /// received and the vendor accrues any unpaid remainder.
    ///
    /// Lines with nothing received are skipped entirely.
    pub async fn mark_received(
        &self,
        purchase_id: &str,
        user_id: Option<&str>,
    ) -> DbResult<Purchase> {
        let mut tx = self.pool.begin().await?;

        let purchase = Self::require_in_tx(&mut tx, purchase_id).await?;
        if !purchase.status.can_receive() {
            return Err(CoreError::InvalidTransition {
                entity: "Purchase",
                id: purchase.id,
                status: purchase.status.as_str().to_string(),
                operation: "receive",
            }
            .into());
        }

        let items = sqlx::query_as::<_, PurchaseItem>(
            "SELECT * FROM purchase_items WHERE purchase_id = ?1 ORDER BY created_at, id",
        )
        .bind(purchase_id)
        .fetch_all(&mut *tx)
        .await?;

        let now = Utc::now();
        let reference = MovementRef::Purchase(purchase.id.clone());
        let reason = format!("Purchase {}", purchase.purchase_number);

        for item in items.iter().filter(|i| i.quantity_received > 0) {
            apply_adjustment(
                &mut tx,
                StockAdjustment {
                    product_id: &item.product_id,
                    quantity_change: item.quantity_received,
                    movement_type: MovementType::Purchase,
                    reference: Some(&reference),
                    user_id,
                    reason: Some(&reason),
                },
                now,
            )
            .await?;

            // Latest landed cost wins.
            sqlx::query("UPDATE products SET cost_price = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(&item.product_id)
                .bind(item.unit_cost)
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }

        let result = sqlx::query(
            "UPDATE purchases
             SET status = ?2, received_date = ?3, updated_at = ?4
             WHERE id = ?1 AND status IN ('draft', 'ordered')",
        )
        .bind(&purchase.id)
        .bind(PurchaseStatus::Received)
        .bind(now.date_naive())
        .bind(now)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::InvalidTransition {
                entity: "Purchase",
                id: purchase.id,
                status: "not receivable".to_string(),
                operation: "receive",
            }
            .into());
        }

        if purchase.remaining_balance.is_positive() {
            VendorRepository::accrue_in_tx(&mut tx, &purchase.vendor_id, purchase.remaining_balance)
                .await?;
        }

        tx.commit().await?;

        info!(
            id = %purchase.id,
            number = %purchase.purchase_number,
            "Purchase received"
        );
        self.require(purchase_id).await
    }

    /// Cancels a purchase in any non-cancelled state.
    ///
    /// Cancelling a received purchase reverses the received stock with
    /// `return` movements (goods going back to the vendor); the vendor
    /// balance stays as accrued. The reversal honors the negative-stock
    /// policy: stock already sold on cannot be returned.
    pub async fn cancel(&self, purchase_id: &str, user_id: Option<&str>) -> DbResult<Purchase> {
        let mut tx = self.pool.begin().await?;

        let purchase = Self::require_in_tx(&mut tx, purchase_id).await?;
        if !purchase.status.can_cancel() {
            return Err(CoreError::InvalidTransition {
                entity: "Purchase",
                id: purchase.id,
                status: purchase.status.as_str().to_string(),
                operation: "cancel",
            }
            .into());
        }
        let was_received = purchase.status == PurchaseStatus::Received;

        let now = Utc::now();
        sqlx::query(
            "UPDATE purchases SET status = ?2, payment_status = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(&purchase.id)
        .bind(PurchaseStatus::Cancelled)
        .bind(PaymentStatus::Cancelled)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if was_received {
            let items = sqlx::query_as::<_, PurchaseItem>(
                "SELECT * FROM purchase_items WHERE purchase_id = ?1 ORDER BY created_at, id",
            )
            .bind(purchase_id)
            .fetch_all(&mut *tx)
            .await?;

            let reference = MovementRef::Purchase(purchase.id.clone());
            let reason = format!("Cancelled purchase {}", purchase.purchase_number);
            for item in items.iter().filter(|i| i.quantity_received > 0) {
                apply_adjustment(
                    &mut tx,
                    StockAdjustment {
                        product_id: &item.product_id,
                        quantity_change: -item.quantity_received,
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

        info!(id = %purchase.id, number = %purchase.purchase_number, "Purchase cancelled");
        self.require(purchase_id).await
    }

    /// Records a payment against the purchase and re-derives its totals.
    /// A `credit_payment` additionally settles the vendor's outstanding
    /// balance, floored at zero.
    pub async fn add_payment(
        &self,
        purchase_id: &str,
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

        let purchase = Self::require_in_tx(&mut tx, purchase_id).await?;
        if purchase.status == PurchaseStatus::Cancelled {
            return Err(CoreError::InvalidTransition {
                entity: "Purchase",
                id: purchase.id,
                status: purchase.status.as_str().to_string(),
                operation: "accept payment",
            }
            .into());
        }

        let now = Utc::now();
        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            sales_transaction_id: None,
            purchase_id: Some(purchase.id.clone()),
            customer_id: None,
            user_id: user_id.map(str::to_string),
            payment_type,
            amount,
            payment_reference: Some(purchase.purchase_number.clone()),
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
            "UPDATE purchases SET amount_paid = amount_paid + ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(purchase_id)
        .bind(amount)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        Self::recompute_in_tx(&mut tx, purchase_id).await?;

        if payment_type == PaymentType::CreditPayment {
            VendorRepository::settle_in_tx(&mut tx, &purchase.vendor_id, amount).await?;
        }

        tx.commit().await?;

        debug!(purchase_id = %purchase_id, amount = %amount, "Purchase payment recorded");
        Ok(payment)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn require(&self, id: &str) -> DbResult<Purchase> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Purchase", id))
    }

    async fn require_in_tx(conn: &mut SqliteConnection, id: &str) -> DbResult<Purchase> {
        sqlx::query_as::<_, Purchase>("SELECT * FROM purchases WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| DbError::not_found("Purchase", id))
    }

    /// Re-derives subtotal, total (subtotal + tax), remaining balance, and
    /// payment status from the line items and persists them.
    async fn recompute_in_tx(
        conn: &mut SqliteConnection,
        purchase_id: &str,
    ) -> DbResult<DocumentTotals> {
        let subtotal: Option<i64> = sqlx::query_scalar(
            "SELECT SUM(total_cost) FROM purchase_items WHERE purchase_id = ?1",
        )
        .bind(purchase_id)
        .fetch_one(&mut *conn)
        .await?;

        let row: Option<(Money, Money)> =
            sqlx::query_as("SELECT tax_amount, amount_paid FROM purchases WHERE id = ?1")
                .bind(purchase_id)
                .fetch_optional(&mut *conn)
                .await?;
        let (tax, paid) = row.ok_or_else(|| DbError::not_found("Purchase", purchase_id))?;

        let totals =
            document::purchase_totals(Money::from_cents(subtotal.unwrap_or(0)), tax, paid);

        sqlx::query(
            "UPDATE purchases
             SET subtotal = ?2, total_amount = ?3, remaining_balance = ?4,
                 payment_status = ?5, updated_at = ?6
             WHERE id = ?1",
        )
        .bind(purchase_id)
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
