//! # Stock Movement Repository
//!
//! The write path and read path of the stock ledger.
//!
//! ## Bookkeeping Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  products.current_stock is a running counter. It is NEVER written       │
//! │  directly; every change goes through apply_adjustment(), which in one   │
//! │  transaction:                                                           │
//! │                                                                         │
//! │    1. checks the negative-stock policy                                  │
//! │    2. applies a delta UPDATE to the counter                             │
//! │    3. appends one stock_movements row with before/after snapshots       │
//! │                                                                         │
//! │  Consequence: SUM(quantity_change) over a product's movements always    │
//! │  equals its current_stock.                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Movements are immutable: there is no update or delete path here.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tillbook_core::{CoreError, MovementRef, MovementType, StockMovement};

/// One requested change to a product's stock counter.
#[derive(Debug, Clone)]
pub struct StockAdjustment<'a> {
    pub product_id: &'a str,
    /// Signed: positive for additions, negative for reductions.
    pub quantity_change: i64,
    pub movement_type: MovementType,
    /// Document that caused the movement, when there is one.
    pub reference: Option<&'a MovementRef>,
    pub user_id: Option<&'a str>,
    pub reason: Option<&'a str>,
}

/// Applies a stock adjustment on an open transaction.
///
/// Callers own the transaction: a policy rejection here rolls back every
/// write the caller has made so far, which is exactly what a document
/// transition needs (all lines move or none do).
pub(crate) async fn apply_adjustment(
    conn: &mut SqliteConnection,
    adj: StockAdjustment<'_>,
    now: DateTime<Utc>,
) -> DbResult<StockMovement> {
    let row: Option<(String, i64, bool)> = sqlx::query_as(
        "SELECT sku, current_stock, allow_negative_stock FROM products WHERE id = ?1",
    )
    .bind(adj.product_id)
    .fetch_optional(&mut *conn)
    .await?;

    let (sku, before, allow_negative) =
        row.ok_or_else(|| DbError::not_found("Product", adj.product_id))?;

    if adj.quantity_change < 0 && !allow_negative && before + adj.quantity_change < 0 {
        return Err(CoreError::InsufficientStock {
            sku,
            available: before,
            requested: -adj.quantity_change,
        }
        .into());
    }

    // Delta update: the returned value is authoritative even if another
    // write landed between our SELECT and this statement.
    let after: i64 = sqlx::query_scalar(
        "UPDATE products
         SET current_stock = current_stock + ?2, updated_at = ?3
         WHERE id = ?1
         RETURNING current_stock",
    )
    .bind(adj.product_id)
    .bind(adj.quantity_change)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    let movement = StockMovement {
        id: Uuid::new_v4().to_string(),
        product_id: adj.product_id.to_string(),
        movement_type: adj.movement_type,
        quantity_change: adj.quantity_change,
        quantity_before: after - adj.quantity_change,
        quantity_after: after,
        reference_type: adj.reference.map(|r| r.type_name().to_string()),
        reference_id: adj.reference.map(|r| r.id().to_string()),
        user_id: adj.user_id.map(str::to_string),
        reason: adj.reason.map(str::to_string),
        created_at: now,
    };

    sqlx::query(
        "INSERT INTO stock_movements
         (id, product_id, movement_type, quantity_change, quantity_before,
          quantity_after, reference_type, reference_id, user_id, reason, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )
    .bind(&movement.id)
    .bind(&movement.product_id)
    .bind(movement.movement_type)
    .bind(movement.quantity_change)
    .bind(movement.quantity_before)
    .bind(movement.quantity_after)
    .bind(&movement.reference_type)
    .bind(&movement.reference_id)
    .bind(&movement.user_id)
    .bind(&movement.reason)
    .bind(movement.created_at)
    .execute(&mut *conn)
    .await?;

    debug!(
        product_id = %movement.product_id,
        change = movement.quantity_change,
        after = movement.quantity_after,
        movement_type = ?movement.movement_type,
        "Stock adjusted"
    );

    Ok(movement)
}

/// Read access to the movement ledger.
#[derive(Debug, Clone)]
pub struct MovementRepository {
    pool: SqlitePool,
}

impl MovementRepository {
    pub fn new(pool: SqlitePool) -> Self {
        MovementRepository { pool }
    }

    /// Lists a product's movements, newest first.
    pub async fn list_for_product(
        &self,
        product_id: &str,
        limit: u32,
    ) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            "SELECT * FROM stock_movements
             WHERE product_id = ?1
             ORDER BY created_at DESC
             LIMIT ?2",
        )
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Lists the movements recorded for a document.
    pub async fn list_for_reference(&self, reference: &MovementRef) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            "SELECT * FROM stock_movements
             WHERE reference_type = ?1 AND reference_id = ?2
             ORDER BY created_at",
        )
        .bind(reference.type_name())
        .bind(reference.id())
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Most recent movements across all products.
    pub async fn recent(&self, limit: u32) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            "SELECT * FROM stock_movements ORDER BY created_at DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Sum of all quantity changes for a product.
    ///
    /// Reconciliation: this must equal `products.current_stock`. A mismatch
    /// means a write bypassed the movement recorder.
    pub async fn sum_quantity_changes(&self, product_id: &str) -> DbResult<i64> {
        let sum: Option<i64> = sqlx::query_scalar(
            "SELECT SUM(quantity_change) FROM stock_movements WHERE product_id = ?1",
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(sum.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::product::NewProduct;
    use tillbook_core::Money;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn widget(sku: &str, stock: i64) -> NewProduct {
        NewProduct {
            name: format!("Widget {sku}"),
            sku: sku.to_string(),
            selling_price: Money::from_cents(500),
            cost_price: Money::from_cents(300),
            initial_stock: stock,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_counter_always_matches_movement_sum() {
        let db = test_db().await;
        let products = db.products();
        let movements = db.movements();

        let p = products.create(widget("W-1", 10)).await.unwrap();

        products
            .adjust_stock(&p.id, 5, MovementType::Adjustment, None, Some("recount"))
            .await
            .unwrap();
        products
            .adjust_stock(&p.id, -3, MovementType::Damage, None, Some("dropped"))
            .await
            .unwrap();

        let current = products.get_by_id(&p.id).await.unwrap().unwrap().current_stock;
        assert_eq!(current, 12);
        assert_eq!(movements.sum_quantity_changes(&p.id).await.unwrap(), current);
    }

    #[tokio::test]
    async fn test_movement_snapshots_chain() {
        let db = test_db().await;
        let products = db.products();

        let p = products.create(widget("W-2", 0)).await.unwrap();
        products
            .adjust_stock(&p.id, 7, MovementType::Adjustment, None, None)
            .await
            .unwrap();
        products
            .adjust_stock(&p.id, -2, MovementType::Loss, None, None)
            .await
            .unwrap();

        let mut history = db.movements().list_for_product(&p.id, 50).await.unwrap();
        history.reverse(); // oldest first
        let mut expected_before = 0;
        for m in &history {
            assert_eq!(m.quantity_before, expected_before);
            assert_eq!(m.quantity_after, m.quantity_before + m.quantity_change);
            expected_before = m.quantity_after;
        }
        assert_eq!(expected_before, 5);
    }

    #[tokio::test]
    async fn test_rejected_adjustment_leaves_no_trace() {
        let db = test_db().await;
        let products = db.products();

        let p = products.create(widget("W-3", 2)).await.unwrap();
        let err = products
            .adjust_stock(&p.id, -5, MovementType::Sale, None, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { .. })
        ));

        assert_eq!(
            products.get_by_id(&p.id).await.unwrap().unwrap().current_stock,
            2
        );
        // only the initial-stock movement exists
        let history = db.movements().list_for_product(&p.id, 50).await.unwrap();
        assert_eq!(history.len(), 1);
    }
}
