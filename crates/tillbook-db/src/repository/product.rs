//! # Product Repository
//!
//! Catalogue CRUD plus the public entry point for manual stock adjustments.
//!
//! ## Stock Counter Discipline
//! `current_stock` is owned by the movement recorder: `create` seeds it via
//! an initial-stock movement, `adjust_stock` wraps one movement in one
//! transaction, and `update` deliberately does not touch it. Document
//! transitions (sale completion, purchase receipt) adjust it through their
//! own transactions in the sale/purchase repositories.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::movement::{apply_adjustment, StockAdjustment};
use tillbook_core::{validation, Category, Money, MovementType, Product, StockMovement};

/// Input for creating a product.
#[derive(Debug, Clone, Default)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub sku: String,
    pub barcode: Option<String>,
    pub category_id: Option<String>,
    pub selling_price: Money,
    pub cost_price: Money,
    /// Seeded through an initial-stock movement, not written directly.
    pub initial_stock: i64,
    pub minimum_stock_level: i64,
    pub allow_negative_stock: bool,
    pub image_path: Option<String>,
}

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Creates a product. Non-zero `initial_stock` is recorded as an
    /// adjustment movement in the same transaction, so the ledger starts
    /// consistent.
    pub async fn create(&self, new: NewProduct) -> DbResult<Product> {
        validation::validate_sku(&new.sku)?;
        validation::validate_name("name", &new.name)?;
        validation::validate_price_cents(new.selling_price.cents())?;
        validation::validate_price_cents(new.cost_price.cents())?;

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            description: new.description,
            sku: new.sku,
            barcode: new.barcode,
            category_id: new.category_id,
            selling_price: new.selling_price,
            cost_price: new.cost_price,
            current_stock: 0,
            minimum_stock_level: new.minimum_stock_level,
            allow_negative_stock: new.allow_negative_stock,
            image_path: new.image_path,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO products
             (id, name, description, sku, barcode, category_id, selling_price,
              cost_price, current_stock, minimum_stock_level, allow_negative_stock,
              image_path, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.sku)
        .bind(&product.barcode)
        .bind(&product.category_id)
        .bind(product.selling_price)
        .bind(product.cost_price)
        .bind(product.current_stock)
        .bind(product.minimum_stock_level)
        .bind(product.allow_negative_stock)
        .bind(&product.image_path)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await?;

        let mut created = product;
        if new.initial_stock != 0 {
            let movement = apply_adjustment(
                &mut tx,
                StockAdjustment {
                    product_id: &created.id,
                    quantity_change: new.initial_stock,
                    movement_type: MovementType::Adjustment,
                    reference: None,
                    user_id: None,
                    reason: Some("Initial stock"),
                },
                now,
            )
            .await?;
            created.current_stock = movement.quantity_after;
        }

        tx.commit().await?;

        debug!(id = %created.id, sku = %created.sku, "Product created");
        Ok(created)
    }

    /// Gets a product by its ID. Returns `Ok(None)` when absent.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Gets a product by SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE sku = ?1")
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Gets a product by barcode.
    pub async fn get_by_barcode(&self, barcode: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE barcode = ?1")
            .bind(barcode)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Searches active products across name, SKU, and barcode.
    ///
    /// An empty query lists active products sorted by name.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        let query = query.trim();

        debug!(query = %query, limit = limit, "Searching products");

        if query.is_empty() {
            return self.list_active(limit).await;
        }

        let pattern = format!("%{}%", query);
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products
             WHERE is_active = 1
               AND (name LIKE ?1 OR sku LIKE ?1 OR barcode LIKE ?1)
             ORDER BY name
             LIMIT ?2",
        )
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = products.len(), "Search returned products");
        Ok(products)
    }

    /// Lists active products sorted by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE is_active = 1 ORDER BY name LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Active products at or below their reorder threshold.
    pub async fn list_low_stock(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products
             WHERE is_active = 1 AND current_stock <= minimum_stock_level
             ORDER BY current_stock",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Updates a product's catalogue fields.
    ///
    /// `current_stock` is intentionally absent from the SET list; it moves
    /// only through the movement recorder.
    pub async fn update(&self, product: &Product) -> DbResult<()> {
        validation::validate_sku(&product.sku)?;
        validation::validate_name("name", &product.name)?;
        validation::validate_price_cents(product.selling_price.cents())?;
        validation::validate_price_cents(product.cost_price.cents())?;

        let result = sqlx::query(
            "UPDATE products
             SET name = ?2, description = ?3, sku = ?4, barcode = ?5,
                 category_id = ?6, selling_price = ?7, cost_price = ?8,
                 minimum_stock_level = ?9, allow_negative_stock = ?10,
                 image_path = ?11, is_active = ?12, updated_at = ?13
             WHERE id = ?1",
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.sku)
        .bind(&product.barcode)
        .bind(&product.category_id)
        .bind(product.selling_price)
        .bind(product.cost_price)
        .bind(product.minimum_stock_level)
        .bind(product.allow_negative_stock)
        .bind(&product.image_path)
        .bind(product.is_active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &product.id));
        }

        Ok(())
    }

    /// Soft-deletes a product (clears `is_active`).
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        debug!(id = %id, "Product soft-deleted");
        Ok(())
    }

    /// Manually adjusts stock (recount, damage, loss).
    ///
    /// One transaction: the counter update and the movement row land
    /// together or not at all. Document-driven adjustments do not go
    /// through here; they run inside the document's own transaction.
    pub async fn adjust_stock(
        &self,
        product_id: &str,
        quantity_change: i64,
        movement_type: MovementType,
        user_id: Option<&str>,
        reason: Option<&str>,
    ) -> DbResult<StockMovement> {
        let mut tx = self.pool.begin().await?;

        let movement = apply_adjustment(
            &mut tx,
            StockAdjustment {
                product_id,
                quantity_change,
                movement_type,
                reference: None,
                user_id,
                reason,
            },
            Utc::now(),
        )
        .await?;

        tx.commit().await?;
        Ok(movement)
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// Creates a product category.
    pub async fn create_category(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> DbResult<Category> {
        validation::validate_name("name", name)?;

        let now = Utc::now();
        let category = Category {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: description.map(str::to_string),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO categories (id, name, description, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&category.id)
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.is_active)
        .bind(category.created_at)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(category)
    }

    /// Lists active categories sorted by name.
    pub async fn list_categories(&self) -> DbResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT * FROM categories WHERE is_active = 1 ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }
}
