//! # Domain Types
//!
//! Core domain types for the Tillbook ledger engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  Ledger entities    Product · Customer · Vendor                     │
//! │                     (running counters, mutated only through the     │
//! │                      movement recorder / balance methods)           │
//! │                                                                     │
//! │  Movement recorder  StockMovement · Payment                         │
//! │                     (append-only, immutable once written)           │
//! │                                                                     │
//! │  Document           SalesTransaction + SalesItem                    │
//! │  aggregates         Purchase + PurchaseItem                         │
//! │                     (derived totals, one-way terminal transitions)  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (sku, transaction_number, customer_code, ...) -
//!   human-readable, potentially mutable

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::money::Money;

// =============================================================================
// Status Enums
// =============================================================================

/// Lifecycle status of a sales transaction.
///
/// `Completed` and `Cancelled` are terminal. `Returned` exists in the
/// taxonomy but no transition produces it; returns are represented as
/// `completed → cancelled` with reversing stock movements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Draft,
    Completed,
    Cancelled,
    Returned,
}

impl SaleStatus {
    /// Only a draft sale may be completed.
    pub fn can_complete(self) -> bool {
        self == SaleStatus::Draft
    }

    /// A draft may be cancelled; a completed sale may be cancelled as a
    /// return. Cancelling twice is rejected.
    pub fn can_cancel(self) -> bool {
        matches!(self, SaleStatus::Draft | SaleStatus::Completed)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SaleStatus::Completed | SaleStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SaleStatus::Draft => "draft",
            SaleStatus::Completed => "completed",
            SaleStatus::Cancelled => "cancelled",
            SaleStatus::Returned => "returned",
        }
    }
}

impl Default for SaleStatus {
    fn default() -> Self {
        SaleStatus::Draft
    }
}

/// Lifecycle status of a purchase order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    Draft,
    Ordered,
    Received,
    Cancelled,
}

impl PurchaseStatus {
    /// Draft or ordered purchases may be received.
    pub fn can_receive(self) -> bool {
        matches!(self, PurchaseStatus::Draft | PurchaseStatus::Ordered)
    }

    /// Anything not already cancelled may be cancelled; cancelling a
    /// received purchase reverses its stock effect.
    pub fn can_cancel(self) -> bool {
        self != PurchaseStatus::Cancelled
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PurchaseStatus::Received | PurchaseStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PurchaseStatus::Draft => "draft",
            PurchaseStatus::Ordered => "ordered",
            PurchaseStatus::Received => "received",
            PurchaseStatus::Cancelled => "cancelled",
        }
    }
}

impl Default for PurchaseStatus {
    fn default() -> Self {
        PurchaseStatus::Draft
    }
}

/// Payment status, derived from `remaining_balance` and `amount_paid`.
/// Never set directly; see [`crate::document::derive_payment_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Partial,
    Paid,
    Cancelled,
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

/// How a payment was made.
///
/// `CreditPayment` settles a customer's or vendor's outstanding balance in
/// addition to reducing the document's remaining balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    Cash,
    CreditPayment,
}

/// Credit standing of a customer account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum CreditStatus {
    Active,
    Inactive,
    Suspended,
}

impl Default for CreditStatus {
    fn default() -> Self {
        CreditStatus::Active
    }
}

// =============================================================================
// Movement Recorder
// =============================================================================

/// Category of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    Sale,
    Purchase,
    Adjustment,
    Return,
    Damage,
    Loss,
}

impl MovementType {
    /// Human-readable description for movement listings.
    pub fn description(self) -> &'static str {
        match self {
            MovementType::Sale => "Sale",
            MovementType::Purchase => "Purchase",
            MovementType::Adjustment => "Stock Adjustment",
            MovementType::Return => "Return",
            MovementType::Damage => "Damage",
            MovementType::Loss => "Loss",
        }
    }
}

/// Typed reference from a stock movement back to the document that caused it.
///
/// Stored as (`reference_type`, `reference_id`) columns; the enum keeps the
/// pairing statically checked instead of stringly-typed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum MovementRef {
    SalesTransaction(String),
    Purchase(String),
}

impl MovementRef {
    /// The `reference_type` column value.
    pub fn type_name(&self) -> &'static str {
        match self {
            MovementRef::SalesTransaction(_) => "sales_transaction",
            MovementRef::Purchase(_) => "purchase",
        }
    }

    /// The `reference_id` column value.
    pub fn id(&self) -> &str {
        match self {
            MovementRef::SalesTransaction(id) | MovementRef::Purchase(id) => id,
        }
    }

    /// Rebuilds the typed reference from its persisted columns.
    /// Unknown type names yield `None`.
    pub fn from_columns(reference_type: Option<&str>, reference_id: Option<&str>) -> Option<Self> {
        match (reference_type, reference_id) {
            (Some("sales_transaction"), Some(id)) => {
                Some(MovementRef::SalesTransaction(id.to_string()))
            }
            (Some("purchase"), Some(id)) => Some(MovementRef::Purchase(id.to_string())),
            _ => None,
        }
    }
}

/// One immutable entry in the stock ledger.
///
/// Invariant: `quantity_after = quantity_before + quantity_change`, and
/// `quantity_before` equals the product's counter immediately prior to the
/// movement. `current_stock` is always re-derivable as the sum of all
/// `quantity_change` values for the product.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    pub movement_type: MovementType,
    /// Signed: positive for additions, negative for reductions.
    pub quantity_change: i64,
    pub quantity_before: i64,
    pub quantity_after: i64,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub user_id: Option<String>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    /// The typed document reference, when one was recorded.
    pub fn reference(&self) -> Option<MovementRef> {
        MovementRef::from_columns(self.reference_type.as_deref(), self.reference_id.as_deref())
    }

    /// "in" for additions, "out" for reductions.
    pub fn direction(&self) -> &'static str {
        if self.quantity_change > 0 {
            "in"
        } else {
            "out"
        }
    }

    /// Checks the before/change/after bookkeeping invariant.
    pub fn verify(&self) -> Result<(), CoreError> {
        if self.quantity_before + self.quantity_change != self.quantity_after {
            return Err(CoreError::InconsistentMovement {
                before: self.quantity_before,
                change: self.quantity_change,
                after: self.quantity_after,
            });
        }
        Ok(())
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product carrying the live stock counter.
///
/// `current_stock` is mutated only by the movement recorder
/// (`ProductRepository::adjust_stock` in tillbook-db); every change appends
/// one [`StockMovement`] with before/after snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    pub name: String,
    pub description: Option<String>,

    /// Stock Keeping Unit - business identifier, unique.
    pub sku: String,

    /// Barcode (EAN-13, UPC-A, etc.), unique when present.
    pub barcode: Option<String>,

    pub category_id: Option<String>,

    pub selling_price: Money,
    pub cost_price: Money,

    /// Live stock counter; equals the sum of all movement quantity_change
    /// values since creation.
    pub current_stock: i64,

    /// Reorder threshold for low-stock reporting.
    pub minimum_stock_level: i64,

    /// Allow selling when stock is zero or would go negative.
    pub allow_negative_stock: bool,

    /// Path string for the product image, stored verbatim.
    pub image_path: Option<String>,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_low_stock(&self) -> bool {
        self.current_stock <= self.minimum_stock_level
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.current_stock <= 0
    }

    /// Profit margin over cost, as a percentage. Zero cost yields zero.
    pub fn profit_margin(&self) -> f64 {
        if self.cost_price.is_zero() {
            return 0.0;
        }
        (self.selling_price - self.cost_price).cents() as f64 / self.cost_price.cents() as f64
            * 100.0
    }

    /// Value of the stock on hand at selling price.
    pub fn stock_value(&self) -> Money {
        self.selling_price.multiply_quantity(self.current_stock)
    }

    /// Whether a decrement of `quantity` units is permitted by the
    /// negative-stock policy.
    pub fn can_deduct(&self, quantity: i64) -> bool {
        self.allow_negative_stock || self.current_stock >= quantity
    }
}

// =============================================================================
// Category
// =============================================================================

/// Product grouping for catalogue navigation and reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Customer
// =============================================================================

/// A customer account carrying an outstanding credit balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Customer {
    pub id: String,

    /// Business identifier, e.g. "CUST000001", unique.
    pub customer_code: String,

    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,

    /// Unpaid amount accrued from completed credit sales.
    pub outstanding_balance: Money,
    pub credit_limit: Money,
    pub credit_status: CreditStatus,
    pub last_payment_date: Option<NaiveDate>,

    /// Lifetime totals, bumped on every balance accrual.
    pub total_purchases: Money,
    pub total_transactions: i64,

    pub notes: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// Whether a new charge of `amount` fits the credit policy.
    ///
    /// False whenever the account is not active, regardless of balance;
    /// otherwise the charge must keep the balance within the limit.
    pub fn can_purchase(&self, amount: Money) -> bool {
        if self.credit_status != CreditStatus::Active {
            return false;
        }
        self.outstanding_balance + amount <= self.credit_limit
    }

    /// The balance may exceed the limit after the fact (the gate only
    /// applies to new charges); this flags those accounts.
    pub fn has_exceeded_credit_limit(&self) -> bool {
        self.outstanding_balance > self.credit_limit
    }

    /// Outstanding balance as a percentage of the credit limit.
    pub fn credit_utilization(&self) -> f64 {
        if self.credit_limit.is_zero() {
            return 0.0;
        }
        self.outstanding_balance.cents() as f64 / self.credit_limit.cents() as f64 * 100.0
    }
}

// =============================================================================
// Vendor
// =============================================================================

/// A supplier account; balances accrue when purchases are received with an
/// unpaid remainder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Vendor {
    pub id: String,
    pub name: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub tax_id: Option<String>,

    pub outstanding_balance: Money,
    pub credit_limit: Money,

    /// Free-form terms such as "Net 30".
    pub payment_terms: Option<String>,

    pub total_purchases: Money,
    pub total_orders: i64,

    pub notes: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vendor {
    pub fn has_exceeded_credit_limit(&self) -> bool {
        self.outstanding_balance > self.credit_limit
    }

    pub fn credit_utilization(&self) -> f64 {
        if self.credit_limit.is_zero() {
            return 0.0;
        }
        self.outstanding_balance.cents() as f64 / self.credit_limit.cents() as f64 * 100.0
    }

    pub fn average_order_value(&self) -> Money {
        if self.total_orders == 0 {
            return Money::zero();
        }
        Money::from_cents(self.total_purchases.cents() / self.total_orders)
    }
}

// =============================================================================
// Sales Transaction
// =============================================================================

/// A sales document: ordered line items, derived totals, and a one-way
/// terminal state transition that drives the stock ledger and customer
/// balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SalesTransaction {
    pub id: String,

    /// Receipt number from the numbering service, unique.
    pub transaction_number: String,

    pub customer_id: Option<String>,
    pub user_id: Option<String>,

    pub subtotal: Money,
    pub discount_amount: Money,
    pub total_amount: Money,
    pub amount_paid: Money,
    pub remaining_balance: Money,

    pub payment_status: PaymentStatus,
    pub status: SaleStatus,

    pub notes: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line item in a sales transaction. Insertion order is line order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SalesItem {
    pub id: String,
    pub sales_transaction_id: String,
    pub product_id: String,
    /// Positive integer.
    pub quantity: i64,
    pub unit_price: Money,
    /// Always `quantity × unit_price`.
    pub total_price: Money,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Purchase
// =============================================================================

/// A purchase order mirroring [`SalesTransaction`], with an
/// ordered/received quantity split per line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Purchase {
    pub id: String,

    /// Purchase order number, unique.
    pub purchase_number: String,

    pub vendor_id: String,
    pub user_id: Option<String>,

    pub subtotal: Money,
    pub tax_amount: Money,
    pub total_amount: Money,
    pub amount_paid: Money,
    pub remaining_balance: Money,

    pub payment_status: PaymentStatus,
    pub status: PurchaseStatus,

    pub order_date: NaiveDate,
    pub expected_delivery_date: Option<NaiveDate>,
    pub received_date: Option<NaiveDate>,
    pub invoice_number: Option<String>,

    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line item in a purchase order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PurchaseItem {
    pub id: String,
    pub purchase_id: String,
    pub product_id: String,
    pub quantity_ordered: i64,
    /// Only the received quantity hits the stock ledger.
    pub quantity_received: i64,
    pub unit_cost: Money,
    /// Always `quantity_ordered × unit_cost`.
    pub total_cost: Money,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Payment
// =============================================================================

/// An immutable payment record against a sale or purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Payment {
    pub id: String,
    pub sales_transaction_id: Option<String>,
    pub purchase_id: Option<String>,
    pub customer_id: Option<String>,
    pub user_id: Option<String>,
    pub payment_type: PaymentType,
    pub amount: Money,
    /// Receipt number or external reference.
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
    pub payment_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
