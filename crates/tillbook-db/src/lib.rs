//! # tillbook-db: Database Layer for Tillbook
//!
//! This crate persists the Tillbook ledger in SQLite using sqlx for async
//! operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tillbook Data Flow                               │
//! │                                                                         │
//! │  Caller (admin surface, CLI, service)                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    tillbook-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ (per entity)  │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ SqlitePool    │    │ ProductRepo   │    │ 001_init.sql │  │   │
//! │  │   │ WAL + FKs     │◄───│ SaleRepo      │    │ ...          │  │   │
//! │  │   │               │    │ PurchaseRepo  │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (or :memory: in tests)                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Transaction Discipline
//!
//! Every ledger mutation is one SQLite transaction:
//! - a stock adjustment writes the counter delta and the movement row together
//! - a document transition writes the status flip, all of its movements, and
//!   any balance accrual together
//! - a payment writes the payment row, the re-derived totals, and any
//!   balance settlement together
//!
//! A rejection anywhere (negative-stock policy, invalid transition) rolls
//! the whole transaction back.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tillbook_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/tillbook.db")).await?;
//!
//! let store = db.settings().active_store().await?;
//! let sale = db.sales().create(&store, NewSale::default()).await?;
//! db.sales().add_item(&sale.id, &product_id, 2, None).await?;
//! db.sales().complete(&sale.id, None).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::customer::{CustomerRepository, NewCustomer};
pub use repository::movement::{MovementRepository, StockAdjustment};
pub use repository::product::{NewProduct, ProductRepository};
pub use repository::purchase::{NewPurchase, PurchaseRepository};
pub use repository::sale::{NewSale, SaleRepository};
pub use repository::settings::SettingsRepository;
pub use repository::vendor::{NewVendor, VendorRepository};
