//! # tillbook-core: Pure Business Logic for Tillbook
//!
//! This crate is the **heart** of the Tillbook ledger engine. It contains
//! all business logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      Tillbook Architecture                          │
//! │                                                                     │
//! │  ┌───────────────────────────────────────────────────────────────┐ │
//! │  │            ★ tillbook-core (THIS CRATE) ★                     │ │
//! │  │                                                               │ │
//! │  │  ┌────────┐ ┌──────────┐ ┌───────────┐ ┌──────────┐          │ │
//! │  │  │ money  │ │  types   │ │ document  │ │ numbering│          │ │
//! │  │  │ Money  │ │ entities │ │  totals   │ │ receipts │          │ │
//! │  │  └────────┘ └──────────┘ └───────────┘ └──────────┘          │ │
//! │  │  ┌──────────┐ ┌────────────┐                                 │ │
//! │  │  │ settings │ │ validation │                                 │ │
//! │  │  └──────────┘ └────────────┘                                 │ │
//! │  │                                                               │ │
//! │  │  NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │ │
//! │  └──────────────────────────────┬────────────────────────────────┘ │
//! │                                 │                                   │
//! │  ┌──────────────────────────────▼────────────────────────────────┐ │
//! │  │               tillbook-db (Database Layer)                    │ │
//! │  │       SQLite queries, migrations, repositories, txns          │ │
//! │  └───────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, SalesTransaction, StockMovement, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`document`] - Document-aggregate total derivation
//! - [`numbering`] - Template-driven receipt/order numbering
//! - [`settings`] - Store configuration and typed system settings
//! - [`error`] - Domain error types
//! - [`validation`] - Structural input validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input,
//!    same output; "now" is always a parameter
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are cents (i64)
//! 4. **Explicit Errors**: All errors are typed, never strings or panics

pub mod document;
pub mod error;
pub mod money;
pub mod numbering;
pub mod settings;
pub mod types;
pub mod validation;

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use settings::{SettingKind, SettingValue, StoreConfig, SystemSetting};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity of a single line item.
///
/// Prevents accidental over-ordering (e.g. typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Receipt number template used when the store has none configured.
pub const DEFAULT_RECEIPT_NUMBER_FORMAT: &str = "POS-{YYYY}-{MM}-{DD}-{0000}";

/// Purchase order number template.
pub const DEFAULT_PURCHASE_NUMBER_FORMAT: &str = "PO-{YYYY}{MM}{DD}-{0000}";

/// Prefix for generated customer codes: `CUST000001`.
pub const CUSTOMER_CODE_PREFIX: &str = "CUST";
