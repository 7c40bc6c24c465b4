//! # Repository Implementations
//!
//! One repository per aggregate, all sharing the pool:
//!
//! - [`product`] - Catalogue CRUD, categories, manual stock adjustments
//! - [`movement`] - The stock ledger (append-only) and its in-transaction writer
//! - [`customer`] / [`vendor`] - Balance-carrying counterparty accounts
//! - [`sale`] / [`purchase`] - Document aggregates and their transitions
//! - [`settings`] - Store configuration and typed system settings
//!
//! Ledger mutations never span repositories through separate transactions:
//! document repositories open one transaction and call the movement and
//! balance writers on it.

pub mod customer;
pub mod movement;
pub mod product;
pub mod purchase;
pub mod sale;
pub mod settings;
pub mod vendor;
