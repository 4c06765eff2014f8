//! # Repository Module
//!
//! Repository implementations for database operations.
//!
//! ## Repository Pattern
//! Each repository owns the SQL for one slice of the schema:
//!
//! - [`product`] - Catalog reads, product CRUD (never the stock column)
//! - [`transaction`] - Sale headers + lines, the atomic commit unit
//! - [`stock_ledger`] - Append-only stock movements + the cached stock
//! - [`cash_ledger`] - Append-only daily cash book with running balance
//! - [`customer`] - Customer reads + the dedup-keyed purchase aggregate
//! - [`reconciliation`] - Propagation failures and drift diffs

pub mod cash_ledger;
pub mod customer;
pub mod product;
pub mod reconciliation;
pub mod stock_ledger;
pub mod transaction;
