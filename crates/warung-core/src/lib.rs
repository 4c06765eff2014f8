//! # warung-core: Pure Business Logic for Warung POS
//!
//! This crate is the **heart** of the sale-commit pipeline. It contains all
//! business logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Warung POS Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                    UI layer (external)                          │    │
//! │  │    Cart screen ──► Tender screen ──► Receipt                    │    │
//! │  └─────────────────────────────┬───────────────────────────────────┘    │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐    │
//! │  │                 warung-checkout (engine)                        │    │
//! │  │    commit_sale, low_stock, daily_cash_summary, ...              │    │
//! │  └─────────────────────────────┬───────────────────────────────────┘    │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐    │
//! │  │               ★ warung-core (THIS CRATE) ★                      │    │
//! │  │                                                                 │    │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐    │    │
//! │  │   │   types   │  │   money   │  │   cart    │  │  pricing  │    │    │
//! │  │   │  Product  │  │   Money   │  │   Cart    │  │  totals   │    │    │
//! │  │   │  ledgers  │  │  TaxRate  │  │ CartLine  │  │  discount │    │    │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘    │    │
//! │  │   ┌───────────┐  ┌───────────┐                                  │    │
//! │  │   │   stock   │  │ validation│                                  │    │
//! │  │   │   guard   │  │   rules   │                                  │    │
//! │  │   └───────────┘  └───────────┘                                  │    │
//! │  │                                                                 │    │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS            │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐    │
//! │  │                    warung-db (Database Layer)                   │    │
//! │  │          SQLite ledgers, migrations, repositories               │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Transaction, the two ledgers, etc.)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`cart`] - The session-owned cart aggregate
//! - [`pricing`] - Cart pricing and totals re-derivation
//! - [`stock`] - Stock guard (advisory clamp / authoritative check)
//! - [`error`] - Domain error types
//! - [`validation`] - Boundary validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are whole rupiah (i64), no floats
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use warung_core::money::Money;
//! use warung_core::types::TaxRate;
//!
//! // Create money from whole rupiah (never from floats!)
//! let subtotal = Money::from_rupiah(20_000);
//!
//! // Calculate 10% sales tax
//! let tax = subtotal.calculate_tax(TaxRate::from_bps(1000));
//! assert_eq!(tax.rupiah(), 2_000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod money;
pub mod pricing;
pub mod stock;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use warung_core::Money` instead of
// `use warung_core::money::Money`

pub use cart::{Cart, CartLine};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use pricing::{CartTotals, Discount, PricingCalculator};
pub use stock::StockCheck;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single cart
///
/// ## Business Reason
/// Prevents runaway carts and keeps receipts printable.
pub const MAX_CART_LINES: usize = 100;

/// Maximum quantity of a single line in a cart
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_LINE_QUANTITY: i64 = 999;
