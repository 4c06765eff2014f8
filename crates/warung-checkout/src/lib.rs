//! # warung-checkout: The Sale-Commit Engine
//!
//! The orchestration layer of Warung POS: everything between "the cashier
//! hit pay" and "the sale, the stock ledger, the cash book and the
//! customer aggregate all agree".
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Warung POS Commit Pipeline                           │
//! │                                                                         │
//! │   Cart (warung-core) ──► CheckoutEngine::commit_sale                    │
//! │                               │                                         │
//! │                               ▼                                         │
//! │   ┌───────────────────────────────────────────────────────────────┐     │
//! │   │                 warung-checkout (THIS CRATE)                  │     │
//! │   │                                                               │     │
//! │   │  ┌────────────┐ ┌────────────┐ ┌─────────────┐ ┌──────────┐   │     │
//! │   │  │ committer  │ │ numbering  │ │ propagation │ │  config  │   │     │
//! │   │  │ the saga   │ │ TRX-...    │ │ bounded     │ │  TOML    │   │     │
//! │   │  │            │ │ idempotency│ │ backoff     │ │          │   │     │
//! │   │  └────────────┘ └────────────┘ └─────────────┘ └──────────┘   │     │
//! │   └───────────────────────────────────────────────────────────────┘     │
//! │                               │                                         │
//! │                               ▼                                         │
//! │   warung-db: atomic commit unit + ledgers + reconciliation queue        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//! ```rust,ignore
//! use warung_checkout::{CheckoutEngine, EngineConfig};
//! use warung_core::Cart;
//! use warung_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./warung.db")).await?;
//! let engine = CheckoutEngine::new(db, EngineConfig::load("./warung.toml")?);
//!
//! let mut cart = Cart::new("kasir-1");
//! cart.add_line(&product, 2)?;
//!
//! let receipt = engine.commit_sale(&cart).await?;
//! println!("{} total Rp{}", receipt.transaction_number, receipt.total);
//! cart.clear();
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod committer;
pub mod config;
pub mod error;
pub mod numbering;
mod propagation;

// =============================================================================
// Re-exports
// =============================================================================

pub use committer::{CheckoutEngine, CommitReceipt};
pub use config::{ConfigError, EngineConfig, PricingConfig, PropagationConfig};
pub use error::{CommitError, CommitResult};
pub use numbering::generate_transaction_number;
