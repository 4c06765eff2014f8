//! # Commit Error Taxonomy
//!
//! The caller-facing errors of the sale-commit pipeline.
//!
//! ## The Taxonomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Validation   Rejected before any write. Empty cart, bad quantity,      │
//! │               missing field. Fully recoverable, fix the input.          │
//! │                                                                         │
//! │  OutOfStock   The authoritative commit-time check failed for at         │
//! │               least one line. The whole commit aborted with nothing     │
//! │               written; re-read stock and let the cashier adjust.        │
//! │                                                                         │
//! │  Persistence  The durable write itself failed. Nothing committed;       │
//! │               safe to retry with the SAME transaction number.           │
//! │                                                                         │
//! │  (no variant) Propagation failures are deliberately NOT here. Once      │
//! │               the sale is durable it is never reported as failed;       │
//! │               failed downstream writes land in the reconciliation       │
//! │               queue instead.                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;
use warung_core::CoreError;
use warung_db::DbError;

/// Errors surfaced by the checkout engine.
#[derive(Debug, Error)]
pub enum CommitError {
    /// Input rejected before any write.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// One or more lines lost the race for the remaining stock. The
    /// commit aborted whole; no partial transaction exists.
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    OutOfStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// The durable write failed. Retry with the same transaction number;
    /// the number makes the retry idempotent.
    #[error("Persistence failed: {0}")]
    Persistence(#[from] DbError),
}

/// Result type for checkout operations.
pub type CommitResult<T> = Result<T, CommitError>;

/// Routes domain errors into the taxonomy: stock shortfalls become
/// `OutOfStock`, everything else was bad input.
impl From<CoreError> for CommitError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InsufficientStock {
                sku,
                available,
                requested,
            } => CommitError::OutOfStock {
                product: sku,
                available,
                requested,
            },
            CoreError::StockEmpty { sku } => CommitError::OutOfStock {
                product: sku,
                available: 0,
                requested: 0,
            },
            other => CommitError::Validation(other.to_string()),
        }
    }
}
