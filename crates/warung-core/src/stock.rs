//! # Stock Guard
//!
//! Quantity checks against live product stock.
//!
//! The same rules run twice with different authority:
//!
//! - **Cart-edit time** (advisory): [`clamp_to_stock`] accepts what it can
//!   and tells the caller it clamped. Stock may still change before commit.
//! - **Commit time** (authoritative): [`authorize`] either passes or fails
//!   the line. The storage layer re-checks once more with a conditional
//!   update, so two concurrent sales of the last unit can never both win.

use crate::error::{CoreError, CoreResult};
use crate::types::Product;
use crate::validation::validate_quantity;

/// Outcome of an advisory stock check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockCheck {
    /// The quantity the cart may carry (`min(requested, available)`).
    pub accepted: i64,
    /// Whether the request was reduced to fit available stock.
    pub clamped: bool,
}

/// Clamps a requested quantity to the product's available stock.
///
/// Refuses products with zero stock outright; a cart line of zero units
/// is not a sale.
///
/// ## Example
/// ```rust,ignore
/// let check = clamp_to_stock(&product, 5)?; // product.stock == 3
/// assert_eq!(check.accepted, 3);
/// assert!(check.clamped);
/// ```
pub fn clamp_to_stock(product: &Product, requested: i64) -> CoreResult<StockCheck> {
    validate_quantity(requested)?;

    if product.stock <= 0 {
        return Err(CoreError::StockEmpty {
            sku: product.sku.clone(),
        });
    }

    let accepted = requested.min(product.stock);
    Ok(StockCheck {
        accepted,
        clamped: accepted < requested,
    })
}

/// Authoritative check: the full requested quantity must be available.
///
/// Called by the sale committer against a fresh product read just before
/// the durable write. No clamping here; a shortfall aborts the commit.
pub fn authorize(product: &Product, requested: i64) -> CoreResult<()> {
    validate_quantity(requested)?;

    if product.stock < requested {
        return Err(CoreError::InsufficientStock {
            sku: product.sku.clone(),
            available: product.stock,
            requested,
        });
    }

    Ok(())
}
