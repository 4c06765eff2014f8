//! # Cart
//!
//! The mutable, pre-commit state of one prospective sale.
//!
//! ## Ownership
//! The cart is a plain aggregate owned by the calling session and passed
//! by reference into the commit pipeline. There is no ambient singleton;
//! two cashier sessions hold two carts. Nothing here is persisted, so an
//! abandoned cart simply drops with zero side effects.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Cart Operations                                   │
//! │                                                                         │
//! │  Scan Product ───────────► add_line() ─────────► lines.push / merge     │
//! │                             (stock guard clamps, rejects empty stock)   │
//! │  Change Quantity ────────► update_quantity() ──► lines[i].qty = n       │
//! │  Remove Line ────────────► remove_line() ──────► lines.remove(i)        │
//! │  Attach Member ──────────► attach_customer() ──► customer_id = Some     │
//! │  Choose Tender ──────────► set_payment_method()                         │
//! │  Commit / Abandon ───────► clear() ────────────► lines.clear()          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::pricing::Discount;
use crate::stock::{self, StockCheck};
use crate::types::{PaymentMethod, Product};
use crate::validation::validate_quantity;
use crate::MAX_CART_LINES;

/// A line in the cart.
///
/// ## Design Notes
/// - `product_id`: Reference to the product (for the commit-time re-check)
/// - The sku/name/price fields are frozen copies taken when the line was
///   added. The cart keeps displaying consistent data even if the catalog
///   changes underneath it, and the committed transaction line snapshots
///   exactly these values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    /// Product ID (UUID)
    pub product_id: String,

    /// SKU at time of adding (frozen)
    pub sku: String,

    /// Product name at time of adding (frozen)
    pub name: String,

    /// Price in rupiah at time of adding (frozen)
    pub unit_price: i64,

    /// Quantity in cart
    pub quantity: i64,

    /// When this line was added
    pub added_at: DateTime<Utc>,
}

impl CartLine {
    /// Creates a new cart line from a product and quantity, freezing the
    /// price at this moment.
    pub fn from_product(product: &Product, quantity: i64) -> Self {
        CartLine {
            product_id: product.id.clone(),
            sku: product.sku.clone(),
            name: product.name.clone(),
            unit_price: product.unit_price,
            quantity,
            added_at: Utc::now(),
        }
    }

    /// Calculates the line subtotal (unit price × quantity).
    pub fn subtotal(&self) -> i64 {
        self.unit_price * self.quantity
    }

    /// Line subtotal as Money.
    pub fn subtotal_money(&self) -> Money {
        Money::from_rupiah(self.subtotal())
    }
}

/// The cart for one prospective sale.
///
/// ## Invariants
/// - Lines are unique by `product_id` (adding the same product merges
///   quantities, still clamped to stock)
/// - Quantity is always 1..=stock-at-edit-time (advisory; commit re-checks)
/// - Maximum lines: [`MAX_CART_LINES`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    /// Lines in the cart.
    pub lines: Vec<CartLine>,

    /// Selected customer, None for walk-ins.
    pub customer_id: Option<String>,

    /// The cashier ringing up this sale.
    pub cashier: String,

    /// Chosen tender.
    pub payment_method: PaymentMethod,

    /// Externally resolved discount, if any. Which promotion applies is
    /// decided elsewhere; the cart only carries the resolved value.
    pub discount: Option<Discount>,

    /// When the cart was created/last cleared.
    pub created_at: DateTime<Utc>,
}

impl Cart {
    /// Creates a new empty cart for the given cashier. Tender defaults to
    /// cash, the overwhelmingly common case at the counter.
    pub fn new(cashier: impl Into<String>) -> Self {
        Cart {
            lines: Vec::new(),
            customer_id: None,
            cashier: cashier.into(),
            payment_method: PaymentMethod::Cash,
            discount: None,
            created_at: Utc::now(),
        }
    }

    /// Adds a product to the cart or merges into the existing line.
    ///
    /// The stock guard clamps the resulting quantity to the stock the
    /// caller just read; products with zero stock are refused. Returns the
    /// guard's verdict so the UI can tell the cashier a request was
    /// reduced.
    pub fn add_line(&mut self, product: &Product, quantity: i64) -> CoreResult<StockCheck> {
        if let Some(line) = self.lines.iter_mut().find(|l| l.product_id == product.id) {
            let check = stock::clamp_to_stock(product, line.quantity + quantity)?;
            line.quantity = check.accepted;
            return Ok(check);
        }

        if self.lines.len() >= MAX_CART_LINES {
            return Err(CoreError::CartTooLarge {
                max: MAX_CART_LINES,
            });
        }

        let check = stock::clamp_to_stock(product, quantity)?;
        self.lines
            .push(CartLine::from_product(product, check.accepted));
        Ok(check)
    }

    /// Sets the quantity of an existing line, clamped to the product's
    /// current stock. Quantity 0 removes the line.
    pub fn update_quantity(&mut self, product: &Product, quantity: i64) -> CoreResult<StockCheck> {
        if quantity == 0 {
            self.remove_line(&product.id)?;
            return Ok(StockCheck {
                accepted: 0,
                clamped: false,
            });
        }

        validate_quantity(quantity)?;

        let line = self
            .lines
            .iter_mut()
            .find(|l| l.product_id == product.id)
            .ok_or_else(|| CoreError::ProductNotFound(product.id.clone()))?;

        let check = stock::clamp_to_stock(product, quantity)?;
        line.quantity = check.accepted;
        Ok(check)
    }

    /// Removes a line from the cart by product ID.
    pub fn remove_line(&mut self, product_id: &str) -> CoreResult<()> {
        let initial_len = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);

        if self.lines.len() == initial_len {
            Err(CoreError::ProductNotFound(product_id.to_string()))
        } else {
            Ok(())
        }
    }

    /// Attaches a customer to the sale.
    pub fn attach_customer(&mut self, customer_id: impl Into<String>) {
        self.customer_id = Some(customer_id.into());
    }

    /// Detaches the customer (back to walk-in).
    pub fn detach_customer(&mut self) {
        self.customer_id = None;
    }

    /// Sets the tender for this sale.
    pub fn set_payment_method(&mut self, method: PaymentMethod) {
        self.payment_method = method;
    }

    /// Sets the externally resolved discount.
    pub fn set_discount(&mut self, discount: Option<Discount>) {
        self.discount = discount;
    }

    /// Clears all lines and selections from the cart.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.customer_id = None;
        self.discount = None;
        self.created_at = Utc::now();
    }

    /// Returns the number of lines in the cart.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Returns the total quantity across all lines.
    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Calculates the subtotal (before tax and discount).
    pub fn subtotal(&self) -> i64 {
        self.lines.iter().map(|l| l.subtotal()).sum()
    }

    /// Checks if the cart is empty.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
