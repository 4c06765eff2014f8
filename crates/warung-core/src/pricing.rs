//! # Pricing Calculator
//!
//! Pure, deterministic cart pricing.
//!
//! ## The One Formula
//! ```text
//! subtotal = Σ (unit_price × quantity)          over the cart lines
//! tax      = subtotal × tax_rate                 (integer, half-up)
//! discount = externally resolved, floored at 0, capped at its max
//! total    = max(0, subtotal + tax − discount)
//! ```
//!
//! The same arithmetic re-derives the totals of a persisted transaction
//! from its lines, which is how reconciliation and the test suite verify
//! that what was stored is what the calculator would produce.
//!
//! Deciding WHICH promotion applies is someone else's job; this module
//! only applies a resolved [`Discount`] value.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::cart::CartLine;
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{TaxRate, Transaction, TransactionLine};

// =============================================================================
// Discount
// =============================================================================

/// An externally resolved discount, ready to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Discount {
    /// A fixed amount off.
    Amount { value: Money },
    /// A percentage of the subtotal, optionally capped.
    Percent {
        bps: u32,
        /// Maximum discount this promotion may grant.
        max: Option<Money>,
    },
}

impl Discount {
    /// The rupiah value of this discount against a given subtotal.
    /// Never negative; percentage discounts respect their configured cap.
    pub fn amount_for(&self, subtotal: Money) -> Money {
        match self {
            Discount::Amount { value } => value.floor_at_zero(),
            Discount::Percent { bps, max } => {
                let raw = subtotal.percentage(*bps);
                let capped = match max {
                    Some(cap) => raw.min(*cap),
                    None => raw,
                };
                capped.floor_at_zero()
            }
        }
    }
}

// =============================================================================
// Cart Totals
// =============================================================================

/// The priced cart: what the cashier sees and what the transaction stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartTotals {
    pub subtotal: i64,
    pub tax: i64,
    pub discount: i64,
    pub total: i64,
}

// =============================================================================
// Pricing Calculator
// =============================================================================

/// Prices carts and re-derives persisted totals. Pure: same input, same
/// output, no side effects.
#[derive(Debug, Clone, Copy)]
pub struct PricingCalculator {
    tax_rate: TaxRate,
}

impl PricingCalculator {
    /// Creates a calculator with the given tax rate.
    pub fn new(tax_rate: TaxRate) -> Self {
        PricingCalculator { tax_rate }
    }

    /// The configured tax rate.
    pub fn tax_rate(&self) -> TaxRate {
        self.tax_rate
    }

    /// Prices a cart's lines with an optional resolved discount.
    pub fn price(&self, lines: &[CartLine], discount: Option<&Discount>) -> CartTotals {
        let subtotal = Money::from_rupiah(lines.iter().map(|l| l.subtotal()).sum());
        let tax = subtotal.calculate_tax(self.tax_rate);
        let discount_amount = discount
            .map(|d| d.amount_for(subtotal))
            .unwrap_or(Money::zero());
        let total = (subtotal + tax - discount_amount).floor_at_zero();

        CartTotals {
            subtotal: subtotal.rupiah(),
            tax: tax.rupiah(),
            discount: discount_amount.rupiah(),
            total: total.rupiah(),
        }
    }

    /// Re-derives the totals of a persisted transaction from its lines.
    ///
    /// The discount is taken from the stored header (it was an external
    /// input at sale time and cannot be re-resolved); subtotal, tax and
    /// total are recomputed from scratch.
    pub fn rederive(&self, transaction: &Transaction, lines: &[TransactionLine]) -> CartTotals {
        let subtotal = Money::from_rupiah(lines.iter().map(|l| l.subtotal).sum());
        let tax = subtotal.calculate_tax(self.tax_rate);
        let discount = Money::from_rupiah(transaction.discount);
        let total = (subtotal + tax - discount).floor_at_zero();

        CartTotals {
            subtotal: subtotal.rupiah(),
            tax: tax.rupiah(),
            discount: discount.rupiah(),
            total: total.rupiah(),
        }
    }

    /// Verifies a persisted transaction reproduces its own totals.
    ///
    /// Assumes the calculator carries the tax rate that was in force at
    /// sale time.
    pub fn verify(&self, transaction: &Transaction, lines: &[TransactionLine]) -> CoreResult<()> {
        let derived = self.rederive(transaction, lines);

        if derived.total != transaction.total || derived.subtotal != transaction.subtotal {
            return Err(CoreError::TotalsMismatch {
                number: transaction.number.clone(),
                stored: transaction.total,
                derived: derived.total,
            });
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PaymentMethod, Product, TransactionStatus};
    use chrono::Utc;

    fn test_product(id: &str, price: i64, stock: i64) -> Product {
        Product {
            id: id.to_string(),
            sku: format!("SKU-{}", id),
            name: format!("Product {}", id),
            unit_price: price,
            stock,
            min_stock: 0,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn lines_for(items: &[(i64, i64)]) -> Vec<CartLine> {
        items.iter()
            .enumerate()
            .map(|(i, (price, qty))| {
                CartLine::from_product(&test_product(&i.to_string(), *price, 999), *qty)
            })
            .collect()
    }

    #[test]
    fn test_price_basic() {
        // 2 × Rp10.000 at 10% tax, no discount
        let calc = PricingCalculator::new(TaxRate::from_bps(1000));
        let totals = calc.price(&lines_for(&[(10_000, 2)]), None);

        assert_eq!(totals.subtotal, 20_000);
        assert_eq!(totals.tax, 2_000);
        assert_eq!(totals.discount, 0);
        assert_eq!(totals.total, 22_000);
    }

    #[test]
    fn test_price_multiple_lines() {
        let calc = PricingCalculator::new(TaxRate::from_bps(1000));
        let totals = calc.price(&lines_for(&[(10_000, 2), (5_000, 3)]), None);

        assert_eq!(totals.subtotal, 35_000);
        assert_eq!(totals.tax, 3_500);
        assert_eq!(totals.total, 38_500);
    }

    #[test]
    fn test_price_amount_discount() {
        let calc = PricingCalculator::new(TaxRate::from_bps(1000));
        let discount = Discount::Amount {
            value: Money::from_rupiah(5_000),
        };
        let totals = calc.price(&lines_for(&[(10_000, 2)]), Some(&discount));

        assert_eq!(totals.discount, 5_000);
        assert_eq!(totals.total, 17_000);
    }

    #[test]
    fn test_price_percent_discount_with_cap() {
        let calc = PricingCalculator::new(TaxRate::from_bps(1000));
        // 10% of Rp100.000 would be Rp10.000, capped at Rp7.500
        let discount = Discount::Percent {
            bps: 1000,
            max: Some(Money::from_rupiah(7_500)),
        };
        let totals = calc.price(&lines_for(&[(100_000, 1)]), Some(&discount));

        assert_eq!(totals.discount, 7_500);
        assert_eq!(totals.total, 100_000 + 10_000 - 7_500);
    }

    #[test]
    fn test_price_negative_discount_floors_at_zero() {
        let calc = PricingCalculator::new(TaxRate::from_bps(1000));
        let discount = Discount::Amount {
            value: Money::from_rupiah(-5_000),
        };
        let totals = calc.price(&lines_for(&[(10_000, 1)]), Some(&discount));

        assert_eq!(totals.discount, 0);
        assert_eq!(totals.total, 11_000);
    }

    #[test]
    fn test_price_oversized_discount_floors_total_at_zero() {
        let calc = PricingCalculator::new(TaxRate::from_bps(1000));
        let discount = Discount::Amount {
            value: Money::from_rupiah(1_000_000),
        };
        let totals = calc.price(&lines_for(&[(10_000, 1)]), Some(&discount));

        assert_eq!(totals.total, 0);
    }

    #[test]
    fn test_price_empty_cart_is_all_zero() {
        let calc = PricingCalculator::new(TaxRate::from_bps(1000));
        let totals = calc.price(&[], None);

        assert_eq!(totals.subtotal, 0);
        assert_eq!(totals.tax, 0);
        assert_eq!(totals.total, 0);
    }

    #[test]
    fn test_discount_serializes_tagged() {
        // The UI layer sends resolved discounts as tagged JSON
        let discount = Discount::Percent {
            bps: 1000,
            max: Some(Money::from_rupiah(7_500)),
        };
        let json = serde_json::to_value(&discount).unwrap();

        assert_eq!(json["kind"], "percent");
        assert_eq!(json["bps"], 1000);
        assert_eq!(json["max"], 7_500);
    }

    #[test]
    fn test_round_trip_from_persisted_transaction() {
        let calc = PricingCalculator::new(TaxRate::from_bps(1000));
        let cart_lines = lines_for(&[(10_000, 2)]);
        let totals = calc.price(&cart_lines, None);

        let now = Utc::now();
        let transaction = Transaction {
            id: "t1".into(),
            number: "TRX-1".into(),
            customer_id: None,
            cashier: "kasir-1".into(),
            subtotal: totals.subtotal,
            tax: totals.tax,
            discount: totals.discount,
            total: totals.total,
            payment_method: PaymentMethod::Cash,
            status: TransactionStatus::Completed,
            created_at: now,
        };
        let lines = vec![TransactionLine {
            id: "l1".into(),
            transaction_id: "t1".into(),
            product_id: "0".into(),
            name_snapshot: "Product 0".into(),
            unit_price: 10_000,
            quantity: 2,
            subtotal: 20_000,
            created_at: now,
        }];

        assert!(calc.verify(&transaction, &lines).is_ok());
        assert_eq!(calc.rederive(&transaction, &lines), totals);
    }

    #[test]
    fn test_verify_catches_tampered_total() {
        let calc = PricingCalculator::new(TaxRate::from_bps(1000));
        let now = Utc::now();
        let transaction = Transaction {
            id: "t1".into(),
            number: "TRX-1".into(),
            customer_id: None,
            cashier: "kasir-1".into(),
            subtotal: 20_000,
            tax: 2_000,
            discount: 0,
            total: 99_999, // wrong on purpose
            payment_method: PaymentMethod::Cash,
            status: TransactionStatus::Completed,
            created_at: now,
        };
        let lines = vec![TransactionLine {
            id: "l1".into(),
            transaction_id: "t1".into(),
            product_id: "0".into(),
            name_snapshot: "Product 0".into(),
            unit_price: 10_000,
            quantity: 2,
            subtotal: 20_000,
            created_at: now,
        }];

        assert!(matches!(
            calc.verify(&transaction, &lines),
            Err(CoreError::TotalsMismatch { .. })
        ));
    }
}
