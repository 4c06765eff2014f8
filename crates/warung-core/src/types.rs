//! # Domain Types
//!
//! Core domain types used throughout Warung POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐        │
//! │  │    Product      │   │  Transaction    │   │  StockMovement  │        │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │        │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │        │
//! │  │  sku (business) │   │  number (biz)   │   │  before / after │        │
//! │  │  unit_price     │   │  totals         │   │  reason         │        │
//! │  │  stock (cache)  │   │  status         │   │  txn reference  │        │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘        │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐        │
//! │  │   CashEntry     │   │    Customer     │   │ TransactionLine │        │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │        │
//! │  │  day + seq      │   │  aggregate:     │   │  name snapshot  │        │
//! │  │  running balance│   │  count + spend  │   │  price snapshot │        │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every durable entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID where one exists: (sku, transaction number) - human-readable
//!
//! ## Append-Only Ledgers
//! `StockMovement` and `CashEntry` are never mutated in place. The
//! `Product.stock` column and `Customer` aggregate are caches derived from
//! them; the ledgers are the source of truth.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 1000 bps = 10% (the default PPN-style sales tax rate)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a percentage (for convenience).
    pub fn from_percentage(pct: f64) -> Self {
        TaxRate((pct * 100.0).round() as u32)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    /// Checks if tax rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
///
/// Owned by the catalog. The commit pipeline reads it and mutates `stock`
/// only through stock-ledger movements; `stock` is a cache of the latest
/// movement's `stock_after`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Display name shown to cashier and on receipt.
    pub name: String,

    /// Unit price in whole rupiah.
    pub unit_price: i64,

    /// Current stock level (cache of the latest movement's `stock_after`).
    pub stock: i64,

    /// Low-stock alert threshold.
    pub min_stock: i64,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    /// When the product was created.
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    /// When the product was last updated.
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the unit price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_rupiah(self.unit_price)
    }

    /// Checks if the product has fallen to or below its alert threshold.
    #[inline]
    pub fn is_low_stock(&self) -> bool {
        self.stock <= self.min_stock
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A customer with the denormalized purchase aggregate used for tiering.
///
/// `transaction_count` and `lifetime_spend` are strictly additive and
/// mutated only by the customer-aggregate updater, keyed by transaction
/// number so a retried update never double counts.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    /// Number of completed purchases.
    pub transaction_count: i64,
    /// Total spent across all purchases, in whole rupiah.
    pub lifetime_spend: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// Returns the lifetime spend as Money.
    #[inline]
    pub fn lifetime_spend(&self) -> Money {
        Money::from_rupiah(self.lifetime_spend)
    }
}

// =============================================================================
// Transaction Status
// =============================================================================

/// The status of a sale transaction.
///
/// The commit pipeline only ever writes `Completed`. `Cancelled` exists so
/// the (out-of-scope) refund flow has a representable state; history is
/// never rewritten, compensating ledger entries carry the reversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Sale is being assembled (not yet durable).
    Pending,
    /// Sale has been committed and is final for reporting.
    Completed,
    /// Sale was administratively reversed.
    Cancelled,
}

impl Default for TransactionStatus {
    fn default() -> Self {
        TransactionStatus::Pending
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash payment ("tunai"). The only method that feeds the
    /// cash ledger.
    Cash,
    /// Debit card on external terminal.
    Debit,
    /// Credit card on external terminal.
    Credit,
    /// QRIS wallet payment.
    Qris,
}

impl PaymentMethod {
    /// Whether a completed sale with this method produces a cash-ledger
    /// entry.
    #[inline]
    pub fn is_cash(&self) -> bool {
        matches!(self, PaymentMethod::Cash)
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// A durable sale record.
///
/// Created atomically with its lines. Invariant:
/// `total == subtotal + tax - discount` (floored at zero), and `subtotal`
/// equals the sum of line subtotals.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Transaction {
    pub id: String,
    /// Business identifier, unique under concurrent cashiers. Doubles as
    /// the idempotency key for commit retries.
    pub number: String,
    /// None = walk-in sale.
    pub customer_id: Option<String>,
    pub cashier: String,
    pub subtotal: i64,
    pub tax: i64,
    pub discount: i64,
    pub total: i64,
    pub payment_method: PaymentMethod,
    pub status: TransactionStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Returns the grand total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_rupiah(self.total)
    }
}

// =============================================================================
// Transaction Line
// =============================================================================

/// A line item of exactly one transaction.
/// Uses the snapshot pattern to freeze product data at time of sale;
/// the catalog is never re-read after commit.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TransactionLine {
    pub id: String,
    pub transaction_id: String,
    pub product_id: String,
    /// Product name at time of sale (frozen).
    pub name_snapshot: String,
    /// Unit price in rupiah at time of sale (frozen).
    pub unit_price: i64,
    /// Quantity sold.
    pub quantity: i64,
    /// Line subtotal (unit_price × quantity).
    pub subtotal: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl TransactionLine {
    /// Returns the line subtotal as Money.
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_rupiah(self.subtotal)
    }
}

// =============================================================================
// Stock Movements
// =============================================================================

/// Direction of a stock movement.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    /// Stock received (restock). Quantity is a non-negative magnitude.
    In,
    /// Stock sold. Quantity is a non-negative magnitude.
    Out,
    /// Manual correction. Quantity carries its own sign.
    Adjustment,
}

/// Why a stock movement happened. Closed set, validated at the boundary.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementReason {
    /// Sale-driven decrement, carries a transaction reference.
    Sale,
    /// Goods received from a supplier.
    Restock,
    /// Stock-count correction.
    Correction,
    /// Damaged goods written off.
    Damage,
    /// Shrinkage / loss written off.
    Loss,
}

/// One append-only record of a change to a product's stock level.
///
/// Invariant: `stock_after == stock_before + signed_quantity()`, and for
/// any product the most recent movement's `stock_after` equals the
/// product's cached `stock`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    pub movement_type: MovementType,
    /// Non-negative magnitude for `in`/`out`; signed for `adjustment`.
    pub quantity: i64,
    pub stock_before: i64,
    pub stock_after: i64,
    pub reason: MovementReason,
    /// Set for sale-driven movements, None for manual ones.
    pub transaction_id: Option<String>,
    /// Who caused the movement (cashier id or system actor).
    pub actor: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    /// The movement's effect on stock, with direction folded into the sign.
    #[inline]
    pub fn signed_quantity(&self) -> i64 {
        match self.movement_type {
            MovementType::In => self.quantity,
            MovementType::Out => -self.quantity,
            MovementType::Adjustment => self.quantity,
        }
    }

    /// Checks the before/after arithmetic of this record.
    #[inline]
    pub fn is_balanced(&self) -> bool {
        self.stock_after == self.stock_before + self.signed_quantity()
    }
}

// =============================================================================
// Cash Ledger
// =============================================================================

/// Direction of a cash-ledger entry.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CashDirection {
    /// Cash in ("masuk").
    In,
    /// Cash out ("keluar").
    Out,
}

/// What a cash entry is for. Closed set, validated at the boundary.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CashCategory {
    /// Cash received for a completed sale (carries the transaction ref).
    Sale,
    /// The day's opening float, seeds the running balance.
    OpeningFloat,
    /// Petty expense paid from the drawer.
    Expense,
    /// Cash deposited into the drawer outside a sale.
    Deposit,
    /// Cash taken to the bank / owner.
    Withdrawal,
}

/// One append-only entry in the daily cash ledger ("rekap kas").
///
/// Ordering is part of the entry's identity: `balance` is a running sum,
/// so `seq` is persisted explicitly per day rather than relying on
/// read-time sort stability.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CashEntry {
    pub id: String,
    /// Day bucket, `YYYY-MM-DD`.
    pub day: String,
    /// Position within the day. `balance[seq] = balance[seq-1] ± amount`.
    pub seq: i64,
    pub direction: CashDirection,
    pub category: CashCategory,
    pub description: String,
    /// Always positive; direction carries the sign.
    pub amount: i64,
    /// Running balance after this entry.
    pub balance: i64,
    /// Set when the entry was produced by a sale.
    pub transaction_id: Option<String>,
    pub actor: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl CashEntry {
    /// The entry's effect on the balance, with direction folded into the
    /// sign.
    #[inline]
    pub fn signed_amount(&self) -> i64 {
        match self.direction {
            CashDirection::In => self.amount,
            CashDirection::Out => -self.amount,
        }
    }
}

/// Daily cash reconciliation summary, folded from the day's entries in
/// seq order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DailyCashSummary {
    pub day: String,
    pub total_in: i64,
    pub total_out: i64,
    pub net: i64,
    pub closing_balance: i64,
    pub entry_count: i64,
}

// =============================================================================
// Reconciliation Surface
// =============================================================================

/// Which post-commit propagation step failed.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PropagationStep {
    /// The sale's cash-ledger entry could not be written.
    CashLedger,
    /// The customer aggregate could not be updated.
    CustomerAggregate,
}

/// A committed sale whose downstream propagation kept failing.
///
/// The sale itself stands (the receipt printed); this record is what an
/// operator works through to bring the ledgers back in line.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PropagationFailure {
    pub id: String,
    pub transaction_id: String,
    pub transaction_number: String,
    pub step: PropagationStep,
    /// Human-readable cause, enough to reconcile manually.
    pub detail: String,
    pub resolved: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A product whose cached stock disagrees with its movement ledger.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockDrift {
    pub product_id: String,
    pub sku: String,
    /// The denormalized `products.stock` value.
    pub cached_stock: i64,
    /// The latest movement's `stock_after`, None when no movement exists.
    pub ledger_stock: Option<i64>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_tax_rate_from_bps() {
        let rate = TaxRate::from_bps(1000);
        assert_eq!(rate.bps(), 1000);
        assert!((rate.percentage() - 10.0).abs() < 0.001);
    }

    #[test]
    fn test_tax_rate_from_percentage() {
        let rate = TaxRate::from_percentage(10.0);
        assert_eq!(rate.bps(), 1000);
    }

    #[test]
    fn test_transaction_status_default() {
        assert_eq!(TransactionStatus::default(), TransactionStatus::Pending);
    }

    #[test]
    fn test_payment_method_cash() {
        assert!(PaymentMethod::Cash.is_cash());
        assert!(!PaymentMethod::Debit.is_cash());
        assert!(!PaymentMethod::Qris.is_cash());
    }

    #[test]
    fn test_movement_signed_quantity() {
        let base = StockMovement {
            id: "m1".into(),
            product_id: "p1".into(),
            movement_type: MovementType::Out,
            quantity: 3,
            stock_before: 10,
            stock_after: 7,
            reason: MovementReason::Sale,
            transaction_id: Some("t1".into()),
            actor: "kasir-1".into(),
            created_at: Utc::now(),
        };
        assert_eq!(base.signed_quantity(), -3);
        assert!(base.is_balanced());

        let adjustment = StockMovement {
            movement_type: MovementType::Adjustment,
            quantity: -2,
            stock_before: 7,
            stock_after: 5,
            reason: MovementReason::Damage,
            transaction_id: None,
            ..base
        };
        assert_eq!(adjustment.signed_quantity(), -2);
        assert!(adjustment.is_balanced());
    }

    #[test]
    fn test_cash_entry_signed_amount() {
        let entry = CashEntry {
            id: "c1".into(),
            day: "2026-02-01".into(),
            seq: 1,
            direction: CashDirection::Out,
            category: CashCategory::Expense,
            description: "beli plastik".into(),
            amount: 15_000,
            balance: 85_000,
            transaction_id: None,
            actor: "kasir-1".into(),
            created_at: Utc::now(),
        };
        assert_eq!(entry.signed_amount(), -15_000);
    }

    #[test]
    fn test_product_low_stock() {
        let product = Product {
            id: "p1".into(),
            sku: "KOPI-SACHET".into(),
            name: "Kopi Sachet".into(),
            unit_price: 2_000,
            stock: 4,
            min_stock: 5,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(product.is_low_stock());
    }
}
