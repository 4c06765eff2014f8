//! # Sale Committer
//!
//! The orchestration unit that turns a cart into a durable transaction
//! and fans out its side effects.
//!
//! ## The Commit Saga
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        commit_sale(cart)                                │
//! │                                                                         │
//! │  1. Validate           empty cart / bad quantity → Validation,          │
//! │                        nothing written                                  │
//! │  2. Number             generated or caller-supplied; an existing        │
//! │                        transaction with this number is returned         │
//! │                        as-is (idempotent re-submit)                     │
//! │  3. Price              pure calculation from the cart lines             │
//! │  4. Stock check        authoritative, against a fresh read;             │
//! │                        shortfall → OutOfStock, nothing written          │
//! │  5. Atomic unit        ONE database transaction:                        │
//! │                          header + lines + guarded decrements            │
//! │                          + sale-out movements                           │
//! │                        ══════ durability boundary ══════                │
//! │  6. Cash entry         best-effort, retried   ┐ failures land in        │
//! │  7. Customer aggregate best-effort, retried   ┘ the reconciliation      │
//! │                                                 queue, NEVER roll       │
//! │                                                 back the sale           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Steps 6-7 write to different tables than the committed sale and are
//! deliberately not atomic with it. A crash between 5 and 7 leaves a
//! correct sale with missing side effects, which is exactly what the
//! reconciliation surface exists to find.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use ts_rs::TS;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{CommitError, CommitResult};
use crate::numbering;
use crate::propagation::{self, RetrySchedule};
use warung_core::{
    stock, validation, Cart, CashCategory, CashDirection, CashEntry, CoreError,
    DailyCashSummary, MovementReason, MovementType, PricingCalculator, Product,
    PropagationFailure, PropagationStep, StockDrift, StockMovement, Transaction,
    TransactionLine, TransactionStatus,
};
use warung_db::repository::transaction::generate_line_id;
use warung_db::{Database, DbError};

// =============================================================================
// Receipt DTO
// =============================================================================

/// What the UI layer gets back from a successful commit.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CommitReceipt {
    pub transaction_id: String,
    pub transaction_number: String,
    pub subtotal: i64,
    pub tax: i64,
    pub discount: i64,
    pub total: i64,
    pub payment_method: warung_core::PaymentMethod,
    pub line_count: usize,
}

impl CommitReceipt {
    fn from_transaction(transaction: &Transaction, line_count: usize) -> Self {
        CommitReceipt {
            transaction_id: transaction.id.clone(),
            transaction_number: transaction.number.clone(),
            subtotal: transaction.subtotal,
            tax: transaction.tax,
            discount: transaction.discount,
            total: transaction.total,
            payment_method: transaction.payment_method,
            line_count,
        }
    }
}

// =============================================================================
// Checkout Engine
// =============================================================================

/// The sale-commit engine: one instance per store, shared by all cashier
/// sessions (it is `Clone` and all state lives in the database).
#[derive(Debug, Clone)]
pub struct CheckoutEngine {
    db: Database,
    config: EngineConfig,
}

impl CheckoutEngine {
    /// Creates an engine over an open database.
    pub fn new(db: Database, config: EngineConfig) -> Self {
        CheckoutEngine { db, config }
    }

    /// The pricing calculator carrying the configured tax rate. Handy for
    /// previewing totals in the cart screen with the exact arithmetic the
    /// commit will use.
    pub fn pricing(&self) -> PricingCalculator {
        PricingCalculator::new(self.config.tax_rate())
    }

    // -------------------------------------------------------------------------
    // Commit
    // -------------------------------------------------------------------------

    /// Commits a sale under a freshly generated transaction number.
    ///
    /// Callers that want to retry a `Persistence` failure should instead
    /// generate a number up front with
    /// [`crate::numbering::generate_transaction_number`] and call
    /// [`CheckoutEngine::commit_sale_as`] with it each time; the number
    /// keeps the retries idempotent.
    pub async fn commit_sale(&self, cart: &Cart) -> CommitResult<CommitReceipt> {
        let number = numbering::generate_transaction_number();
        self.commit_sale_as(cart, &number).await
    }

    /// Commits a sale under a caller-supplied transaction number.
    ///
    /// The number is the idempotency key: if a transaction with it
    /// already exists, that sale is returned unchanged and nothing is
    /// written. Re-submitting a commit can never create a duplicate.
    pub async fn commit_sale_as(&self, cart: &Cart, number: &str) -> CommitResult<CommitReceipt> {
        debug!(number = %number, lines = cart.line_count(), "commit_sale");

        // 1. Reject bad input before touching storage.
        validate_cart(cart)?;

        // 2. Idempotent re-submit: same number, same sale.
        if let Some(existing) = self.db.transactions().find_by_number(number).await? {
            info!(number = %number, "Commit re-submitted, returning existing sale");
            return self.receipt_for(&existing).await;
        }

        // 3. Price the cart.
        let totals = self.pricing().price(&cart.lines, cart.discount.as_ref());

        // 4. Authoritative stock check against a fresh read. The guarded
        //    decrement inside the atomic unit is the final arbiter; this
        //    pass fails fast before anything is staged.
        for line in &cart.lines {
            let product = self
                .db
                .products()
                .get_by_id(&line.product_id)
                .await?
                .ok_or_else(|| {
                    CommitError::Validation(format!("Unknown product in cart: {}", line.product_id))
                })?;
            if !product.is_active {
                return Err(CommitError::Validation(format!(
                    "{} is no longer sold",
                    product.sku
                )));
            }
            stock::authorize(&product, line.quantity)?;
        }

        // 5. The durable write: header + lines + guarded stock
        //    decrements + sale-out movements, all-or-nothing.
        let now = Utc::now();
        let transaction = Transaction {
            id: Uuid::new_v4().to_string(),
            number: number.to_string(),
            customer_id: cart.customer_id.clone(),
            cashier: cart.cashier.clone(),
            subtotal: totals.subtotal,
            tax: totals.tax,
            discount: totals.discount,
            total: totals.total,
            payment_method: cart.payment_method,
            status: TransactionStatus::Completed,
            created_at: now,
        };
        let lines: Vec<TransactionLine> = cart
            .lines
            .iter()
            .map(|l| TransactionLine {
                id: generate_line_id(),
                transaction_id: transaction.id.clone(),
                product_id: l.product_id.clone(),
                name_snapshot: l.name.clone(),
                unit_price: l.unit_price,
                quantity: l.quantity,
                subtotal: l.subtotal(),
                created_at: now,
            })
            .collect();

        match self.db.transactions().commit_atomic(&transaction, &lines).await {
            Ok(_) => {}
            Err(DbError::InsufficientStock {
                product_id,
                requested,
            }) => {
                return Err(self.out_of_stock(product_id, requested).await);
            }
            Err(e) if e.is_unique_violation() => {
                // A concurrent submit with the same number won the race;
                // it IS this sale.
                if let Some(existing) = self.db.transactions().find_by_number(number).await? {
                    info!(number = %number, "Concurrent commit with same number, returning it");
                    return self.receipt_for(&existing).await;
                }
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        }

        info!(
            number = %transaction.number,
            total = %transaction.total,
            lines = lines.len(),
            method = ?transaction.payment_method,
            "Sale committed"
        );

        // 6-7. Post-commit propagation. The sale is final; from here on
        //      nothing can fail the commit.
        self.propagate(&transaction).await;

        Ok(CommitReceipt::from_transaction(&transaction, lines.len()))
    }

    // -------------------------------------------------------------------------
    // Post-commit propagation
    // -------------------------------------------------------------------------

    /// Fans out the committed sale's side effects, best-effort.
    async fn propagate(&self, transaction: &Transaction) {
        if transaction.payment_method.is_cash() {
            self.propagate_cash(transaction).await;
        }

        if let Some(customer_id) = transaction.customer_id.clone() {
            self.propagate_customer(transaction, &customer_id).await;
        }
    }

    /// Exactly one cash-in entry per completed cash sale.
    async fn propagate_cash(&self, transaction: &Transaction) {
        let repo = self.db.cash_ledger();
        let description = format!("penjualan {}", transaction.number);
        let mut schedule = RetrySchedule::new(&self.config.propagation);

        let outcome = loop {
            match repo
                .record_entry(
                    CashDirection::In,
                    CashCategory::Sale,
                    transaction.total,
                    &description,
                    &transaction.cashier,
                    Some(&transaction.id),
                )
                .await
            {
                Ok(entry) => break Ok(entry),
                Err(e) => {
                    if propagation::is_permanent(&e) || !schedule.wait().await {
                        break Err(e);
                    }
                    warn!(number = %transaction.number, error = %e, "Cash propagation failed, retrying");
                }
            }
        };

        match outcome {
            Ok(entry) => {
                debug!(number = %transaction.number, balance = entry.balance, "Cash entry propagated")
            }
            Err(e) => {
                error!(
                    transaction_id = %transaction.id,
                    number = %transaction.number,
                    amount = transaction.total,
                    error = %e,
                    "Cash propagation failed after retries; sale stands, queuing for reconciliation"
                );
                let detail = serde_json::json!({
                    "error": e.to_string(),
                    "amount": transaction.total,
                    "method": transaction.payment_method,
                })
                .to_string();
                self.queue_failure(transaction, PropagationStep::CashLedger, &detail)
                    .await;
            }
        }
    }

    /// +1 transaction, +total lifetime spend, deduplicated by the
    /// transaction number.
    async fn propagate_customer(&self, transaction: &Transaction, customer_id: &str) {
        let repo = self.db.customers();
        let mut schedule = RetrySchedule::new(&self.config.propagation);

        let outcome = loop {
            match repo
                .apply_purchase(customer_id, transaction.total, &transaction.number)
                .await
            {
                Ok(applied) => break Ok(applied),
                Err(e) => {
                    if propagation::is_permanent(&e) || !schedule.wait().await {
                        break Err(e);
                    }
                    warn!(number = %transaction.number, error = %e, "Customer propagation failed, retrying");
                }
            }
        };

        match outcome {
            Ok(true) => {
                debug!(number = %transaction.number, customer_id = %customer_id, "Customer aggregate propagated")
            }
            Ok(false) => {
                debug!(number = %transaction.number, "Customer aggregate already applied, skipped")
            }
            Err(e) => {
                error!(
                    transaction_id = %transaction.id,
                    number = %transaction.number,
                    customer_id = %customer_id,
                    amount = transaction.total,
                    error = %e,
                    "Customer propagation failed after retries; sale stands, queuing for reconciliation"
                );
                let detail = serde_json::json!({
                    "error": e.to_string(),
                    "customer_id": customer_id,
                    "amount": transaction.total,
                })
                .to_string();
                self.queue_failure(transaction, PropagationStep::CustomerAggregate, &detail)
                    .await;
            }
        }
    }

    /// Durably records a propagation failure for the operator. If even
    /// that fails, the `error!` lines above are all that remains.
    async fn queue_failure(&self, transaction: &Transaction, step: PropagationStep, detail: &str) {
        if let Err(e) = self
            .db
            .reconciliation()
            .record_failure(&transaction.id, &transaction.number, step, detail)
            .await
        {
            error!(
                transaction_id = %transaction.id,
                step = ?step,
                error = %e,
                "Could not queue propagation failure"
            );
        }
    }

    // -------------------------------------------------------------------------
    // Stock operations
    // -------------------------------------------------------------------------

    /// Products at or below their alert threshold.
    pub async fn low_stock(&self) -> CommitResult<Vec<Product>> {
        Ok(self.db.stock_ledger().low_stock().await?)
    }

    /// Records a manual stock adjustment (correction, damage, loss).
    /// Positive quantities add stock, negative remove it; the result can
    /// never go below zero.
    pub async fn record_stock_adjustment(
        &self,
        product_id: &str,
        signed_quantity: i64,
        reason: MovementReason,
        actor: &str,
    ) -> CommitResult<StockMovement> {
        validation::validate_actor(actor).map_err(|e| CommitError::Validation(e.to_string()))?;
        if signed_quantity == 0 {
            return Err(CommitError::Validation(
                "adjustment quantity must not be zero".to_string(),
            ));
        }

        match self
            .db
            .stock_ledger()
            .record_movement(
                product_id,
                MovementType::Adjustment,
                signed_quantity,
                reason,
                actor,
                None,
            )
            .await
        {
            Ok(movement) => Ok(movement),
            Err(DbError::InsufficientStock {
                product_id,
                requested,
            }) => Err(self.out_of_stock(product_id, requested).await),
            Err(e) => Err(e.into()),
        }
    }

    /// Records a goods-received restock.
    pub async fn record_restock(
        &self,
        product_id: &str,
        quantity: i64,
        actor: &str,
    ) -> CommitResult<StockMovement> {
        validation::validate_actor(actor).map_err(|e| CommitError::Validation(e.to_string()))?;
        validation::validate_quantity(quantity)
            .map_err(|e| CommitError::Validation(e.to_string()))?;

        Ok(self
            .db
            .stock_ledger()
            .record_movement(
                product_id,
                MovementType::In,
                quantity,
                MovementReason::Restock,
                actor,
                None,
            )
            .await?)
    }

    // -------------------------------------------------------------------------
    // Cash operations
    // -------------------------------------------------------------------------

    /// Records a manual cash entry (expense, deposit, withdrawal).
    /// Sale entries are produced by the commit path only.
    pub async fn record_cash_entry(
        &self,
        direction: CashDirection,
        amount: i64,
        category: CashCategory,
        description: &str,
        actor: &str,
    ) -> CommitResult<CashEntry> {
        validation::validate_amount(amount).map_err(|e| CommitError::Validation(e.to_string()))?;
        validation::validate_description(description)
            .map_err(|e| CommitError::Validation(e.to_string()))?;
        validation::validate_actor(actor).map_err(|e| CommitError::Validation(e.to_string()))?;

        Ok(self
            .db
            .cash_ledger()
            .record_entry(direction, category, amount, description, actor, None)
            .await?)
    }

    /// Records the day's opening float.
    pub async fn open_cash_day(&self, float_amount: i64, actor: &str) -> CommitResult<CashEntry> {
        validation::validate_amount(float_amount)
            .map_err(|e| CommitError::Validation(e.to_string()))?;
        validation::validate_actor(actor).map_err(|e| CommitError::Validation(e.to_string()))?;

        Ok(self.db.cash_ledger().open_day(float_amount, actor).await?)
    }

    /// The day's cash reconciliation totals.
    pub async fn daily_cash_summary(&self, date: NaiveDate) -> CommitResult<DailyCashSummary> {
        Ok(self.db.cash_ledger().daily_summary(date).await?)
    }

    // -------------------------------------------------------------------------
    // Reconciliation surface
    // -------------------------------------------------------------------------

    /// Committed sales whose propagation never landed. Invisible to the
    /// cashier, queryable by the operator.
    pub async fn propagation_failures(&self) -> CommitResult<Vec<PropagationFailure>> {
        Ok(self.db.reconciliation().pending().await?)
    }

    /// Marks a propagation failure as manually worked off.
    pub async fn resolve_propagation_failure(&self, id: &str) -> CommitResult<()> {
        Ok(self.db.reconciliation().resolve(id).await?)
    }

    /// Products whose cached stock disagrees with their movement ledger.
    pub async fn stock_drift(&self) -> CommitResult<Vec<StockDrift>> {
        Ok(self.db.reconciliation().stock_drift().await?)
    }

    /// Re-derives a persisted transaction's totals from its lines and
    /// checks them against what was stored.
    pub async fn verify_transaction(&self, transaction_id: &str) -> CommitResult<()> {
        let transaction = self
            .db
            .transactions()
            .find_by_id(transaction_id)
            .await?
            .ok_or_else(|| {
                CommitError::Validation(format!("Unknown transaction: {transaction_id}"))
            })?;
        let lines = self.db.transactions().lines_for(transaction_id).await?;

        self.pricing()
            .verify(&transaction, &lines)
            .map_err(CommitError::from)
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    /// Rebuilds a receipt for an already-committed sale.
    async fn receipt_for(&self, transaction: &Transaction) -> CommitResult<CommitReceipt> {
        let lines = self.db.transactions().lines_for(&transaction.id).await?;
        Ok(CommitReceipt::from_transaction(transaction, lines.len()))
    }

    /// Enriches a storage-level stock conflict with the product's sku and
    /// live stock for the cashier-facing message.
    async fn out_of_stock(&self, product_id: String, requested: i64) -> CommitError {
        let (product, available) = match self.db.products().get_by_id(&product_id).await {
            Ok(Some(p)) => (p.sku, p.stock),
            _ => (product_id, 0),
        };

        CommitError::OutOfStock {
            product,
            available,
            requested,
        }
    }
}

/// Pre-write validation: the cheap failures, surfaced before any I/O.
fn validate_cart(cart: &Cart) -> CommitResult<()> {
    validation::validate_actor(&cart.cashier)
        .map_err(|e| CommitError::Validation(format!("cashier: {e}")))?;

    if cart.is_empty() {
        return Err(CoreError::EmptyCart.into());
    }

    for line in &cart.lines {
        validation::validate_quantity(line.quantity)
            .map_err(|e| CommitError::Validation(format!("{}: {}", line.sku, e)))?;
    }

    Ok(())
}
