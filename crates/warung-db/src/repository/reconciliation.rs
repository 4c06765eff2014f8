//! # Reconciliation Repository
//!
//! The operator-facing surface for everything the saga could not make
//! atomic:
//!
//! - **Propagation failures**: committed sales whose cash-ledger entry or
//!   customer-aggregate update kept failing. The receipt printed; these
//!   rows are how the drift gets worked off by hand.
//! - **Stock drift**: products whose cached `stock` disagrees with the
//!   movement ledger. The ledger is the source of truth; a non-empty
//!   result means something wrote the cache outside the guarded paths.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use warung_core::{PropagationFailure, PropagationStep, StockDrift};

const FAILURE_COLUMNS: &str =
    "id, transaction_id, transaction_number, step, detail, resolved, created_at";

/// Repository for the reconciliation surface.
#[derive(Debug, Clone)]
pub struct ReconciliationRepository {
    pool: SqlitePool,
}

impl ReconciliationRepository {
    /// Creates a new ReconciliationRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReconciliationRepository { pool }
    }

    /// Records a propagation failure for a committed sale.
    ///
    /// Called by the committer after its bounded retries ran out. The
    /// failure is also logged at `error!` by the caller; this row is the
    /// durable, queryable copy.
    pub async fn record_failure(
        &self,
        transaction_id: &str,
        transaction_number: &str,
        step: PropagationStep,
        detail: &str,
    ) -> DbResult<PropagationFailure> {
        let failure = PropagationFailure {
            id: Uuid::new_v4().to_string(),
            transaction_id: transaction_id.to_string(),
            transaction_number: transaction_number.to_string(),
            step,
            detail: detail.to_string(),
            resolved: false,
            created_at: Utc::now(),
        };

        warn!(
            transaction_number = %transaction_number,
            step = ?step,
            detail = %detail,
            "Recording propagation failure for reconciliation"
        );

        sqlx::query(
            r#"
            INSERT INTO propagation_failures (
                id, transaction_id, transaction_number, step, detail,
                resolved, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&failure.id)
        .bind(&failure.transaction_id)
        .bind(&failure.transaction_number)
        .bind(failure.step)
        .bind(&failure.detail)
        .bind(failure.resolved)
        .bind(failure.created_at)
        .execute(&self.pool)
        .await?;

        Ok(failure)
    }

    /// All unresolved failures, oldest first.
    pub async fn pending(&self) -> DbResult<Vec<PropagationFailure>> {
        let failures = sqlx::query_as::<_, PropagationFailure>(&format!(
            "SELECT {FAILURE_COLUMNS} FROM propagation_failures \
             WHERE resolved = 0 ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(failures)
    }

    /// Marks a failure as manually resolved.
    pub async fn resolve(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE propagation_failures SET resolved = 1 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("PropagationFailure", id));
        }

        debug!(id = %id, "Propagation failure resolved");
        Ok(())
    }

    /// Diffs every active product's cached stock against its latest
    /// movement's `stock_after`. An empty result means no drift.
    pub async fn stock_drift(&self) -> DbResult<Vec<StockDrift>> {
        let rows = sqlx::query_as::<_, StockDrift>(
            r#"
            SELECT p.id AS product_id,
                   p.sku AS sku,
                   p.stock AS cached_stock,
                   (SELECT m.stock_after FROM stock_movements m
                    WHERE m.product_id = p.id
                    ORDER BY m.created_at DESC, m.rowid DESC LIMIT 1) AS ledger_stock
            FROM products p
            WHERE p.is_active = 1
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter(|d| d.ledger_stock.map_or(false, |l| l != d.cached_stock))
            .collect())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::product::generate_product_id;
    use warung_core::{MovementReason, MovementType, Product};

    #[tokio::test]
    async fn test_failure_lifecycle() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.reconciliation();

        // A failure row needs a committed transaction to reference
        let now = Utc::now();
        let product = Product {
            id: generate_product_id(),
            sku: "ROKOK".into(),
            name: "Rokok Eceran".into(),
            unit_price: 2_000,
            stock: 10,
            min_stock: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.products().insert(&product).await.unwrap();

        let transaction = warung_core::Transaction {
            id: Uuid::new_v4().to_string(),
            number: "TRX-2001".into(),
            customer_id: None,
            cashier: "kasir-1".into(),
            subtotal: 2_000,
            tax: 200,
            discount: 0,
            total: 2_200,
            payment_method: warung_core::PaymentMethod::Cash,
            status: warung_core::TransactionStatus::Completed,
            created_at: now,
        };
        let lines = vec![warung_core::TransactionLine {
            id: Uuid::new_v4().to_string(),
            transaction_id: transaction.id.clone(),
            product_id: product.id.clone(),
            name_snapshot: product.name.clone(),
            unit_price: 2_000,
            quantity: 1,
            subtotal: 2_000,
            created_at: now,
        }];
        db.transactions()
            .commit_atomic(&transaction, &lines)
            .await
            .unwrap();

        let failure = repo
            .record_failure(
                &transaction.id,
                &transaction.number,
                PropagationStep::CashLedger,
                "cash append failed after 3 attempts",
            )
            .await
            .unwrap();

        let pending = repo.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].step, PropagationStep::CashLedger);

        repo.resolve(&failure.id).await.unwrap();
        assert!(repo.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stock_drift_clean_after_guarded_movements() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let now = Utc::now();
        let product = Product {
            id: generate_product_id(),
            sku: "MINYAK".into(),
            name: "Minyak Goreng 1L".into(),
            unit_price: 18_000,
            stock: 30,
            min_stock: 5,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.products().insert(&product).await.unwrap();

        db.stock_ledger()
            .record_movement(
                &product.id,
                MovementType::Out,
                4,
                MovementReason::Sale,
                "kasir-1",
                None,
            )
            .await
            .unwrap();

        // Guarded movements keep cache and ledger in lockstep
        assert!(db.reconciliation().stock_drift().await.unwrap().is_empty());

        // Write the cache behind the ledger's back; the diff must notice
        sqlx::query("UPDATE products SET stock = 99 WHERE id = ?1")
            .bind(&product.id)
            .execute(db.pool())
            .await
            .unwrap();

        let drift = db.reconciliation().stock_drift().await.unwrap();
        assert_eq!(drift.len(), 1);
        assert_eq!(drift[0].cached_stock, 99);
        assert_eq!(drift[0].ledger_stock, Some(26));
    }
}
