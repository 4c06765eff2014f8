//! # Transaction Repository
//!
//! Database operations for sale transactions and their lines, including
//! the atomic commit unit the sale committer builds on.
//!
//! ## The Atomic Commit Unit
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 commit_atomic: one SQLite transaction                   │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    INSERT transaction header              ← leads with a write, so      │
//! │    INSERT transaction lines                 concurrent commits          │
//! │    for each line:                           serialize here              │
//! │      UPDATE products SET stock = stock - qty                            │
//! │        WHERE id = ? AND stock >= qty      ← guarded decrement           │
//! │      (zero rows → ROLLBACK, typed error, nothing visible)               │
//! │      INSERT sale-out stock movement                                     │
//! │  COMMIT                                   ← the durability boundary     │
//! │                                                                         │
//! │  After COMMIT the sale is final for reporting. Cash ledger and          │
//! │  customer aggregate run AFTER this, best-effort (see warung-checkout).  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use crate::repository::stock_ledger::apply_movement;
use warung_core::{
    MovementReason, MovementType, StockMovement, Transaction, TransactionLine,
};

const TRANSACTION_COLUMNS: &str = "id, number, customer_id, cashier, subtotal, tax, discount, \
     total, payment_method, status, created_at";

const LINE_COLUMNS: &str =
    "id, transaction_id, product_id, name_snapshot, unit_price, quantity, subtotal, created_at";

/// Repository for sale transaction database operations.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
}

impl TransactionRepository {
    /// Creates a new TransactionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TransactionRepository { pool }
    }

    /// Commits a sale as one all-or-nothing unit: guarded stock
    /// decrements, header, lines, and the sale-out movements.
    ///
    /// ## Errors
    /// * `DbError::InsufficientStock` - a line lost the race for the last
    ///   units; the whole unit rolled back
    /// * `DbError::UniqueViolation` - transaction number already exists
    ///   (idempotent re-submit; the caller resolves it to the existing row)
    ///
    /// ## Returns
    /// The sale-out movements that were appended, for logging.
    pub async fn commit_atomic(
        &self,
        transaction: &Transaction,
        lines: &[TransactionLine],
    ) -> DbResult<Vec<StockMovement>> {
        debug!(
            id = %transaction.id,
            number = %transaction.number,
            lines = lines.len(),
            "Committing sale"
        );

        let mut tx = self.pool.begin().await?;

        // Header first: the movements reference it, and a duplicate
        // number (idempotent re-submit) fails here before anything else
        // is staged.
        insert_header(&mut tx, transaction).await?;
        for line in lines {
            insert_line(&mut tx, line).await?;
        }

        let mut movements = Vec::with_capacity(lines.len());
        for line in lines {
            let movement = apply_movement(
                &mut tx,
                &line.product_id,
                MovementType::Out,
                -line.quantity,
                MovementReason::Sale,
                &transaction.cashier,
                Some(&transaction.id),
            )
            .await?;
            movements.push(movement);
        }

        tx.commit().await?;

        Ok(movements)
    }

    /// Gets a transaction by ID.
    pub async fn find_by_id(&self, id: &str) -> DbResult<Option<Transaction>> {
        let transaction = sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(transaction)
    }

    /// Gets a transaction by its business number (the idempotency key).
    pub async fn find_by_number(&self, number: &str) -> DbResult<Option<Transaction>> {
        let transaction = sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE number = ?1"
        ))
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(transaction)
    }

    /// Gets all lines for a transaction, in creation order.
    pub async fn lines_for(&self, transaction_id: &str) -> DbResult<Vec<TransactionLine>> {
        let lines = sqlx::query_as::<_, TransactionLine>(&format!(
            "SELECT {LINE_COLUMNS} FROM transaction_lines \
             WHERE transaction_id = ?1 ORDER BY created_at ASC, rowid ASC"
        ))
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    /// Counts transactions (for diagnostics and tests).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Inserts the transaction header inside an open transaction.
async fn insert_header(conn: &mut SqliteConnection, transaction: &Transaction) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO transactions (
            id, number, customer_id, cashier, subtotal, tax,
            discount, total, payment_method, status, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(&transaction.id)
    .bind(&transaction.number)
    .bind(&transaction.customer_id)
    .bind(&transaction.cashier)
    .bind(transaction.subtotal)
    .bind(transaction.tax)
    .bind(transaction.discount)
    .bind(transaction.total)
    .bind(transaction.payment_method)
    .bind(transaction.status)
    .bind(transaction.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Inserts one transaction line inside an open transaction.
async fn insert_line(conn: &mut SqliteConnection, line: &TransactionLine) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO transaction_lines (
            id, transaction_id, product_id, name_snapshot,
            unit_price, quantity, subtotal, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&line.id)
    .bind(&line.transaction_id)
    .bind(&line.product_id)
    .bind(&line.name_snapshot)
    .bind(line.unit_price)
    .bind(line.quantity)
    .bind(line.subtotal)
    .bind(line.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Generates a new transaction line ID.
pub fn generate_line_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================
