//! # Stock Ledger Repository
//!
//! The append-only record of stock movements and the guarded updates that
//! keep the `products.stock` cache in sync with it.
//!
//! ## The Guarded Update
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │            Why the update is conditional                                │
//! │                                                                         │
//! │  ❌ WRONG: read stock, compute, write back                              │
//! │     Two cashiers read stock=1, both write 0. One unit sold twice.       │
//! │                                                                         │
//! │  ✅ CORRECT: single conditional statement                               │
//! │     UPDATE products SET stock = stock - ?                               │
//! │     WHERE id = ? AND stock >= ?                                         │
//! │     RETURNING stock                                                     │
//! │                                                                         │
//! │  SQLite serializes writers, so exactly one statement matches the        │
//! │  last unit. The loser matches zero rows and gets a typed error          │
//! │  instead of negative stock.                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every movement stores the stock level before and after, so the ledger
//! can always be checked against the cache (`stock_drift` in the
//! reconciliation repository).

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use warung_core::{MovementReason, MovementType, Product, StockMovement};

const MOVEMENT_COLUMNS: &str = "id, product_id, movement_type, quantity, stock_before, \
     stock_after, reason, transaction_id, actor, created_at";

/// Repository for the stock movement ledger.
#[derive(Debug, Clone)]
pub struct StockLedgerRepository {
    pool: SqlitePool,
}

impl StockLedgerRepository {
    /// Creates a new StockLedgerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StockLedgerRepository { pool }
    }

    /// Appends a stock movement and updates the cached stock, atomically.
    ///
    /// ## Arguments
    /// * `quantity` - non-negative magnitude for `In`/`Out`; signed for
    ///   `Adjustment`
    ///
    /// ## Errors
    /// * `DbError::InsufficientStock` - the movement would push stock
    ///   below zero
    /// * `DbError::NotFound` - unknown product
    pub async fn record_movement(
        &self,
        product_id: &str,
        movement_type: MovementType,
        quantity: i64,
        reason: MovementReason,
        actor: &str,
        transaction_id: Option<&str>,
    ) -> DbResult<StockMovement> {
        let delta = match movement_type {
            MovementType::In => quantity.abs(),
            MovementType::Out => -quantity.abs(),
            MovementType::Adjustment => quantity,
        };

        let mut tx = self.pool.begin().await?;
        let movement = apply_movement(
            &mut tx,
            product_id,
            movement_type,
            delta,
            reason,
            actor,
            transaction_id,
        )
        .await?;
        tx.commit().await?;

        debug!(
            product_id = %product_id,
            delta = %delta,
            stock_after = %movement.stock_after,
            "Stock movement recorded"
        );

        Ok(movement)
    }

    /// Reads the cached stock level for a product.
    ///
    /// The cache must equal the latest movement's `stock_after`; the
    /// reconciliation repository has the query that proves it.
    pub async fn current_stock(&self, product_id: &str) -> DbResult<i64> {
        let stock: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = ?1")
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?;

        stock.ok_or_else(|| DbError::not_found("Product", product_id))
    }

    /// All products at or below their alert threshold.
    ///
    /// Pure notification signal; nothing is written.
    pub async fn low_stock(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, sku, name, unit_price, stock, min_stock, is_active,
                   created_at, updated_at
            FROM products
            WHERE is_active = 1 AND stock <= min_stock
            ORDER BY stock ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// The most recent movement for a product, if any.
    pub async fn latest_movement(&self, product_id: &str) -> DbResult<Option<StockMovement>> {
        let movement = sqlx::query_as::<_, StockMovement>(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
             WHERE product_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT 1"
        ))
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(movement)
    }

    /// The movement trail for a product, oldest first.
    pub async fn movements_for(&self, product_id: &str, limit: u32) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
             WHERE product_id = ?1 ORDER BY created_at ASC, rowid ASC LIMIT ?2"
        ))
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Sum of all signed movement quantities for a product.
    ///
    /// `initial stock + this sum` must equal the cached stock at all
    /// times; the tests lean on it.
    pub async fn sum_signed(&self, product_id: &str) -> DbResult<i64> {
        let sum: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT SUM(CASE movement_type
                       WHEN 'out' THEN -quantity
                       ELSE quantity
                       END)
            FROM stock_movements
            WHERE product_id = ?1
            "#,
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(sum.unwrap_or(0))
    }
}

/// Applies one movement inside an open transaction: guarded stock update
/// plus ledger append. Shared with the sale committer's atomic unit.
///
/// `delta` is already signed (direction folded in by the caller).
pub(crate) async fn apply_movement(
    conn: &mut SqliteConnection,
    product_id: &str,
    movement_type: MovementType,
    delta: i64,
    reason: MovementReason,
    actor: &str,
    transaction_id: Option<&str>,
) -> DbResult<StockMovement> {
    let now = Utc::now();

    // Conditional update first: the WHERE clause is the storage-level
    // guard, and leading with a write keeps concurrent transactions from
    // racing on a stale read snapshot.
    let stock_after: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE products
        SET stock = stock + ?2, updated_at = ?3
        WHERE id = ?1 AND stock + ?2 >= 0
        RETURNING stock
        "#,
    )
    .bind(product_id)
    .bind(delta)
    .bind(now)
    .fetch_optional(&mut *conn)
    .await?;

    let stock_after = match stock_after {
        Some(after) => after,
        None => {
            // Zero rows matched: either the product is unknown or the
            // guard refused to go negative.
            let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM products WHERE id = ?1")
                .bind(product_id)
                .fetch_optional(&mut *conn)
                .await?;
            return Err(match exists {
                Some(_) => DbError::InsufficientStock {
                    product_id: product_id.to_string(),
                    requested: delta.abs(),
                },
                None => DbError::not_found("Product", product_id),
            });
        }
    };

    let movement = StockMovement {
        id: Uuid::new_v4().to_string(),
        product_id: product_id.to_string(),
        movement_type,
        // Magnitude for in/out, signed for adjustments
        quantity: match movement_type {
            MovementType::Adjustment => delta,
            _ => delta.abs(),
        },
        stock_before: stock_after - delta,
        stock_after,
        reason,
        transaction_id: transaction_id.map(str::to_string),
        actor: actor.to_string(),
        created_at: now,
    };

    insert_movement(conn, &movement).await?;

    Ok(movement)
}

/// Inserts a prepared movement row.
pub(crate) async fn insert_movement(
    conn: &mut SqliteConnection,
    movement: &StockMovement,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO stock_movements (
            id, product_id, movement_type, quantity, stock_before,
            stock_after, reason, transaction_id, actor, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&movement.id)
    .bind(&movement.product_id)
    .bind(movement.movement_type)
    .bind(movement.quantity)
    .bind(movement.stock_before)
    .bind(movement.stock_after)
    .bind(movement.reason)
    .bind(&movement.transaction_id)
    .bind(&movement.actor)
    .bind(movement.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
