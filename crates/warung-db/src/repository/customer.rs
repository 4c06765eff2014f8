//! # Customer Repository
//!
//! Customer reads plus the one write the commit pipeline performs: the
//! denormalized purchase aggregate.
//!
//! ## Retry-Safe Aggregation
//! `apply_purchase` is keyed by transaction number. The purchase log
//! records every number ever applied; `INSERT OR IGNORE` means a retried
//! propagation (or a crashed-and-replayed one) finds its number already
//! present and no-ops instead of double counting. The log insert and the
//! aggregate increment commit together or not at all.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use warung_core::Customer;

const CUSTOMER_COLUMNS: &str =
    "id, name, phone, transaction_count, lifetime_spend, created_at, updated_at";

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Gets a customer by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    /// Inserts a new customer.
    pub async fn insert(&self, customer: &Customer) -> DbResult<()> {
        debug!(id = %customer.id, "Inserting customer");

        sqlx::query(
            r#"
            INSERT INTO customers (
                id, name, phone, transaction_count, lifetime_spend,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(customer.transaction_count)
        .bind(customer.lifetime_spend)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Applies a completed purchase to the customer's aggregate:
    /// `transaction_count += 1`, `lifetime_spend += amount`.
    ///
    /// ## Idempotency
    /// Keyed by `transaction_number`. Returns `Ok(false)` (no-op) when
    /// that number was already applied, `Ok(true)` when the aggregate
    /// was updated.
    ///
    /// ## Errors
    /// * `DbError::NotFound` - the customer does not exist; nothing is
    ///   recorded (the log insert rolls back with it)
    pub async fn apply_purchase(
        &self,
        customer_id: &str,
        amount: i64,
        transaction_number: &str,
    ) -> DbResult<bool> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        // OR IGNORE swallows the duplicate-number conflict but not a
        // foreign key violation, which here just means "no such customer".
        let logged = sqlx::query(
            r#"
            INSERT OR IGNORE INTO customer_purchase_log (
                transaction_number, customer_id, amount, applied_at
            ) VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(transaction_number)
        .bind(customer_id)
        .bind(amount)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::ForeignKeyViolation { .. } => DbError::not_found("Customer", customer_id),
            other => other,
        })?;

        if logged.rows_affected() == 0 {
            // Already applied by an earlier attempt; nothing to do.
            debug!(
                customer_id = %customer_id,
                transaction_number = %transaction_number,
                "Purchase already applied, skipping"
            );
            return Ok(false);
        }

        let updated = sqlx::query(
            r#"
            UPDATE customers SET
                transaction_count = transaction_count + 1,
                lifetime_spend = lifetime_spend + ?2,
                updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(customer_id)
        .bind(amount)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            // Unknown customer: dropping the open transaction rolls the
            // log insert back, so a later retry can succeed.
            return Err(DbError::not_found("Customer", customer_id));
        }

        tx.commit().await?;

        debug!(
            customer_id = %customer_id,
            amount = %amount,
            transaction_number = %transaction_number,
            "Customer aggregate updated"
        );

        Ok(true)
    }
}

/// Helper to generate a new customer ID.
pub fn generate_customer_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn sample_customer() -> Customer {
        let now = Utc::now();
        Customer {
            id: generate_customer_id(),
            name: "Bu Sari".into(),
            phone: Some("0812-0000-0000".into()),
            transaction_count: 3,
            lifetime_spend: 100_000,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_apply_purchase_accumulates() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.customers();

        let customer = sample_customer();
        repo.insert(&customer).await.unwrap();

        let applied = repo
            .apply_purchase(&customer.id, 22_000, "TRX-1001")
            .await
            .unwrap();
        assert!(applied);

        let updated = repo.get_by_id(&customer.id).await.unwrap().unwrap();
        assert_eq!(updated.transaction_count, 4);
        assert_eq!(updated.lifetime_spend, 122_000);
    }

    #[tokio::test]
    async fn test_apply_purchase_dedups_on_retry() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.customers();

        let customer = sample_customer();
        repo.insert(&customer).await.unwrap();

        assert!(repo
            .apply_purchase(&customer.id, 22_000, "TRX-1002")
            .await
            .unwrap());
        // Same number again: no-op, no double counting
        assert!(!repo
            .apply_purchase(&customer.id, 22_000, "TRX-1002")
            .await
            .unwrap());

        let updated = repo.get_by_id(&customer.id).await.unwrap().unwrap();
        assert_eq!(updated.transaction_count, 4);
        assert_eq!(updated.lifetime_spend, 122_000);
    }

    #[tokio::test]
    async fn test_apply_purchase_unknown_customer_rolls_back_log() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.customers();

        let err = repo
            .apply_purchase("no-such-customer", 22_000, "TRX-1003")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));

        // The log row rolled back with it: inserting the customer and
        // retrying the same number must still apply.
        let customer = sample_customer();
        repo.insert(&customer).await.unwrap();
        assert!(repo
            .apply_purchase(&customer.id, 22_000, "TRX-1003")
            .await
            .unwrap());
    }
}
