//! # Cash Ledger Repository
//!
//! The daily cash book ("rekap kas"): an append-only ledger with a running
//! balance, folded per day.
//!
//! ## Ordering Is Identity
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  balance[i] = balance[i-1] ± amount[i]                                  │
//! │                                                                         │
//! │  Reordering two entries changes every balance after them, so the        │
//! │  position of an entry is part of what it IS. Each entry persists an     │
//! │  explicit per-day `seq`; readers sort by it, never by timestamps.       │
//! │                                                                         │
//! │  Concurrency: the append computes seq and balance inside a single       │
//! │  INSERT..SELECT statement (one writer at a time in SQLite), and         │
//! │  UNIQUE (day, seq) turns any remaining race into a conflict that is     │
//! │  retried a bounded number of times. Two entries can never both          │
//! │  extend the same previous balance.                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The day's first entry should be the opening float (`open_day`), which
//! seeds `balance[0]`. Without one the day starts from zero.

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::DbResult;
use warung_core::{CashCategory, CashDirection, CashEntry, DailyCashSummary};

/// Bounded retry for an append that lost the (day, seq) race.
const MAX_APPEND_ATTEMPTS: u32 = 3;

const ENTRY_COLUMNS: &str = "id, day, seq, direction, category, description, amount, balance, \
     transaction_id, actor, created_at";

/// Repository for the daily cash ledger.
#[derive(Debug, Clone)]
pub struct CashLedgerRepository {
    pool: SqlitePool,
}

impl CashLedgerRepository {
    /// Creates a new CashLedgerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CashLedgerRepository { pool }
    }

    /// Appends an entry to today's ledger.
    ///
    /// `amount` must be positive (the schema CHECK is the last line of
    /// defense; the engine validates with a typed error first);
    /// `direction` carries the sign. The entry lands at the end of
    /// today's sequence with `balance = previous ± amount`.
    pub async fn record_entry(
        &self,
        direction: CashDirection,
        category: CashCategory,
        amount: i64,
        description: &str,
        actor: &str,
        transaction_id: Option<&str>,
    ) -> DbResult<CashEntry> {
        let day = Utc::now().date_naive();
        let signed = match direction {
            CashDirection::In => amount,
            CashDirection::Out => -amount,
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .try_append(day, direction, category, amount, signed, description, actor, transaction_id)
                .await
            {
                Ok(entry) => {
                    debug!(
                        day = %entry.day,
                        seq = entry.seq,
                        balance = entry.balance,
                        "Cash entry recorded"
                    );
                    return Ok(entry);
                }
                Err(e) if e.is_unique_violation() && attempt < MAX_APPEND_ATTEMPTS => {
                    warn!(attempt, "Cash append lost the sequence race, retrying");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Records the day's opening float as a cash-in entry. Call once,
    /// before the first sale of the day; it seeds the running balance.
    pub async fn open_day(&self, float_amount: i64, actor: &str) -> DbResult<CashEntry> {
        self.record_entry(
            CashDirection::In,
            CashCategory::OpeningFloat,
            float_amount,
            "modal awal kasir",
            actor,
            None,
        )
        .await
    }

    /// All entries for a day, in sequence order.
    pub async fn entries_for_day(&self, date: NaiveDate) -> DbResult<Vec<CashEntry>> {
        let entries = sqlx::query_as::<_, CashEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM cash_entries WHERE day = ?1 ORDER BY seq ASC"
        ))
        .bind(date.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Folds one day's entries into totals, in creation order.
    ///
    /// The fold is deliberate: the closing balance is the last entry's
    /// running balance, which only means anything if the entries replay
    /// in the same order they were written.
    pub async fn daily_summary(&self, date: NaiveDate) -> DbResult<DailyCashSummary> {
        let entries = self.entries_for_day(date).await?;

        let mut total_in = 0i64;
        let mut total_out = 0i64;
        let mut closing_balance = 0i64;
        for entry in &entries {
            match entry.direction {
                CashDirection::In => total_in += entry.amount,
                CashDirection::Out => total_out += entry.amount,
            }
            closing_balance = entry.balance;
        }

        Ok(DailyCashSummary {
            day: date.to_string(),
            total_in,
            total_out,
            net: total_in - total_out,
            closing_balance,
            entry_count: entries.len() as i64,
        })
    }

    /// One append attempt. Seq and balance are computed inside the INSERT
    /// statement itself, so they are assigned under the writer lock.
    #[allow(clippy::too_many_arguments)]
    async fn try_append(
        &self,
        day: NaiveDate,
        direction: CashDirection,
        category: CashCategory,
        amount: i64,
        signed: i64,
        description: &str,
        actor: &str,
        transaction_id: Option<&str>,
    ) -> DbResult<CashEntry> {
        let id = Uuid::new_v4().to_string();
        let day = day.to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO cash_entries (
                id, day, seq, direction, category, description,
                amount, balance, transaction_id, actor, created_at
            )
            SELECT
                ?1, ?2, COALESCE(MAX(seq), 0) + 1, ?3, ?4, ?5,
                ?6,
                COALESCE((SELECT balance FROM cash_entries
                          WHERE day = ?2 ORDER BY seq DESC LIMIT 1), 0) + ?7,
                ?8, ?9, ?10
            FROM cash_entries WHERE day = ?2
            "#,
        )
        .bind(&id)
        .bind(&day)
        .bind(direction)
        .bind(category)
        .bind(description)
        .bind(amount)
        .bind(signed)
        .bind(transaction_id)
        .bind(actor)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let entry = sqlx::query_as::<_, CashEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM cash_entries WHERE id = ?1"
        ))
        .bind(&id)
        .fetch_one(&self.pool)
        .await?;

        Ok(entry)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn ledger() -> (Database, CashLedgerRepository) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.cash_ledger();
        (db, repo)
    }

    #[tokio::test]
    async fn test_running_balance() {
        let (_db, repo) = ledger().await;

        let opening = repo.open_day(100_000, "kasir-1").await.unwrap();
        assert_eq!(opening.seq, 1);
        assert_eq!(opening.balance, 100_000);

        let sale = repo
            .record_entry(
                CashDirection::In,
                CashCategory::Sale,
                22_000,
                "penjualan tunai",
                "kasir-1",
                None,
            )
            .await
            .unwrap();
        assert_eq!(sale.seq, 2);
        assert_eq!(sale.balance, 122_000);

        let expense = repo
            .record_entry(
                CashDirection::Out,
                CashCategory::Expense,
                15_000,
                "beli es batu",
                "kasir-1",
                None,
            )
            .await
            .unwrap();
        assert_eq!(expense.seq, 3);
        assert_eq!(expense.balance, 107_000);
    }

    #[tokio::test]
    async fn test_daily_summary_folds_in_order() {
        let (_db, repo) = ledger().await;

        repo.open_day(50_000, "kasir-1").await.unwrap();
        repo.record_entry(
            CashDirection::In,
            CashCategory::Sale,
            22_000,
            "penjualan",
            "kasir-1",
            None,
        )
        .await
        .unwrap();
        repo.record_entry(
            CashDirection::Out,
            CashCategory::Withdrawal,
            30_000,
            "setor ke pemilik",
            "kasir-1",
            None,
        )
        .await
        .unwrap();

        let summary = repo.daily_summary(Utc::now().date_naive()).await.unwrap();
        assert_eq!(summary.total_in, 72_000);
        assert_eq!(summary.total_out, 30_000);
        assert_eq!(summary.net, 42_000);
        assert_eq!(summary.closing_balance, 42_000);
        assert_eq!(summary.entry_count, 3);
    }

    #[tokio::test]
    async fn test_replay_reproduces_balances() {
        let (_db, repo) = ledger().await;

        repo.open_day(10_000, "kasir-1").await.unwrap();
        for i in 0..5 {
            repo.record_entry(
                CashDirection::In,
                CashCategory::Sale,
                1_000 * (i + 1),
                "penjualan",
                "kasir-1",
                None,
            )
            .await
            .unwrap();
        }

        // Re-fold the persisted entries in seq order; every stored
        // balance must match the recomputed running sum.
        let entries = repo.entries_for_day(Utc::now().date_naive()).await.unwrap();
        let mut running = 0i64;
        for entry in &entries {
            running += entry.signed_amount();
            assert_eq!(entry.balance, running);
        }
        assert_eq!(entries.len(), 6);
    }

    #[tokio::test]
    async fn test_rejects_non_positive_amount() {
        let (_db, repo) = ledger().await;

        assert!(repo
            .record_entry(
                CashDirection::In,
                CashCategory::Sale,
                0,
                "nothing",
                "kasir-1",
                None,
            )
            .await
            .is_err());
        assert!(repo
            .record_entry(
                CashDirection::In,
                CashCategory::Sale,
                -5,
                "negative",
                "kasir-1",
                None,
            )
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_empty_day_summary() {
        let (_db, repo) = ledger().await;

        let summary = repo.daily_summary(Utc::now().date_naive()).await.unwrap();
        assert_eq!(summary.entry_count, 0);
        assert_eq!(summary.closing_balance, 0);
        assert_eq!(summary.net, 0);
    }
}
