//! # Transaction Numbering
//!
//! Generates transaction numbers that are unique under concurrent
//! cashiers without any coordination round-trip.
//!
//! ## Format
//! `TRX-YYMMDD-HHMMSS-RRRRCCCC`
//! - Timestamp second (human-scannable, sorts by time)
//! - `RRRR`: sub-second entropy from the clock's nanoseconds
//! - `CCCC`: a process-local monotonic counter, so two calls in the same
//!   nanosecond bucket still differ
//!
//! The UNIQUE constraint on `transactions.number` is the final backstop:
//! a collision across processes surfaces as a persistence conflict, and
//! the commit path resolves it through the idempotency lookup.
//!
//! The number doubles as the commit's idempotency key: retrying a failed
//! commit with the same number can never create a second transaction.

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generates a fresh transaction number.
pub fn generate_transaction_number() -> String {
    let now = Utc::now();
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    let entropy = nanos % 10_000;
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed) % 10_000;

    format!(
        "TRX-{}-{:04}{:04}",
        now.format("%y%m%d-%H%M%S"),
        entropy,
        counter
    )
}
