//! # Propagation Retry
//!
//! Bounded exponential backoff for the post-commit writes.
//!
//! Once the sale is durable, the cash-ledger entry and the customer
//! aggregate are best-effort: each gets a handful of attempts with
//! growing pauses, and a step that still fails is handed to the
//! reconciliation queue rather than blocking the lane or rolling back
//! the sale.

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use std::time::Duration;

use crate::config::PropagationConfig;
use warung_db::DbError;

/// Tracks the remaining attempts and the pause between them for one
/// propagation step.
pub(crate) struct RetrySchedule {
    backoff: ExponentialBackoff,
    retries_left: u32,
}

impl RetrySchedule {
    /// A fresh schedule: `max_attempts` total tries, so
    /// `max_attempts - 1` retries after the first failure.
    pub(crate) fn new(config: &PropagationConfig) -> Self {
        RetrySchedule {
            backoff: ExponentialBackoff {
                initial_interval: Duration::from_millis(config.initial_backoff_ms),
                max_interval: Duration::from_secs(config.max_backoff_secs),
                max_elapsed_time: None,
                ..ExponentialBackoff::default()
            },
            retries_left: config.max_attempts.saturating_sub(1),
        }
    }

    /// Consumes one retry, sleeping the next backoff interval.
    /// Returns `false` when the attempts are exhausted.
    pub(crate) async fn wait(&mut self) -> bool {
        if self.retries_left == 0 {
            return false;
        }
        self.retries_left -= 1;

        if let Some(delay) = self.backoff.next_backoff() {
            tokio::time::sleep(delay).await;
        }
        true
    }
}

/// Whether retrying this error could possibly help. A missing customer
/// stays missing no matter how long we wait.
pub(crate) fn is_permanent(err: &DbError) -> bool {
    matches!(err, DbError::NotFound { .. })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schedule_exhausts_after_configured_attempts() {
        let config = PropagationConfig {
            max_attempts: 3,
            initial_backoff_ms: 1,
            max_backoff_secs: 1,
        };
        let mut schedule = RetrySchedule::new(&config);

        assert!(schedule.wait().await);
        assert!(schedule.wait().await);
        assert!(!schedule.wait().await);
    }

    #[tokio::test]
    async fn test_single_attempt_means_no_retry() {
        let config = PropagationConfig {
            max_attempts: 1,
            initial_backoff_ms: 1,
            max_backoff_secs: 1,
        };
        let mut schedule = RetrySchedule::new(&config);

        assert!(!schedule.wait().await);
    }

    #[test]
    fn test_not_found_is_permanent() {
        assert!(is_permanent(&DbError::not_found("Customer", "x")));
        assert!(!is_permanent(&DbError::PoolExhausted));
    }
}
