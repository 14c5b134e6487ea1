//! Fixed-delay retries around a unit of indexing work.

use crate::{IndexerError, Metrics};
use backon::{ConstantBuilder, Retryable};
use std::{future::Future, time::Duration};
use tracing::warn;

/// Retries transient failures after a fixed delay.
///
/// Fatal errors are returned on the first attempt. When `max_retries` is exhausted the last
/// transient error is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// The delay between two attempts.
    pub delay: Duration,
    /// The maximum number of retries after the first attempt. `None` retries forever.
    pub max_retries: Option<usize>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { delay: Duration::from_secs(1), max_retries: None }
    }
}

impl RetryPolicy {
    /// Creates a new [`RetryPolicy`].
    pub const fn new(delay: Duration, max_retries: Option<usize>) -> Self {
        Self { delay, max_retries }
    }

    /// Runs `op` until it succeeds, fails with a fatal error, or runs out of retries.
    ///
    /// `operation` names the unit of work in logs.
    pub async fn retry<T, F, Fut>(&self, operation: &str, op: F) -> Result<T, IndexerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, IndexerError>>,
    {
        let backoff = ConstantBuilder::default()
            .with_delay(self.delay)
            .with_max_times(self.max_retries.unwrap_or(usize::MAX));

        op.retry(backoff)
            .sleep(tokio::time::sleep)
            .when(IndexerError::is_transient)
            .notify(|err: &IndexerError, delay: Duration| {
                metrics::counter!(Metrics::RETRIES_TOTAL).increment(1);
                warn!(
                    target: "retry",
                    operation,
                    %err,
                    delay_ms = delay.as_millis() as u64,
                    "Transient failure, retrying"
                );
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChainClientError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn failing(
        attempts: &AtomicUsize,
        failures: usize,
        err: fn() -> IndexerError,
    ) -> Result<usize, IndexerError> {
        let attempt = attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < failures { Err(err()) } else { Ok(attempt) }
    }

    fn transport() -> IndexerError {
        ChainClientError::Transport("connection reset".into()).into()
    }

    fn malformed() -> IndexerError {
        ChainClientError::Malformed("bad block".into()).into()
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_are_retried() {
        let attempts = AtomicUsize::new(0);
        let policy = RetryPolicy::default();

        let result = policy.retry("test", || failing(&attempts, 3, transport)).await.unwrap();

        assert_eq!(result, 3);
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_errors_are_not_retried() {
        let attempts = AtomicUsize::new(0);
        let policy = RetryPolicy::default();

        let err = policy.retry("test", || failing(&attempts, 3, malformed)).await.unwrap_err();

        assert!(matches!(err, IndexerError::Chain(ChainClientError::Malformed(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_policy_gives_up() {
        let attempts = AtomicUsize::new(0);
        let policy = RetryPolicy::new(Duration::from_millis(10), Some(2));

        let err = policy.retry("test", || failing(&attempts, 10, transport)).await.unwrap_err();

        assert!(err.is_transient());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
