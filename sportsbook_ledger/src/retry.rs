//! Bounded retry of units of work that lost a lock race.

use std::future::Future;
use std::time::Duration;

use log::warn;
use rand::Rng;

use crate::config::LedgerConfig;
use crate::errors::LedgerResult;

/// Retries an operation on `ConcurrencyConflict` with exponential backoff and jitter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&LedgerConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &LedgerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.retry_backoff,
        }
    }

    /// Never retry.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Run `attempt` until it succeeds, fails with a non-retryable error, or
    /// the retry budget is spent.
    ///
    /// Every attempt must be a complete unit of work: a failed attempt has
    /// already rolled back, so running it again with the same inputs is safe.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut attempt: F) -> LedgerResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = LedgerResult<T>>,
    {
        let mut retries = 0;
        loop {
            match attempt().await {
                Err(err) if err.is_retryable() && retries < self.max_retries => {
                    retries += 1;
                    let delay = self.delay_for(retries);
                    warn!(
                        "{operation}: {err}; retry {retries}/{} in {delay:?}",
                        self.max_retries
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }

    /// `base * 2^(n-1)` plus up to the same amount of random jitter
    fn delay_for(&self, retry: u32) -> Duration {
        let exponential = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)));
        let ceiling = u64::try_from(exponential.as_micros()).unwrap_or(u64::MAX);
        if ceiling == 0 {
            return exponential;
        }
        let jitter = rand::rng().random_range(0..=ceiling);
        exponential.saturating_add(Duration::from_micros(jitter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::LedgerError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_retries_conflicts_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let result = fast(3)
            .run("op", || {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(LedgerError::ConcurrencyConflict("busy".into()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let result: LedgerResult<()> = fast(2)
            .run("op", || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(LedgerError::ConcurrencyConflict("busy".into()))
                }
            })
            .await;

        assert!(result.unwrap_err().is_retryable());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_business_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let result: LedgerResult<()> = fast(5)
            .run("op", || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(LedgerError::SelfTransfer)
                }
            })
            .await;

        assert!(matches!(result, Err(LedgerError::SelfTransfer)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delay_grows_exponentially() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(10),
        };
        for retry in 1..=4 {
            let floor = Duration::from_millis(10 * 2u64.pow(retry - 1));
            let delay = policy.delay_for(retry);
            assert!(delay >= floor && delay <= floor * 2, "retry {retry}: {delay:?}");
        }
        assert_eq!(RetryPolicy::none().delay_for(1), Duration::ZERO);
    }
}
