//! Retry policy for throttled provider calls

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::provider::ProviderResult;

/// Retry policy for provider calls
///
/// Only throttling is retried; every other failure surfaces immediately.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,
    /// Initial backoff duration
    pub initial_backoff: Duration,
    /// Maximum backoff duration
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Calculate backoff duration for the given retry count
    pub fn backoff_duration(&self, retry_count: u32) -> Duration {
        let base = self.initial_backoff.as_millis() as u64;
        let exponential = 2u64.saturating_pow(retry_count);
        let backoff_ms = base
            .saturating_mul(exponential)
            .min(self.max_backoff.as_millis() as u64);
        Duration::from_millis(backoff_ms)
    }

    /// Run `call`, retrying throttled failures with exponential backoff
    pub async fn run<T, F, Fut>(&self, mut call: F) -> ProviderResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        let mut retries = 0;
        loop {
            match call().await {
                Err(e) if e.is_retryable() && retries < self.max_retries => {
                    let backoff = self.backoff_duration(retries);
                    warn!(
                        "{} throttled, retry {}/{} in {:?}",
                        e.operation,
                        retries + 1,
                        self.max_retries,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    retries += 1;
                }
                result => return result,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{Operation, ProviderError, ProviderErrorKind};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        }
    }

    #[test]
    fn test_backoff_duration() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_duration(0), Duration::from_millis(100));
        assert_eq!(policy.backoff_duration(1), Duration::from_millis(200));
        assert_eq!(policy.backoff_duration(3), Duration::from_millis(800));
        assert_eq!(policy.backoff_duration(10), Duration::from_secs(10));
        assert_eq!(policy.backoff_duration(200), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_retries_throttling_then_succeeds() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = fast()
            .run(move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ProviderError::new(Operation::CreateVpc, ProviderErrorKind::Throttled, "slow down"))
                } else {
                    Ok("vpc-1")
                }
            })
            .await;
        assert_eq!(result, Ok("vpc-1"));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: ProviderResult<()> = fast()
            .run(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::new(Operation::CreateTags, ProviderErrorKind::Throttled, "slow down"))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_does_not_retry_other_failures() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: ProviderResult<()> = fast()
            .run(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::new(Operation::DeleteVpc, ProviderErrorKind::DependencyViolation, "in use"))
            })
            .await;
        assert_eq!(result.unwrap_err().kind, ProviderErrorKind::DependencyViolation);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
