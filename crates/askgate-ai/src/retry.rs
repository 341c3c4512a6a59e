use crate::ProviderError;
use askgate_core::RetrySettings;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Bounded exponential backoff for provider calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

/// The last error once the policy gave up, with how many calls were made.
#[derive(Error, Debug, Clone)]
#[error("{last} (after {attempts} attempt(s))")]
pub struct RetryError {
    pub attempts: u32,
    pub last: ProviderError,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
        }
    }
}

impl RetryPolicy {
    pub fn no_delay(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (1-based), with up to 20% jitter.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)));
        let capped = exp.min(self.max_delay);
        if capped.is_zero() {
            return capped;
        }
        let jitter = capped.mul_f64(fastrand::f64() * 0.2);
        capped.saturating_sub(jitter)
    }

    /// Run `op` until it succeeds, fails fatally, or attempts run out.
    pub async fn run<T, F, Fut>(&self, op_name: &str, mut op: F) -> Result<T, RetryError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    warn!(
                        "{} failed (attempt {}/{}), retrying: {}",
                        op_name, attempt, self.max_attempts, err
                    );
                    tokio::time::sleep(self.delay_for(attempt)).await;
                    attempt += 1;
                }
                Err(err) => {
                    return Err(RetryError {
                        attempts: attempt,
                        last: err,
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn delays_grow_and_cap() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
        };
        let first = policy.delay_for(1);
        assert!(first <= Duration::from_millis(100) && first >= Duration::from_millis(80));
        let third = policy.delay_for(3);
        assert!(third <= Duration::from_millis(300) && third >= Duration::from_millis(240));
        assert!(policy.delay_for(30) <= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn retries_transient_until_success() {
        let calls = Arc::new(Mutex::new(0u32));
        let result = RetryPolicy::no_delay(3)
            .run("op", |_| {
                let calls = calls.clone();
                async move {
                    let mut n = calls.lock();
                    *n += 1;
                    if *n < 3 {
                        Err(ProviderError::transient("503"))
                    } else {
                        Ok(*n)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn fatal_stops_immediately() {
        let err = RetryPolicy::no_delay(5)
            .run("op", |_| async { Err::<(), _>(ProviderError::fatal("401")) })
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 1);
        assert!(matches!(err.last, ProviderError::Fatal(_)));
    }

    #[tokio::test]
    async fn exhausts_after_max_attempts() {
        let err = RetryPolicy::no_delay(2)
            .run("op", |attempt| async move {
                Err::<(), _>(ProviderError::transient(format!("try {attempt}")))
            })
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 2);
        assert_eq!(err.last, ProviderError::transient("try 2"));
    }
}
