//! Bounded exponential backoff around a reconcile pass

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use super::error::{ReconcileError, ReconcileResult};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay: Duration::from_secs(30),
        }
    }

    /// Delay before retry number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Runs `op`, retrying transient failures until the attempts run out.
    /// Non-transient errors are returned right away.
    pub async fn run<F, Fut, T>(&self, what: &str, mut op: F) -> ReconcileResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ReconcileError>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        what, attempt, self.max_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(200))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_core::domain::{Kind, ObjectKey};
    use gantry_store::StoreError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn conflict() -> ReconcileError {
        ReconcileError::Store(StoreError::Conflict {
            kind: Kind::Stage,
            key: ObjectKey::new("default", "s"),
            expected: 1,
            actual: 2,
        })
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1));
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result = policy
            .run("test", move || async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(conflict())
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result: ReconcileResult<()> = policy
            .run("test", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(conflict())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_config_errors_are_not_retried() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1));
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result: ReconcileResult<()> = policy
            .run("test", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ReconcileError::InvalidConfig("bad".to_string()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
