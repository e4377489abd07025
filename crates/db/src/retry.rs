//! Fixed-delay retry for transient database failures.
//!
//! One retry after a one-second pause, no backoff curve, no jitter. A
//! managed database that dropped a connection is usually back within a
//! second; anything that stays down longer is the connection manager's
//! problem, not this policy's. The numbers are plain fields so a
//! deployment can widen the budget without a code change.
//!
//! Only errors whose [`DbError::is_transient`] returns true are retried;
//! everything else is rethrown unchanged after the first attempt.

use std::time::Duration;

use crate::error::DbError;

/// Retry behavior for a wrapped operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Fixed pause before each retry.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with explicit limits.
    #[must_use]
    pub const fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Run `f`, retrying transient failures.
    ///
    /// `operation` only labels log lines.
    ///
    /// # Errors
    ///
    /// Returns the last error once retries are exhausted, or the first
    /// non-transient error immediately, unchanged either way.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut f: F) -> Result<T, DbError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DbError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        operation,
                        attempt,
                        max_retries = self.max_retries,
                        %error,
                        delay_ms = self.delay.as_millis() as u64,
                        "transient database error, retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::error::classify_message;

    #[tokio::test(start_paused = true)]
    async fn test_transient_then_success_invokes_twice() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let result = policy
            .run("find", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        // the shape a driver surfaces: an opaque message
                        Err(classify_message("connection timeout"))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_transient_rethrown_after_one_invocation() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let result: Result<(), DbError> = policy
            .run("create", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(classify_message("null value violates not-null constraint")) }
            })
            .await;

        assert!(matches!(result.unwrap_err(), DbError::Query(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_twice_rethrows_second_error() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let result: Result<(), DbError> = policy
            .run("update", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    Err(DbError::Terminated(format!(
                        "connection terminated (attempt {n})"
                    )))
                }
            })
            .await;

        let err = result.unwrap_err();
        assert!(matches!(&err, DbError::Terminated(msg) if msg.contains("attempt 1")));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wider_budget_is_honored() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(50));

        let result = policy
            .run("count", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 3 {
                        Err(DbError::PoolExhausted("no connections".into()))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_none_policy_never_sleeps() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::none();

        let result: Result<(), DbError> = policy
            .run("delete", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(DbError::Connection("refused".into())) }
            })
            .await;

        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
