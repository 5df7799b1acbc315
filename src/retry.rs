//! Bounded fixed-delay retry for backend operations

use crate::errors::{Result, RetryError};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

/// How many times an operation is attempted and how long to wait between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Fixed pause between a failed attempt and the next one
    pub delay_ms: u64,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    pub const DEFAULT_DELAY_MS: u64 = 1000;

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            delay_ms: Self::DEFAULT_DELAY_MS,
        }
    }
}

/// Bookkeeping for one logical operation; lives only as long as its retry sequence
#[derive(Debug)]
pub struct RetryContext {
    pub operation: &'static str,
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryContext {
    fn new(operation: &'static str, policy: RetryPolicy) -> Self {
        Self {
            operation,
            attempt_count: 0,
            max_attempts: policy.max_attempts.max(1),
            delay: policy.delay(),
        }
    }

    fn exhausted(&self) -> bool {
        self.attempt_count >= self.max_attempts
    }
}

/// Runs fallible async operations with bounded, fixed-delay retries.
///
/// Clones share one cancellation token: cancelling it stops every pending
/// retry delay. An attempt already in flight is allowed to finish, but its
/// result is discarded.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop all retry sequences driven by this executor and its clones
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run `op` until it succeeds, the attempt cap is reached, or the executor is cancelled.
    ///
    /// Attempts are strictly sequential: the next one is only created after the
    /// previous future has resolved and been dropped.
    pub async fn run_with_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        mut op: F,
    ) -> std::result::Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut ctx = RetryContext::new(operation, self.policy);

        loop {
            if self.is_cancelled() {
                return Err(RetryError::Cancelled);
            }

            ctx.attempt_count += 1;
            let outcome = op().await;

            if self.is_cancelled() {
                debug!("Discarding result of {} after cancellation", ctx.operation);
                return Err(RetryError::Cancelled);
            }

            match outcome {
                Ok(value) => {
                    if ctx.attempt_count > 1 {
                        debug!(
                            "{} succeeded on attempt {}/{}",
                            ctx.operation, ctx.attempt_count, ctx.max_attempts
                        );
                    }
                    return Ok(value);
                }
                Err(e) if ctx.exhausted() => {
                    return Err(RetryError::Exhausted {
                        operation: ctx.operation,
                        attempts: ctx.attempt_count,
                        source: e,
                    });
                }
                Err(e) => {
                    warn!(
                        "{} failed (attempt {}/{}), retrying in {:?}: {}",
                        ctx.operation, ctx.attempt_count, ctx.max_attempts, ctx.delay, e
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => return Err(RetryError::Cancelled),
                        _ = sleep(ctx.delay) => {}
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PerfSwitchError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn flaky(failures: u32, calls: Arc<AtomicU32>) -> impl FnMut() -> std::future::Ready<Result<u32>> {
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            std::future::ready(if n <= failures {
                Err(PerfSwitchError::Transport(format!("attempt {} failed", n)))
            } else {
                Ok(n)
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_failures_below_cap() {
        let executor = RetryExecutor::new(RetryPolicy::default());
        for failures in 0..RetryPolicy::DEFAULT_MAX_ATTEMPTS {
            let calls = Arc::new(AtomicU32::new(0));
            let start = Instant::now();
            let result = executor
                .run_with_retry("flaky op", flaky(failures, calls.clone()))
                .await;

            assert_eq!(result.unwrap(), failures + 1);
            assert_eq!(calls.load(Ordering::SeqCst), failures + 1);
            // One fixed delay per failure, no backoff growth
            let expected = Duration::from_millis(1000) * failures;
            assert!(start.elapsed() >= expected);
            assert!(start.elapsed() < expected + Duration::from_millis(100));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_after_max_attempts() {
        let executor = RetryExecutor::new(RetryPolicy::default());
        let calls = Arc::new(AtomicU32::new(0));
        let result = executor
            .run_with_retry("always failing", flaky(u32::MAX, calls.clone()))
            .await;

        match result {
            Err(RetryError::Exhausted { attempts, operation, .. }) => {
                assert_eq!(attempts, 3);
                assert_eq!(operation, "always failing");
            }
            other => panic!("expected exhaustion, got {:?}", other.map(|_| ())),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_delay_stops_retries() {
        let executor = RetryExecutor::new(RetryPolicy::default());
        let calls = Arc::new(AtomicU32::new(0));

        let task = {
            let executor = executor.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                executor
                    .run_with_retry("cancelled op", flaky(u32::MAX, calls))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(500)).await;
        executor.cancel();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(RetryError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_executor_runs_nothing() {
        let executor = RetryExecutor::new(RetryPolicy::default());
        executor.cancel();
        let calls = Arc::new(AtomicU32::new(0));
        let result = executor
            .run_with_retry("never runs", flaky(0, calls.clone()))
            .await;
        assert!(matches!(result, Err(RetryError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
