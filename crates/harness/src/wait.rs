//! Retry-until-timeout sampling for cluster conditions.
//!
//! Waits are synchronous from the caller's point of view: a condition is
//! sampled on a fixed interval until it produces a value or the timeout
//! elapses. There is no cancellation other than the timeout itself.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::error;

use common::error::TestError;

/// A polled condition did not produce a value within its timeout.
#[derive(Debug, Error)]
#[error("Timed out after {timeout:?} waiting for {what}")]
pub struct WaitTimeout {
    pub what: String,
    pub timeout: Duration,
}

impl From<WaitTimeout> for TestError {
    fn from(err: WaitTimeout) -> Self {
        TestError::Timeout(err.to_string())
    }
}

/// Sample `condition` every `interval` until it returns `Some(value)` or
/// `timeout` elapses. The timeout failure is logged before it is returned.
pub async fn wait_for<F, Fut, T>(
    what: &str,
    interval: Duration,
    timeout: Duration,
    mut condition: F,
) -> Result<T, WaitTimeout>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + timeout;

    loop {
        if let Some(value) = condition().await {
            return Ok(value);
        }

        if Instant::now() + interval > deadline {
            let failure = WaitTimeout {
                what: what.to_string(),
                timeout,
            };
            error!("{failure}");
            return Err(failure);
        }

        sleep(interval).await;
    }
}

/// Boolean convenience wrapper over [`wait_for`].
pub async fn wait_for_condition<F, Fut>(
    what: &str,
    interval: Duration,
    timeout: Duration,
    mut condition: F,
) -> Result<(), WaitTimeout>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    wait_for(what, interval, timeout, || {
        let sampled = condition();
        async move { sampled.await.then_some(()) }
    })
    .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_wait_for_succeeds_immediately() {
        let result = wait_for(
            "value",
            Duration::from_millis(10),
            Duration::from_millis(100),
            || async { Some(42) },
        )
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_wait_for_succeeds_after_retries() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();

        let result = wait_for(
            "third attempt",
            Duration::from_millis(5),
            Duration::from_secs(1),
            move || {
                let attempts = attempts_clone.clone();
                async move {
                    let count = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    (count >= 3).then_some(count)
                }
            },
        )
        .await;
        assert_eq!(result.unwrap(), 3);
        assert!(attempts.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn test_wait_for_times_out() {
        let err = wait_for_condition(
            "a condition that never holds",
            Duration::from_millis(5),
            Duration::from_millis(25),
            || async { false },
        )
        .await
        .expect_err("should time out");
        assert!(err.to_string().contains("a condition that never holds"));
    }

    #[tokio::test]
    async fn test_wait_timeout_converts_to_test_error() {
        let err = wait_for_condition(
            "pod ready",
            Duration::from_millis(5),
            Duration::from_millis(10),
            || async { false },
        )
        .await
        .expect_err("should time out");
        assert!(matches!(TestError::from(err), TestError::Timeout(_)));
    }
}
