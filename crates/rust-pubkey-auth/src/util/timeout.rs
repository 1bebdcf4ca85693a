//! Bounded waits.
//!
//! Each wait for a server reply is limited by the configured response
//! timeout, which callers may also switch off.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Timeout, timeout};

/// Extension trait putting a deadline on a future.
pub trait TimeoutExt: Sized {
    /// Fail with `Elapsed` if the future is not done within `duration`.
    fn with_timeout(self, duration: Duration) -> Timeout<Self>;
}

impl<F: Future> TimeoutExt for F {
    fn with_timeout(self, duration: Duration) -> Timeout<Self> {
        timeout(duration, self)
    }
}

/// Await `future`, giving up after `limit` when one is set.
///
/// Returns `None` when the limit elapsed first.
pub async fn bounded<F: Future>(future: F, limit: Option<Duration>) -> Option<F::Output> {
    match limit {
        Some(limit) => future.with_timeout(limit).await.ok(),
        None => Some(future.await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ready_future_beats_deadline() {
        let result = async { 42 }.with_timeout(Duration::from_millis(100)).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn slow_future_hits_deadline() {
        let result = tokio::time::sleep(Duration::from_secs(10))
            .with_timeout(Duration::from_millis(10))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn bounded_without_limit_waits() {
        let value = bounded(async { "done" }, None).await;
        assert_eq!(value, Some("done"));
    }

    #[tokio::test]
    async fn bounded_with_limit_gives_up() {
        let value = bounded(std::future::pending::<()>(), Some(Duration::from_millis(10))).await;
        assert!(value.is_none());
    }
}
