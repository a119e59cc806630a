//! Retry Coordinator (spec §4.D): bounded retries with delay, checked for
//! cancellation before every attempt — never mid-I/O.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::CoreError;

/// Shared cancellation signal for a single task execution. Cheap to clone;
/// every clone observes the same underlying flag.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Run `op` up to `max_retries + 1` times (an initial attempt plus
/// `max_retries` retries), sleeping `retry_delay` between failures.
/// `cancel_token` is checked before every attempt, including the first;
/// a cancelled token short-circuits with `CoreError::Cancelled` and
/// consumes no delay. `max_retries=0` means exactly one attempt, no retry.
pub async fn retry<F, Fut, T, E>(
    mut op: F,
    max_retries: u32,
    retry_delay: Duration,
    cancel_token: &CancelToken,
) -> Result<T, CoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut last_error: Option<String> = None;

    for attempt in 0..=max_retries {
        if cancel_token.is_cancelled() {
            return Err(CoreError::cancelled());
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                last_error = Some(err.to_string());
                if attempt < max_retries {
                    tokio::time::sleep(retry_delay).await;
                }
            }
        }
    }

    Err(CoreError::RetryExhausted(
        last_error.unwrap_or_else(|| "retry exhausted with no captured error".to_string()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[tokio::test]
    async fn succeeds_immediately_without_consuming_retries() {
        let calls = AtomicU32::new(0);
        let token = CancelToken::new();
        let result = retry(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, &str>(42)
            },
            3,
            Duration::from_millis(0),
            &token,
        )
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_until_success_within_budget() {
        let calls = AtomicU32::new(0);
        let token = CancelToken::new();
        let result = retry(
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err("transient")
                } else {
                    Ok(7)
                }
            },
            5,
            Duration::from_millis(0),
            &token,
        )
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_and_propagates_last_error() {
        let token = CancelToken::new();
        let result: Result<i32, CoreError> = retry(
            || async { Err::<i32, _>("always fails") },
            2,
            Duration::from_millis(0),
            &token,
        )
        .await;
        match result {
            Err(CoreError::RetryExhausted(msg)) => assert_eq!(msg, "always fails"),
            other => panic!("expected RetryExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancellation_before_first_attempt_short_circuits() {
        let calls = AtomicU32::new(0);
        let token = CancelToken::new();
        token.cancel();
        let result: Result<i32, CoreError> = retry(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(1)
            },
            3,
            Duration::from_millis(0),
            &token,
        )
        .await;
        assert!(matches!(result, Err(CoreError::Cancelled(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn max_retries_zero_allows_exactly_one_attempt() {
        let calls = AtomicU32::new(0);
        let token = CancelToken::new();
        let result: Result<i32, CoreError> = retry(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>("nope")
            },
            0,
            Duration::from_millis(0),
            &token,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
