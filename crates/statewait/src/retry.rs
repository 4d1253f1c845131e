//! Retrying single remote calls
//!
//! These helpers retry one operation (typically a create or delete call that
//! races eventual consistency, such as IAM propagation) until it stops
//! failing with a retryable error. They run on top of [`Waiter`], so
//! cancellation, deadlines and backoff behave exactly as for state waits.

use crate::deadline::Deadline;
use crate::error::{Result, SpecError, WaitError};
use crate::finder::NotFound;
use crate::refresh::Refreshed;
use crate::spec::WaitSpec;
use crate::waiter::Waiter;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

const SUCCEEDED: &str = "succeeded";
const FOUND: &str = "found";
const DEFAULT_MIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Timing for retried operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total time budget for the retries
    pub timeout: Duration,
    /// Wait before the first attempt
    pub delay: Duration,
    /// Upper bound of a random extra wait added to `delay`
    pub delay_rand: Option<Duration>,
    /// Fixed interval between attempts; `None` selects exponential backoff
    pub poll_interval: Option<Duration>,
    /// Lower bound for the backoff interval
    pub min_timeout: Duration,
}

impl RetryConfig {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            delay: Duration::ZERO,
            delay_rand: None,
            poll_interval: None,
            min_timeout: DEFAULT_MIN_TIMEOUT,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_delay_rand(mut self, delay_rand: Duration) -> Self {
        self.delay_rand = Some(delay_rand);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Retries that share what is left of `deadline`.
    pub fn until(deadline: &Deadline) -> Self {
        Self::new(deadline.budget())
    }

    pub fn with_min_timeout(mut self, min_timeout: Duration) -> Self {
        self.min_timeout = min_timeout;
        self
    }

    fn initial_delay(&self) -> Duration {
        match self.delay_rand {
            Some(max) if !max.is_zero() => {
                self.delay + rand::thread_rng().gen_range(Duration::ZERO..max)
            }
            _ => self.delay,
        }
    }

    fn wait_spec(
        &self,
        pending: &[&str],
        target: &[&str],
    ) -> std::result::Result<WaitSpec, SpecError> {
        let mut builder = WaitSpec::builder()
            .pending(pending.iter().copied())
            .target(target.iter().copied())
            .timeout(self.timeout)
            .delay(self.initial_delay())
            .min_timeout(self.min_timeout);
        if let Some(interval) = self.poll_interval {
            builder = builder.poll_interval(interval);
        }
        builder.build()
    }
}

/// Error returned by an operation that classifies its own failures.
#[derive(Error, Debug)]
pub enum RetryError<E: std::error::Error + 'static> {
    /// 一時的な失敗。タイムアウトまで再試行する
    #[error(transparent)]
    Retryable(E),
    /// 恒久的な失敗。即座に呼び出し元へ返す
    #[error(transparent)]
    NonRetryable(E),
}

impl<E: std::error::Error + 'static> RetryError<E> {
    pub fn is_retryable(&self) -> bool {
        matches!(self, RetryError::Retryable(_))
    }

    pub fn into_inner(self) -> E {
        match self {
            RetryError::Retryable(err) | RetryError::NonRetryable(err) => err,
        }
    }
}

/// Runs `op` under `waiter` until it returns a value.
async fn until_succeeded<T, E, F, Fut>(
    waiter: Waiter<T, E>,
    cancel: &CancellationToken,
    op: &mut F,
) -> Result<T, E>
where
    E: std::error::Error + 'static,
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    let outcome = waiter
        .wait(cancel, || {
            let attempt = op();
            async move { attempt.await.map(|value| Refreshed::found(value, SUCCEEDED)) }
        })
        .await?;

    match outcome {
        Some(value) => Ok(value),
        // 目標状態を持つ待機は消滅 (None) を返さない
        None => unreachable!("a wait with a target state never reports absence"),
    }
}

/// Calls `op` until it succeeds or fails with an error `is_retryable`
/// rejects.
///
/// When the timeout elapses the operation is attempted one final time. If
/// that attempt fails with a retryable error the result is a timeout carrying
/// the error; a non-retryable failure is returned as
/// [`WaitError::Probe`].
pub async fn retry_when<T, E, F, Fut, P>(
    cancel: &CancellationToken,
    config: &RetryConfig,
    mut op: F,
    is_retryable: P,
) -> Result<T, E>
where
    E: std::error::Error + 'static,
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    P: Fn(&E) -> bool + Send + Sync + 'static,
{
    let spec = config.wait_spec(&[], &[SUCCEEDED])?;
    let is_retryable = Arc::new(is_retryable);
    let predicate = Arc::clone(&is_retryable);
    let waiter = Waiter::new(spec).retry_if(move |err: &E| predicate(err));

    let outcome = until_succeeded(waiter, cancel, &mut op).await;
    match outcome {
        Ok(value) => Ok(value),
        Err(WaitError::Timeout {
            last_state,
            expected,
            elapsed,
            timeout,
            reason,
            ..
        }) => {
            tracing::debug!(elapsed = ?elapsed, "Retry timed out, making a final attempt");
            match op().await {
                Ok(value) => Ok(value),
                Err(err) if is_retryable(&err) => Err(WaitError::Timeout {
                    last_state,
                    expected,
                    elapsed,
                    timeout,
                    last_error: Some(err),
                    reason,
                }),
                Err(err) => Err(WaitError::Probe(err)),
            }
        }
        Err(err) => Err(err),
    }
}

/// Calls `op` until it succeeds, letting `op` decide which failures are
/// worth another attempt.
///
/// [`RetryError::Retryable`] failures are retried until the timeout, which
/// reports the last of them; a [`RetryError::NonRetryable`] failure is
/// returned at once as [`WaitError::Probe`]. Unlike [`retry_when`] there is
/// no extra attempt after the timeout.
pub async fn retry<T, E, F, Fut>(
    cancel: &CancellationToken,
    config: &RetryConfig,
    mut op: F,
) -> Result<T, E>
where
    E: std::error::Error + 'static,
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, RetryError<E>>>,
{
    let spec = config.wait_spec(&[], &[SUCCEEDED])?;
    let waiter = Waiter::new(spec).retry_if(RetryError::<E>::is_retryable);

    until_succeeded(waiter, cancel, &mut op)
        .await
        .map_err(|err| err.map_probe_error(RetryError::into_inner))
}

/// Retries `op` while it fails with a not-found error.
///
/// For reading a resource right after creating it, before the backend has
/// indexed it.
pub async fn retry_when_not_found<T, E, F, Fut>(
    cancel: &CancellationToken,
    config: &RetryConfig,
    op: F,
) -> Result<T, E>
where
    E: std::error::Error + NotFound + 'static,
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    retry_when(cancel, config, op, <E as NotFound>::is_not_found).await
}

/// Like [`retry_when_not_found`] for a resource that was just created;
/// otherwise `op` is called exactly once.
pub async fn retry_when_new_resource_not_found<T, E, F, Fut>(
    cancel: &CancellationToken,
    config: &RetryConfig,
    mut op: F,
    is_new_resource: bool,
) -> Result<T, E>
where
    E: std::error::Error + NotFound + 'static,
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    if is_new_resource {
        return retry_when_not_found(cancel, config, op).await;
    }
    op().await.map_err(WaitError::Probe)
}

/// Calls `op` until it fails with a not-found error.
///
/// A successful call means the resource still exists. Any error other than
/// not-found ends the wait.
pub async fn retry_until_not_found<T, E, F, Fut>(
    cancel: &CancellationToken,
    config: &RetryConfig,
    mut op: F,
) -> Result<(), E>
where
    E: std::error::Error + NotFound + 'static,
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    let spec = config.wait_spec(&[FOUND], &[])?;

    Waiter::new(spec)
        .wait(cancel, || {
            let attempt = op();
            async move {
                match attempt.await {
                    Ok(_) => Ok(Refreshed::found((), FOUND)),
                    Err(err) if err.is_not_found() => Ok(Refreshed::NotFound),
                    Err(err) => Err(err),
                }
            }
        })
        .await
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio_test::{assert_err, assert_ok};

    #[derive(Debug, thiserror::Error)]
    enum ApiError {
        #[error("InvalidParameterValue: Invalid IAM Instance Profile")]
        ProfilePropagating,
        #[error("ResourceNotFound")]
        NotFound,
        #[error("UnauthorizedOperation")]
        Unauthorized,
    }

    impl NotFound for ApiError {
        fn is_not_found(&self) -> bool {
            matches!(self, ApiError::NotFound)
        }
    }

    fn is_propagating(err: &ApiError) -> bool {
        matches!(err, ApiError::ProfilePropagating)
    }

    fn config() -> RetryConfig {
        RetryConfig::new(Duration::from_secs(120)).with_poll_interval(Duration::from_secs(2))
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_when_succeeds_after_retryable_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = retry_when(
            &CancellationToken::new(),
            &config(),
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 3 {
                        Err(ApiError::ProfilePropagating)
                    } else {
                        Ok("i-0123456789")
                    }
                }
            },
            is_propagating,
        )
        .await;

        assert_eq!(assert_ok!(result), "i-0123456789");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_when_stops_on_other_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), ApiError> = retry_when(
            &CancellationToken::new(),
            &config(),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(ApiError::Unauthorized) }
            },
            is_propagating,
        )
        .await;

        let err = assert_err!(result);
        assert!(matches!(err, WaitError::Probe(ApiError::Unauthorized)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_when_final_attempt_after_timeout() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let config = RetryConfig::new(Duration::from_secs(10)).with_poll_interval(Duration::from_secs(4));

        let result: Result<(), ApiError> = retry_when(
            &CancellationToken::new(),
            &config,
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(ApiError::ProfilePropagating) }
            },
            is_propagating,
        )
        .await;

        let err = assert_err!(result);
        assert!(matches!(
            err,
            WaitError::Timeout {
                last_error: Some(ApiError::ProfilePropagating),
                ..
            }
        ));
        // attempts at 0s, 4s, 8s plus the final one
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_when_final_attempt_can_succeed() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let config = RetryConfig::new(Duration::from_secs(10)).with_poll_interval(Duration::from_secs(4));

        let result = retry_when(
            &CancellationToken::new(),
            &config,
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 3 {
                        Err(ApiError::ProfilePropagating)
                    } else {
                        Ok(n)
                    }
                }
            },
            is_propagating,
        )
        .await;

        assert_eq!(assert_ok!(result), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_when_not_found() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = retry_when_not_found(&CancellationToken::new(), &config(), move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(ApiError::NotFound)
                } else {
                    Ok("rtb-42")
                }
            }
        })
        .await;

        assert_eq!(assert_ok!(result), "rtb-42");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_existing_resource_not_found_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), ApiError> = retry_when_new_resource_not_found(
            &CancellationToken::new(),
            &config(),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(ApiError::NotFound) }
            },
            false,
        )
        .await;

        let err = assert_err!(result);
        assert!(matches!(err, WaitError::Probe(ApiError::NotFound)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_until_not_found() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = retry_until_not_found(&CancellationToken::new(), &config(), move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Ok("igw-7")
                } else {
                    Err(ApiError::NotFound)
                }
            }
        })
        .await;

        assert_ok!(result);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_until_not_found_fails_on_other_error() {
        let result = retry_until_not_found(&CancellationToken::new(), &config(), || async {
            Err::<(), _>(ApiError::Unauthorized)
        })
        .await;

        let err = assert_err!(result);
        assert!(matches!(err, WaitError::Probe(ApiError::Unauthorized)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_is_rejected() {
        let result = retry_when(
            &CancellationToken::new(),
            &RetryConfig::new(Duration::ZERO),
            || async { Ok::<_, ApiError>(()) },
            is_propagating,
        )
        .await;

        let err = assert_err!(result);
        assert!(matches!(
            err,
            WaitError::InvalidSpec(crate::error::SpecError::ZeroTimeout)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_classified_by_operation() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = retry(&CancellationToken::new(), &config(), move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(RetryError::Retryable(ApiError::ProfilePropagating))
                } else {
                    Ok("cluster-blue")
                }
            }
        })
        .await;

        assert_eq!(assert_ok!(result), "cluster-blue");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_non_retryable_returns_at_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), ApiError> = retry(&CancellationToken::new(), &config(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(RetryError::NonRetryable(ApiError::Unauthorized)) }
        })
        .await;

        let err = assert_err!(result);
        assert!(matches!(err, WaitError::Probe(ApiError::Unauthorized)));
        assert_eq!(err.to_string(), "refresh failed: UnauthorizedOperation");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_timeout_reports_last_retryable_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let config = RetryConfig::new(Duration::from_secs(10)).with_poll_interval(Duration::from_secs(4));

        let result: Result<(), ApiError> = retry(&CancellationToken::new(), &config, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(RetryError::Retryable(ApiError::ProfilePropagating)) }
        })
        .await;

        let err = assert_err!(result);
        assert!(matches!(
            err,
            WaitError::Timeout {
                last_error: Some(ApiError::ProfilePropagating),
                ..
            }
        ));
        // attempts at 0s, 4s, 8s; no extra attempt after the timeout
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_until_shared_deadline() {
        let deadline = Deadline::new(Duration::from_secs(30));
        tokio::time::sleep(Duration::from_secs(20)).await;

        let config = RetryConfig::until(&deadline).with_poll_interval(Duration::from_secs(4));
        assert_eq!(config.timeout, Duration::from_secs(10));

        let result: Result<(), ApiError> = retry_when(
            &CancellationToken::new(),
            &config,
            || async { Err(ApiError::ProfilePropagating) },
            is_propagating,
        )
        .await;

        let err = assert_err!(result);
        assert!(err.is_timeout());
        assert!(deadline.is_expired());
    }

    #[test]
    fn test_retry_error_accessors() {
        let retryable = RetryError::Retryable(ApiError::NotFound);
        assert!(retryable.is_retryable());
        assert_eq!(retryable.to_string(), "ResourceNotFound");
        assert!(matches!(retryable.into_inner(), ApiError::NotFound));

        let fatal = RetryError::NonRetryable(ApiError::Unauthorized);
        assert!(!fatal.is_retryable());
    }

    #[test]
    fn test_delay_rand_bounds() {
        let config = RetryConfig::new(Duration::from_secs(60))
            .with_delay(Duration::from_secs(5))
            .with_delay_rand(Duration::from_secs(10));

        for _ in 0..100 {
            let delay = config.initial_delay();
            assert!(delay >= Duration::from_secs(5));
            assert!(delay < Duration::from_secs(15));
        }
    }
}
