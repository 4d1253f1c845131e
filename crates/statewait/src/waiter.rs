//! 状態遷移の待機
//!
//! 長時間かかるリモート操作について、リフレッシュ関数をポーリングし、
//! 観測した状態が目標に達するか、（削除待ちの場合）リソースが消えるか、
//! 待機が失敗するまで待つ。

use crate::backoff::Backoff;
use crate::deadline::instant_after;
use crate::error::{Result, WaitError};
use crate::refresh::Refreshed;
use crate::spec::WaitSpec;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep, sleep_until};
use tokio_util::sync::CancellationToken;

type RetryPredicate<E> = Box<dyn Fn(&E) -> bool + Send + Sync>;
type ReasonExtractor<T> = Box<dyn Fn(&T) -> Option<String> + Send + Sync>;

/// Waits for `spec` to be satisfied, treating every probe error as fatal.
///
/// Returns `Some(object)` once a target state has been observed
/// `continuous_target_occurrence` times in a row, or `None` when a deletion
/// wait sees the resource gone.
///
/// # Example
/// ```ignore
/// let spec = WaitSpec::builder()
///     .pending(["creating"])
///     .target(["available"])
///     .timeout(Duration::from_secs(600))
///     .build()?;
///
/// let volume = wait_for_state(&cancel, &spec, || async {
///     let found = client.describe_volume(&id).await;
///     Refreshed::from_lookup(found, |v| v.state.clone())
/// })
/// .await?;
/// ```
pub async fn wait_for_state<T, E, F, Fut>(
    cancel: &CancellationToken,
    spec: &WaitSpec,
    refresh: F,
) -> Result<Option<T>, E>
where
    E: std::error::Error + 'static,
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<Refreshed<T>, E>>,
{
    Waiter::new(spec.clone()).wait(cancel, refresh).await
}

/// Configurable state-change waiter.
pub struct Waiter<T, E> {
    spec: WaitSpec,
    name: Option<String>,
    is_retryable: RetryPredicate<E>,
    status_reason: Option<ReasonExtractor<T>>,
}

fn never_retry<E>(_: &E) -> bool {
    false
}

/// 1回の待機の進捗
struct Progress<E> {
    polls: u32,
    target_occurrence: u32,
    not_found: u32,
    last_state: String,
    last_error: Option<E>,
    reason: Option<String>,
}

impl<E> Default for Progress<E> {
    fn default() -> Self {
        Self {
            polls: 0,
            target_occurrence: 0,
            not_found: 0,
            last_state: String::new(),
            last_error: None,
            reason: None,
        }
    }
}

impl<T, E: std::error::Error + 'static> Waiter<T, E> {
    pub fn new(spec: WaitSpec) -> Self {
        Self {
            spec,
            name: None,
            is_retryable: Box::new(never_retry::<E>),
            status_reason: None,
        }
    }

    /// ログに出すリソース名
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Marks probe errors matching `predicate` as transient.
    ///
    /// Transient errors are retried until the timeout; the most recent one is
    /// reported on the resulting timeout error.
    pub fn retry_if<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.is_retryable = Box::new(predicate);
        self
    }

    /// Extracts a remote-reported status reason from observed objects.
    ///
    /// The reason from the last observed object is attached to timeout and
    /// unexpected-state failures.
    pub fn status_reason<R>(mut self, reason: R) -> Self
    where
        R: Fn(&T) -> Option<String> + Send + Sync + 'static,
    {
        self.status_reason = Some(Box::new(reason));
        self
    }

    pub fn spec(&self) -> &WaitSpec {
        &self.spec
    }

    /// Polls `refresh` until the wait reaches a terminal outcome.
    ///
    /// Refreshes are strictly sequential. Cancellation and the deadline
    /// interrupt both the sleep between refreshes and an in-flight refresh.
    pub async fn wait<F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut refresh: F,
    ) -> Result<Option<T>, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<Refreshed<T>, E>>,
    {
        let name = self.name.as_deref().unwrap_or("resource");
        let spec = &self.spec;

        if !spec.delay().is_zero() {
            tracing::debug!(resource = %name, delay = ?spec.delay(), "Waiting before first refresh");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(WaitError::Cancelled {
                        elapsed: Duration::ZERO,
                        last_state: String::new(),
                    });
                }
                _ = sleep(spec.delay()) => {}
            }
        }

        let start = Instant::now();
        // Duration::MAX などの巨大なタイムアウトは「期限なし」として扱う
        let deadline = instant_after(start, spec.timeout());
        let mut progress = Progress::default();
        let mut backoff = Backoff::new(spec);

        loop {
            if cancel.is_cancelled() {
                return Err(self.cancelled(name, start, progress));
            }
            if Instant::now() >= deadline {
                return Err(self.timed_out(name, start, progress));
            }

            let refreshed = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancelled(name, start, progress)),
                _ = sleep_until(deadline) => return Err(self.timed_out(name, start, progress)),
                result = refresh() => result,
            };
            progress.polls += 1;

            match refreshed {
                Err(err) if (self.is_retryable)(&err) => {
                    tracing::debug!(
                        resource = %name,
                        poll = progress.polls,
                        error = %err,
                        "Refresh failed with retryable error"
                    );
                    // 状態が観測できなかったので安定化カウントはやり直し
                    progress.target_occurrence = 0;
                    progress.last_error = Some(err);
                }
                Err(err) => return Err(WaitError::Probe(err)),
                Ok(Refreshed::NotFound) => {
                    progress.last_state.clear();

                    if spec.waits_for_absence() {
                        progress.target_occurrence += 1;
                        if progress.target_occurrence >= spec.continuous_target_occurrence() {
                            tracing::debug!(
                                resource = %name,
                                polls = progress.polls,
                                "Resource is gone"
                            );
                            return Ok(None);
                        }
                    } else {
                        progress.not_found += 1;
                        if progress.not_found > spec.not_found_checks() {
                            return Err(WaitError::NotFound {
                                retries: progress.not_found,
                                last_error: progress.last_error,
                            });
                        }
                        tracing::trace!(
                            resource = %name,
                            not_found = progress.not_found,
                            allowed = spec.not_found_checks(),
                            "Resource not found yet"
                        );
                    }
                }
                Ok(Refreshed::Found { object, state }) => {
                    progress.not_found = 0;
                    progress.last_error = None;
                    if let Some(reason_of) = &self.status_reason {
                        progress.reason = reason_of(&object);
                    }

                    tracing::trace!(resource = %name, poll = progress.polls, state = %state, "Refreshed");

                    if spec.is_target(&state) {
                        progress.target_occurrence += 1;
                        if progress.target_occurrence >= spec.continuous_target_occurrence() {
                            tracing::debug!(
                                resource = %name,
                                polls = progress.polls,
                                state = %state,
                                "Target state reached"
                            );
                            return Ok(Some(object));
                        }
                    } else if spec.is_pending(&state) {
                        progress.target_occurrence = 0;
                    } else {
                        return Err(WaitError::UnexpectedState {
                            state,
                            expected: spec.target_list(),
                            pending: spec.pending_list(),
                            reason: progress.reason,
                        });
                    }
                    progress.last_state = state;
                }
            }

            let interval = backoff.next_interval(progress.target_occurrence > 0);
            tracing::trace!(resource = %name, interval = ?interval, "Waiting before next refresh");

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancelled(name, start, progress)),
                _ = sleep_until(deadline) => return Err(self.timed_out(name, start, progress)),
                _ = sleep(interval) => {}
            }
        }
    }

    fn timed_out(&self, name: &str, start: Instant, progress: Progress<E>) -> WaitError<E> {
        let elapsed = start.elapsed();
        tracing::debug!(
            resource = %name,
            polls = progress.polls,
            last_state = %progress.last_state,
            elapsed = ?elapsed,
            "Wait timed out"
        );
        WaitError::Timeout {
            last_state: progress.last_state,
            expected: self.spec.target_list(),
            elapsed,
            timeout: self.spec.timeout(),
            last_error: progress.last_error,
            reason: progress.reason,
        }
    }

    fn cancelled(&self, name: &str, start: Instant, progress: Progress<E>) -> WaitError<E> {
        let elapsed = start.elapsed();
        tracing::debug!(resource = %name, polls = progress.polls, elapsed = ?elapsed, "Wait cancelled");
        WaitError::Cancelled {
            elapsed,
            last_state: progress.last_state,
        }
    }
}
