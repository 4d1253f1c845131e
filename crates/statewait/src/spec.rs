//! Wait parameters
//!
//! A [`WaitSpec`] describes one wait: which state labels mean "still in
//! progress", which mean "done", and how long and how often to poll.

use crate::deadline::Deadline;
use crate::error::SpecError;
use std::collections::BTreeSet;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20 * 60);
const DEFAULT_NOT_FOUND_CHECKS: u32 = 20;

/// Immutable configuration for a single wait.
///
/// Build one with [`WaitSpec::builder`]; `build()` enforces that no state is
/// both pending and target and that at least one target observation is
/// required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitSpec {
    pending: BTreeSet<String>,
    target: BTreeSet<String>,
    timeout: Duration,
    delay: Duration,
    poll_interval: Option<Duration>,
    min_timeout: Duration,
    not_found_checks: u32,
    continuous_target_occurrence: u32,
}

impl WaitSpec {
    pub fn builder() -> WaitSpecBuilder {
        WaitSpecBuilder::default()
    }

    /// States meaning the operation is still in progress
    pub fn pending(&self) -> &BTreeSet<String> {
        &self.pending
    }

    /// States meaning the operation succeeded. Empty means "gone".
    pub fn target(&self) -> &BTreeSet<String> {
        &self.target
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait before the first refresh
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Fixed interval between refreshes; `None` selects exponential backoff
    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval
    }

    /// Lower bound for the backoff interval
    pub fn min_timeout(&self) -> Duration {
        self.min_timeout
    }

    /// Consecutive not-found refreshes tolerated while waiting for a target state
    pub fn not_found_checks(&self) -> u32 {
        self.not_found_checks
    }

    /// Consecutive target observations required before the wait succeeds
    pub fn continuous_target_occurrence(&self) -> u32 {
        self.continuous_target_occurrence
    }

    /// Whether this wait is for the resource to disappear
    pub fn waits_for_absence(&self) -> bool {
        self.target.is_empty()
    }

    pub fn is_pending(&self, state: &str) -> bool {
        self.pending.contains(state)
    }

    pub fn is_target(&self, state: &str) -> bool {
        self.target.contains(state)
    }

    pub(crate) fn target_list(&self) -> Vec<String> {
        self.target.iter().cloned().collect()
    }

    pub(crate) fn pending_list(&self) -> Vec<String> {
        self.pending.iter().cloned().collect()
    }
}

/// Builder for [`WaitSpec`]
#[derive(Debug, Clone)]
pub struct WaitSpecBuilder {
    pending: BTreeSet<String>,
    target: BTreeSet<String>,
    timeout: Duration,
    delay: Duration,
    poll_interval: Option<Duration>,
    min_timeout: Duration,
    not_found_checks: u32,
    continuous_target_occurrence: u32,
}

impl Default for WaitSpecBuilder {
    fn default() -> Self {
        Self {
            pending: BTreeSet::new(),
            target: BTreeSet::new(),
            timeout: DEFAULT_TIMEOUT,
            delay: Duration::ZERO,
            poll_interval: None,
            min_timeout: Duration::ZERO,
            not_found_checks: DEFAULT_NOT_FOUND_CHECKS,
            continuous_target_occurrence: 1,
        }
    }
}

impl WaitSpecBuilder {
    pub fn pending<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pending.extend(states.into_iter().map(Into::into));
        self
    }

    pub fn target<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target.extend(states.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Timeout taken from what is left of a shared [`Deadline`].
    ///
    /// An expired deadline still yields a wait, one that times out at once.
    pub fn deadline(self, deadline: &Deadline) -> Self {
        self.timeout(deadline.budget())
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fixed interval between refreshes.
    ///
    /// A zero interval is treated as unset and leaves exponential backoff in
    /// place.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = (!interval.is_zero()).then_some(interval);
        self
    }

    pub fn min_timeout(mut self, min_timeout: Duration) -> Self {
        self.min_timeout = min_timeout;
        self
    }

    pub fn not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = checks;
        self
    }

    pub fn continuous_target_occurrence(mut self, occurrence: u32) -> Self {
        self.continuous_target_occurrence = occurrence;
        self
    }

    pub fn build(self) -> Result<WaitSpec, SpecError> {
        if let Some(state) = self.pending.intersection(&self.target).next() {
            return Err(SpecError::OverlappingStates {
                state: state.clone(),
            });
        }
        if self.continuous_target_occurrence == 0 {
            return Err(SpecError::ZeroTargetOccurrence);
        }
        if self.timeout.is_zero() {
            return Err(SpecError::ZeroTimeout);
        }

        Ok(WaitSpec {
            pending: self.pending,
            target: self.target,
            timeout: self.timeout,
            delay: self.delay,
            poll_interval: self.poll_interval,
            min_timeout: self.min_timeout,
            not_found_checks: self.not_found_checks,
            continuous_target_occurrence: self.continuous_target_occurrence,
        })
    }
}
