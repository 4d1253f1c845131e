//! Waiter error types

use std::fmt::Display;
use std::time::Duration;
use thiserror::Error;

/// Terminal failure of a wait.
///
/// `E` is the error type returned by the refresh probe.
#[derive(Error, Debug)]
pub enum WaitError<E: std::error::Error + 'static> {
    #[error(
        "timeout while waiting for state to become '{}' (last state: '{last_state}', timeout: {timeout:?}){}",
        .expected.join(", "),
        detail_suffix(.last_error.as_ref(), .reason.as_deref())
    )]
    Timeout {
        /// Last state label observed before the deadline
        last_state: String,
        /// Target states the wait was looking for
        expected: Vec<String>,
        /// Time spent polling
        elapsed: Duration,
        /// Configured timeout
        timeout: Duration,
        /// Most recent retryable probe error, if any
        #[source]
        last_error: Option<E>,
        /// Remote-reported status reason of the last observed object
        reason: Option<String>,
    },

    #[error(
        "unexpected state '{state}', wanted target '{}'{}",
        .expected.join(", "),
        detail_suffix(None::<&String>, .reason.as_deref())
    )]
    UnexpectedState {
        state: String,
        expected: Vec<String>,
        pending: Vec<String>,
        reason: Option<String>,
    },

    #[error("couldn't find resource ({retries} retries){}", detail_suffix(.last_error.as_ref(), None))]
    NotFound {
        retries: u32,
        #[source]
        last_error: Option<E>,
    },

    #[error("refresh failed: {0}")]
    Probe(#[source] E),

    #[error("wait cancelled after {elapsed:?} (last state: '{last_state}')")]
    Cancelled {
        elapsed: Duration,
        last_state: String,
    },

    #[error("invalid wait parameters: {0}")]
    InvalidSpec(#[from] SpecError),
}

fn detail_suffix<E: Display>(last_error: Option<&E>, reason: Option<&str>) -> String {
    match (reason, last_error) {
        (Some(reason), _) => format!(". last error: {}", reason),
        (None, Some(err)) => format!(". last error: {}", err),
        (None, None) => String::new(),
    }
}

impl<E: std::error::Error + 'static> WaitError<E> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitError::Timeout { .. })
    }

    pub fn is_unexpected_state(&self) -> bool {
        matches!(self, WaitError::UnexpectedState { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, WaitError::Cancelled { .. })
    }

    /// Last state label known when the wait ended, if the failure carries one
    pub fn last_state(&self) -> Option<&str> {
        match self {
            WaitError::Timeout { last_state, .. } | WaitError::Cancelled { last_state, .. } => {
                Some(last_state)
            }
            WaitError::UnexpectedState { state, .. } => Some(state),
            WaitError::NotFound { .. } | WaitError::Probe(_) | WaitError::InvalidSpec(_) => None,
        }
    }

    /// Returns the probe error wrapped by this failure, if any
    pub fn probe_error(&self) -> Option<&E> {
        match self {
            WaitError::Probe(err) => Some(err),
            WaitError::Timeout { last_error, .. } | WaitError::NotFound { last_error, .. } => {
                last_error.as_ref()
            }
            WaitError::UnexpectedState { .. }
            | WaitError::Cancelled { .. }
            | WaitError::InvalidSpec(_) => None,
        }
    }

    /// Converts the probe error type, keeping everything else.
    pub fn map_probe_error<F, M>(self, map: M) -> WaitError<F>
    where
        F: std::error::Error + 'static,
        M: FnOnce(E) -> F,
    {
        match self {
            WaitError::Timeout {
                last_state,
                expected,
                elapsed,
                timeout,
                last_error,
                reason,
            } => WaitError::Timeout {
                last_state,
                expected,
                elapsed,
                timeout,
                last_error: last_error.map(map),
                reason,
            },
            WaitError::UnexpectedState {
                state,
                expected,
                pending,
                reason,
            } => WaitError::UnexpectedState {
                state,
                expected,
                pending,
                reason,
            },
            WaitError::NotFound {
                retries,
                last_error,
            } => WaitError::NotFound {
                retries,
                last_error: last_error.map(map),
            },
            WaitError::Probe(err) => WaitError::Probe(map(err)),
            WaitError::Cancelled {
                elapsed,
                last_state,
            } => WaitError::Cancelled {
                elapsed,
                last_state,
            },
            WaitError::InvalidSpec(err) => WaitError::InvalidSpec(err),
        }
    }
}

/// Invalid wait parameters
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    #[error("state '{state}' is listed as both pending and target")]
    OverlappingStates { state: String },

    #[error("continuous target occurrence must be at least 1")]
    ZeroTargetOccurrence,

    #[error("timeout must be greater than zero")]
    ZeroTimeout,
}

/// Lookup failure of a finder
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FindError {
    #[error("empty result")]
    EmptyResult,

    #[error("too many results: wanted 1, got {count}")]
    TooManyResults { count: usize },
}

pub type Result<T, E> = std::result::Result<T, WaitError<E>>;
