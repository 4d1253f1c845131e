//! Refresh probe outcome

use crate::finder::NotFound;

/// Result of a single status refresh.
///
/// Probes are async closures returning `Result<Refreshed<T>, E>`; an `Err`
/// is a probe failure, everything else is an observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refreshed<T> {
    /// The remote object does not exist (yet, or anymore)
    NotFound,
    /// The remote object exists and reports `state`
    Found { object: T, state: String },
}

impl<T> Refreshed<T> {
    pub fn found(object: T, state: impl Into<String>) -> Self {
        Refreshed::Found {
            object,
            state: state.into(),
        }
    }

    /// Converts a finder result into a refresh outcome.
    ///
    /// A not-found error becomes [`Refreshed::NotFound`]; any other error is
    /// passed through as the probe error.
    pub fn from_lookup<E, S>(result: Result<T, E>, state_of: impl FnOnce(&T) -> S) -> Result<Self, E>
    where
        E: NotFound,
        S: Into<String>,
    {
        match result {
            Ok(object) => {
                let state = state_of(&object).into();
                Ok(Refreshed::Found { object, state })
            }
            Err(err) if err.is_not_found() => Ok(Refreshed::NotFound),
            Err(err) => Err(err),
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Refreshed::Found { .. })
    }

    pub fn state(&self) -> Option<&str> {
        match self {
            Refreshed::Found { state, .. } => Some(state),
            Refreshed::NotFound => None,
        }
    }
}
