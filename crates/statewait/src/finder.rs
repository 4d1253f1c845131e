//! Helpers for probes that look resources up by listing them

use crate::error::{FindError, WaitError};

/// Errors that can mean "the resource does not exist".
pub trait NotFound {
    fn is_not_found(&self) -> bool;
}

impl NotFound for FindError {
    fn is_not_found(&self) -> bool {
        matches!(self, FindError::EmptyResult)
    }
}

impl<E: std::error::Error + 'static> NotFound for WaitError<E> {
    fn is_not_found(&self) -> bool {
        matches!(self, WaitError::NotFound { .. })
    }
}

impl NotFound for std::io::Error {
    fn is_not_found(&self) -> bool {
        self.kind() == std::io::ErrorKind::NotFound
    }
}

/// Returns the only element, or an error if there are zero or several.
pub fn assert_single_value<T>(values: Vec<T>) -> Result<T, FindError> {
    let count = values.len();
    let mut iter = values.into_iter();
    match (iter.next(), count) {
        (Some(value), 1) => Ok(value),
        (None, _) => Err(FindError::EmptyResult),
        (Some(_), count) => Err(FindError::TooManyResults { count }),
    }
}

/// Returns the first element, or [`FindError::EmptyResult`].
pub fn assert_first_value<T>(values: Vec<T>) -> Result<T, FindError> {
    values.into_iter().next().ok_or(FindError::EmptyResult)
}
