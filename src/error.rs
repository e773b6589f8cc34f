//! Error types for contact lookups and screening.

use thiserror::Error;

/// Failures raised by a [`ContactDirectory`](crate::directory::ContactDirectory).
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The backing lookup service could not answer.
    #[error("contact directory unavailable: {0}")]
    Unavailable(String),

    /// The lookup did not answer within the allotted time.
    #[error("contact lookup timed out after {0} ms")]
    Timeout(u64),

    /// Reading the backing store failed.
    #[error("contact directory I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A string that is not in normalized form, e.g. from a deserialized event.
#[derive(Debug, Error)]
#[error("not a normalized number: {0:?}")]
pub struct InvalidNumber(pub String);

/// Conditions surfaced by the checked screening path.
///
/// A missing caller identifier is not an error; it resolves to Allow.
#[derive(Debug, Error)]
pub enum ScreeningError {
    #[error("directory unavailable: {0}")]
    DirectoryUnavailable(#[from] DirectoryError),
}

pub type Result<T> = std::result::Result<T, ScreeningError>;
