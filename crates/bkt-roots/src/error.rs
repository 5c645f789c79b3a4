//! Error types for root store operations.

use thiserror::Error;

/// Errors that can occur while reading or publishing bucket roots.
///
/// A CAS conflict is not an error; it is reported through
/// [`CasOutcome::Conflict`](crate::CasOutcome::Conflict).
#[derive(Debug, Error)]
pub enum RootError {
    /// The root store could not be reached or its state is unusable.
    #[error("root store unavailable: {0}")]
    Unavailable(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from a persistent backend.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for root store operations.
pub type Result<T> = std::result::Result<T, RootError>;
