//! Crate-scoped error handling for redb-buckets.
//!
//! Callers branch on [`Error::KeyNotFound`]; everything coming from the
//! storage engine is wrapped in [`Error::Engine`] without modification.

use thiserror::Error;

use crate::engine::EngineError;

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type exposed to users of the crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The key is absent, was deleted, or has expired.
    #[error("key not found")]
    KeyNotFound,

    /// The call itself was malformed (for example batch arrays of different
    /// lengths). Nothing was written.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Failure reported by the storage engine.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl Error {
    /// True for [`Error::KeyNotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::KeyNotFound)
    }
}
