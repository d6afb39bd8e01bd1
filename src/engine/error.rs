//! Engine-level error type.

use thiserror::Error;

/// Failures raised by the storage engine or by the adapter around it.
///
/// These are passed to callers unchanged. Nothing in the crate retries them.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The database could not be opened or created.
    #[error("failed to open database: {0}")]
    Open(String),

    /// The configuration was rejected before touching the disk.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The store was closed before this operation.
    #[error("database is closed")]
    Closed,

    /// A write was attempted on a read-only database.
    #[error("database is opened read-only")]
    ReadOnly,

    /// Page or file level failure inside redb.
    #[error("storage error: {0}")]
    Storage(String),

    /// A transaction could not be started or configured.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// The data table could not be opened.
    #[error("table error: {0}")]
    Table(String),

    /// A write transaction failed to commit; none of its writes were applied.
    #[error("commit failed: {0}")]
    Commit(String),

    /// A stored value did not carry a readable envelope.
    #[error("invalid value encoding: {0}")]
    InvalidValueEncoding(String),

    /// A stored value was written by an unknown envelope version.
    #[error("unsupported value version: {0}")]
    UnsupportedVersion(u8),
}

impl From<redb::StorageError> for EngineError {
    fn from(err: redb::StorageError) -> Self {
        EngineError::Storage(err.to_string())
    }
}
