//! Bucketed key namespaces on top of redb.
//!
//! A [`BucketStore`] keeps many logical namespaces ("buckets") in one redb
//! table. Keys are encoded as `bucket@key`, and every prefix used to bound a
//! scan ends on the delimiter, so scanning bucket `a` never returns entries
//! of bucket `ab`.
//!
//! ```no_run
//! use redb_buckets::{BucketStore, EngineConfig};
//!
//! let store = BucketStore::open(EngineConfig::new("data.redb"))?;
//! store.set(b"users", b"1", b"alice")?;
//! assert_eq!(store.get(b"users", b"1")?, b"alice");
//! # Ok::<(), redb_buckets::Error>(())
//! ```

pub mod encoding;
pub mod engine;
pub mod error;
pub mod store;
pub mod trace;

// Re-export common types for convenience
pub use engine::{EngineConfig, EngineError};
pub use error::{Error, Result};
pub use store::{AllKeys, BucketStore, KeyStatus};
pub use trace::{KeyTracer, LogTracer, NoopTracer};
