//! Storage engine adapter.
//!
//! The store treats the engine as an ordered byte-keyed map with snapshot
//! reads, atomic write batches and a forward iterator. This module provides
//! that surface on top of redb, plus the per-entry expiry metadata redb does
//! not track itself.

pub mod backend;
pub mod clock;
pub mod config;
pub mod error;
pub mod value;

// Re-export main types for public API
pub use backend::{Item, RedbEngine, Snapshot, WriteBatch};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use error::EngineError;
