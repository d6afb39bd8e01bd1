//! Opt-in tracing of the physical keys each operation touches.
//!
//! A store is built with a [`KeyTracer`]. The default [`NoopTracer`] records
//! nothing; [`LogTracer`] forwards every call to `tracing` at debug level.
//! Tracers observe only and cannot change an operation's outcome.

use tracing::debug;

/// Target used by [`LogTracer`] events.
pub const KEY_TRACE_TARGET: &str = "redb_buckets::keys";

/// Receives the encoded keys touched by each store operation.
pub trait KeyTracer: Send + Sync {
    fn record(&self, operation: &'static str, keys: &[&[u8]]);
}

/// Discards every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

impl KeyTracer for NoopTracer {
    fn record(&self, _operation: &'static str, _keys: &[&[u8]]) {}
}

/// Emits one debug event per operation.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTracer;

impl KeyTracer for LogTracer {
    fn record(&self, operation: &'static str, keys: &[&[u8]]) {
        let keys = keys
            .iter()
            .map(|key| String::from_utf8_lossy(key))
            .collect::<Vec<_>>()
            .join(",");
        debug!(target: KEY_TRACE_TARGET, operation, keys = %keys);
    }
}
