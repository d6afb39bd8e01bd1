//! Bucketed key-value store.
//!
//! [`BucketStore`] partitions one redb key space into buckets. Every key is
//! stored as `bucket@key`, and scans are bounded by delimiter-terminated
//! prefixes so a bucket never leaks entries from another bucket that merely
//! shares leading bytes.

use std::ops::{Bound, ControlFlow};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace};

use crate::encoding::key::{bucket_key, encode_prefix, strip_prefix};
use crate::engine::{EngineConfig, EngineError, RedbEngine};
use crate::trace::{KeyTracer, NoopTracer};
use crate::{Error, Result};

pub mod iterator;

pub use iterator::{AllKeys, KeyStatus};

/// Key-value store with bucket namespaces over a single redb database.
///
/// The store adds no locking of its own. Share it across threads by
/// reference; redb serialises writers and gives each read its own snapshot.
pub struct BucketStore {
    engine: Option<RedbEngine>,
    tracer: Arc<dyn KeyTracer>,
}

impl BucketStore {
    /// Opens a store over the database described by `config`.
    pub fn open(config: EngineConfig) -> Result<Self> {
        Ok(Self::from_engine(RedbEngine::open(config)?))
    }

    /// Wraps an already opened engine.
    pub fn from_engine(engine: RedbEngine) -> Self {
        Self {
            engine: Some(engine),
            tracer: Arc::new(NoopTracer),
        }
    }

    /// Replaces the key tracer.
    #[must_use]
    pub fn with_tracer(mut self, tracer: Arc<dyn KeyTracer>) -> Self {
        self.tracer = tracer;
        self
    }

    fn engine(&self) -> Result<&RedbEngine> {
        self.engine.as_ref().ok_or(Error::Engine(EngineError::Closed))
    }

    /// Stores `value` under `key` in `bucket`, replacing any previous value.
    pub fn set(&self, bucket: &[u8], key: &[u8], value: &[u8]) -> Result<()> {
        let physical = bucket_key(bucket, key);
        self.tracer.record("set", &[physical.as_slice()]);

        self.engine()?
            .update(|batch| batch.set(&physical, value))
            .map_err(Error::from)
    }

    /// Stores `value` so that it stops being visible once `ttl` has elapsed.
    pub fn set_with_ttl(
        &self,
        bucket: &[u8],
        key: &[u8],
        value: &[u8],
        ttl: Duration,
    ) -> Result<()> {
        let physical = bucket_key(bucket, key);
        self.tracer.record("set_with_ttl", &[physical.as_slice()]);

        let engine = self.engine()?;
        let expires_at = engine.expiry_after(ttl);
        engine
            .update(|batch| batch.set_with_expiry(&physical, value, expires_at))
            .map_err(Error::from)
    }

    /// Reads the value for `key` in `bucket`.
    ///
    /// Returns [`Error::KeyNotFound`] when the key is absent or expired.
    pub fn get(&self, bucket: &[u8], key: &[u8]) -> Result<Vec<u8>> {
        let physical = bucket_key(bucket, key);
        self.tracer.record("get", &[physical.as_slice()]);

        self.engine()?
            .view(|snapshot| snapshot.get(&physical))?
            .ok_or(Error::KeyNotFound)
    }

    /// Writes all pairs in one atomic batch.
    ///
    /// `keys` and `values` must have the same length; otherwise nothing is
    /// written and [`Error::InvalidInput`] is returned.
    pub fn multi_set<K, V>(&self, bucket: &[u8], keys: &[K], values: &[V]) -> Result<()>
    where
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        if keys.len() != values.len() {
            return Err(Error::InvalidInput(format!(
                "{} keys but {} values",
                keys.len(),
                values.len()
            )));
        }

        let physical: Vec<Vec<u8>> = keys
            .iter()
            .map(|key| bucket_key(bucket, key.as_ref()))
            .collect();
        self.tracer.record("multi_set", &as_slices(&physical));

        let engine = self.engine()?;

        engine.update(|batch| {
            for (key, value) in physical.iter().zip(values) {
                batch.set(key, value.as_ref())?;
            }
            Ok(())
        })
    }

    /// Reads every key from one snapshot.
    ///
    /// Fails fast: the first missing or expired key aborts the call with
    /// [`Error::KeyNotFound`], exactly as [`get`](Self::get) would.
    pub fn multi_get<K: AsRef<[u8]>>(&self, bucket: &[u8], keys: &[K]) -> Result<Vec<Vec<u8>>> {
        let physical: Vec<Vec<u8>> = keys
            .iter()
            .map(|key| bucket_key(bucket, key.as_ref()))
            .collect();
        self.tracer.record("multi_get", &as_slices(&physical));

        let engine = self.engine()?;

        engine.view(|snapshot| {
            physical
                .iter()
                .map(|key| snapshot.get(key)?.ok_or(Error::KeyNotFound))
                .collect()
        })
    }

    /// Removes `key` from `bucket`. Removing an absent key succeeds.
    pub fn delete(&self, bucket: &[u8], key: &[u8]) -> Result<()> {
        let physical = bucket_key(bucket, key);
        self.tracer.record("delete", &[physical.as_slice()]);

        self.engine()?
            .update(|batch| batch.delete(&physical))
            .map_err(Error::from)
    }

    /// Removes all keys in one atomic batch.
    pub fn multi_delete<K: AsRef<[u8]>>(&self, bucket: &[u8], keys: &[K]) -> Result<()> {
        let physical: Vec<Vec<u8>> = keys
            .iter()
            .map(|key| bucket_key(bucket, key.as_ref()))
            .collect();
        self.tracer.record("multi_delete", &as_slices(&physical));

        let engine = self.engine()?;

        engine.update(|batch| {
            for key in &physical {
                batch.delete(key)?;
            }
            Ok(())
        })
    }

    /// Returns the live entries whose leading segments are `bucket` followed
    /// by `path`.
    ///
    /// Keys come back with the bucket and path stripped, in encoded byte
    /// order. An empty `path` lists the whole bucket.
    pub fn scan_prefix<S: AsRef<[u8]>>(
        &self,
        bucket: &[u8],
        path: &[S],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let prefix = segment_prefix(bucket, path);
        self.tracer.record("scan_prefix", &[prefix.as_slice()]);

        let mut entries = Vec::new();
        self.scan_live(&prefix, &prefix, true, |key, value| {
            entries.push((key, value.unwrap_or_default()));
        })?;
        Ok(entries)
    }

    /// Same key set and order as [`scan_prefix`](Self::scan_prefix), without
    /// copying any value.
    pub fn scan_prefix_keys<S: AsRef<[u8]>>(
        &self,
        bucket: &[u8],
        path: &[S],
    ) -> Result<Vec<Vec<u8>>> {
        let prefix = segment_prefix(bucket, path);
        self.tracer.record("scan_prefix_keys", &[prefix.as_slice()]);

        let mut keys = Vec::new();
        self.scan_live(&prefix, &prefix, false, |key, _| keys.push(key))?;
        Ok(keys)
    }

    /// Returns the live entries in `bucket` whose key starts with the raw
    /// bytes `key_prefix`.
    ///
    /// The bucket boundary is delimiter-safe, but matching inside the key is
    /// byte-wise: a prefix of `tiger-1` also matches `tiger-10`. Prefer
    /// [`scan_prefix`](Self::scan_prefix) when keys are segmented. Keys come
    /// back with only the bucket stripped.
    pub fn scan_key_prefix(
        &self,
        bucket: &[u8],
        key_prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let bucket_prefix = encode_prefix(&[bucket]);
        let mut bound = bucket_prefix.clone();
        bound.extend_from_slice(key_prefix);
        self.tracer.record("scan_key_prefix", &[bound.as_slice()]);

        let mut entries = Vec::new();
        self.scan_live(&bound, &bucket_prefix, true, |key, value| {
            entries.push((key, value.unwrap_or_default()));
        })?;
        Ok(entries)
    }

    /// Walks the entire key space lazily, starting at `start_bucket` if given.
    ///
    /// Every physical key is reported with its deleted-or-expired flag rather
    /// than filtered. The traversal reads a single snapshot and can be
    /// stopped at any point by dropping the iterator.
    pub fn scan_all(&self, start_bucket: Option<&[u8]>) -> Result<AllKeys> {
        let start = start_bucket.map(|bucket| encode_prefix(&[bucket]));
        match &start {
            Some(prefix) => self.tracer.record("scan_all", &[prefix.as_slice()]),
            None => self.tracer.record("scan_all", &[]),
        }

        let snapshot = self.engine()?.snapshot()?;
        Ok(AllKeys::new(snapshot, start))
    }

    /// Flushes earlier commits made with `sync_on_write` disabled.
    pub fn sync(&self) -> Result<()> {
        self.tracer.record("sync", &[]);
        self.engine()?.sync().map_err(Error::from)
    }

    /// Releases the database. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        self.tracer.record("close", &[]);
        if let Some(engine) = self.engine.take() {
            debug!(paths = ?engine.paths(), "closing bucket database");
        }
        Ok(())
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.engine.is_none()
    }

    /// Whether the store was opened read-only. A closed store reports its
    /// writes as rejected.
    pub fn is_read_only(&self) -> bool {
        self.engine.as_ref().map_or(true, RedbEngine::is_read_only)
    }

    /// Storage file paths backing the store.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.engine.as_ref().map(RedbEngine::paths).unwrap_or_default()
    }

    /// Collects live entries between `bound` and the end of its prefix range,
    /// handing each key to `collect` with `strip` removed.
    fn scan_live<F>(
        &self,
        bound: &[u8],
        strip: &[u8],
        fetch_values: bool,
        mut collect: F,
    ) -> Result<()>
    where
        F: FnMut(Vec<u8>, Option<Vec<u8>>),
    {
        let engine = self.engine()?;
        engine.view(|snapshot| {
            snapshot.scan(Bound::Included(bound), fetch_values, |item| {
                if !item.key().starts_with(bound) {
                    return ControlFlow::Break(());
                }
                if item.is_deleted_or_expired() {
                    trace!(key = %String::from_utf8_lossy(item.key()), "skipping expired entry");
                    return ControlFlow::Continue(());
                }

                let value = item.value().map(<[u8]>::to_vec);
                collect(strip_prefix(item.key(), strip), value);
                ControlFlow::Continue(())
            })
        })?;
        Ok(())
    }
}

fn segment_prefix<S: AsRef<[u8]>>(bucket: &[u8], path: &[S]) -> Vec<u8> {
    let mut segments: Vec<&[u8]> = Vec::with_capacity(path.len() + 1);
    segments.push(bucket);
    segments.extend(path.iter().map(AsRef::as_ref));
    encode_prefix(&segments)
}

fn as_slices(keys: &[Vec<u8>]) -> Vec<&[u8]> {
    keys.iter().map(Vec::as_slice).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    const USERS: &[u8] = b"users";

    fn store() -> BucketStore {
        BucketStore::open(EngineConfig::in_memory()).unwrap()
    }

    #[derive(Default)]
    struct RecordingTracer {
        calls: Mutex<Vec<(&'static str, Vec<Vec<u8>>)>>,
    }

    impl KeyTracer for RecordingTracer {
        fn record(&self, operation: &'static str, keys: &[&[u8]]) {
            let keys = keys.iter().map(|key| key.to_vec()).collect();
            self.calls.lock().unwrap().push((operation, keys));
        }
    }

    #[test]
    fn test_set_then_get() {
        let store = store();
        store.set(USERS, b"1", b"alice").unwrap();
        assert_eq!(store.get(USERS, b"1").unwrap(), b"alice");

        // Repeating the write changes nothing
        store.set(USERS, b"1", b"alice").unwrap();
        assert_eq!(store.get(USERS, b"1").unwrap(), b"alice");
        assert_eq!(store.scan_prefix_keys::<&[u8]>(USERS, &[]).unwrap().len(), 1);
    }

    #[test]
    fn test_get_missing_is_key_not_found() {
        let store = store();
        let err = store.get(USERS, b"nobody").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_empty_value_is_found() {
        let store = store();
        store.set(USERS, b"blank", b"").unwrap();
        assert_eq!(store.get(USERS, b"blank").unwrap(), b"");
    }

    #[test]
    fn test_buckets_are_isolated() {
        let store = store();
        store.set(b"a", b"bc", b"from a").unwrap();
        store.set(b"ab", b"c", b"from ab").unwrap();

        assert_eq!(store.get(b"a", b"bc").unwrap(), b"from a");
        assert_eq!(store.get(b"ab", b"c").unwrap(), b"from ab");
        assert!(store.get(b"a", b"b").unwrap_err().is_not_found());
    }

    #[test]
    fn test_multi_set_length_mismatch_writes_nothing() {
        let store = store();
        let err = store
            .multi_set(USERS, &["1", "2"], &["only-one"])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(store.get(USERS, b"1").unwrap_err().is_not_found());
    }

    #[test]
    fn test_multi_get_fails_fast_on_missing_key() {
        let store = store();
        store
            .multi_set(USERS, &["1", "3"], &["a", "c"])
            .unwrap();

        let values = store.multi_get(USERS, &["3", "1"]).unwrap();
        assert_eq!(values, vec![b"c".to_vec(), b"a".to_vec()]);

        let err = store.multi_get(USERS, &["1", "2", "3"]).unwrap_err();
        assert!(err.is_not_found());

        let empty: [&str; 0] = [];
        assert!(store.multi_get(USERS, &empty).unwrap().is_empty());
    }

    #[test]
    fn test_scan_prefix_with_path() {
        let store = store();
        store.set(b"cluster", b"broker@eu@1", b"b1").unwrap();
        store.set(b"cluster", b"broker@eu@2", b"b2").unwrap();
        store.set(b"cluster", b"broker@eu-west@1", b"w1").unwrap();
        store.set(b"cluster", b"broker@us@1", b"u1").unwrap();

        let entries = store.scan_prefix(b"cluster", &["broker", "eu"]).unwrap();
        assert_eq!(
            entries,
            vec![
                (b"1".to_vec(), b"b1".to_vec()),
                (b"2".to_vec(), b"b2".to_vec()),
            ]
        );

        let keys = store.scan_prefix_keys(b"cluster", &["broker", "eu"]).unwrap();
        assert_eq!(keys, vec![b"1".to_vec(), b"2".to_vec()]);
    }

    #[test]
    fn test_scan_key_prefix_matches_raw_bytes() {
        let store = store();
        store.set(USERS, b"tiger-1", b"one").unwrap();
        store.set(USERS, b"tiger-10", b"ten").unwrap();
        store.set(USERS, b"lion-1", b"lion").unwrap();
        store.set(b"users2", b"tiger-1", b"other bucket").unwrap();

        let entries = store.scan_key_prefix(USERS, b"tiger-1").unwrap();
        assert_eq!(
            entries,
            vec![
                (b"tiger-1".to_vec(), b"one".to_vec()),
                (b"tiger-10".to_vec(), b"ten".to_vec()),
            ]
        );
    }

    #[test]
    fn test_tracer_sees_encoded_keys() {
        let tracer = Arc::new(RecordingTracer::default());
        let store = store().with_tracer(tracer.clone());

        store.set(USERS, b"1", b"alice").unwrap();
        let _ = store.get(USERS, b"2");
        store.multi_delete(USERS, &["1", "2"]).unwrap();

        let calls = tracer.calls.lock().unwrap();
        assert_eq!(calls[0], ("set", vec![b"users@1".to_vec()]));
        assert_eq!(calls[1], ("get", vec![b"users@2".to_vec()]));
        assert_eq!(
            calls[2],
            ("multi_delete", vec![b"users@1".to_vec(), b"users@2".to_vec()])
        );
    }

    #[test]
    fn test_failed_batch_leaves_store_unchanged() {
        let store = store();
        store
            .multi_set(USERS, &["1", "2"], &["alice", "bob"])
            .unwrap();

        let result: Result<()> = store.engine().unwrap().update(|batch| {
            batch.set(&bucket_key(USERS, b"3"), b"carol")?;
            batch.delete(&bucket_key(USERS, b"1"))?;
            Err(Error::InvalidInput("rejected mid-batch".to_string()))
        });
        assert!(matches!(result, Err(Error::InvalidInput(_))));

        assert!(store.get(USERS, b"3").unwrap_err().is_not_found());
        assert_eq!(
            store.scan_prefix::<&[u8]>(USERS, &[]).unwrap(),
            vec![
                (b"1".to_vec(), b"alice".to_vec()),
                (b"2".to_vec(), b"bob".to_vec()),
            ]
        );
    }

    #[test]
    fn test_multi_delete_is_all_or_nothing_to_readers() {
        let store = store();
        store
            .multi_set(USERS, &["1", "2", "3"], &["a", "b", "c"])
            .unwrap();

        let before = store.scan_all(None).unwrap();
        store.multi_delete(USERS, &["1", "2", "3"]).unwrap();

        assert_eq!(before.count(), 3);
        assert_eq!(store.scan_all(None).unwrap().count(), 0);
        assert!(store
            .multi_get(USERS, &["1"])
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_closed_store_still_traces_every_operation() {
        let tracer = Arc::new(RecordingTracer::default());
        let mut store = store().with_tracer(tracer.clone());
        store.close().unwrap();
        tracer.calls.lock().unwrap().clear();

        assert!(store.set(USERS, b"1", b"a").is_err());
        assert!(store
            .set_with_ttl(USERS, b"1", b"a", Duration::from_secs(1))
            .is_err());
        assert!(store.get(USERS, b"1").is_err());
        assert!(store.multi_set(USERS, &["1"], &["a"]).is_err());
        assert!(store.multi_get(USERS, &["1"]).is_err());
        assert!(store.delete(USERS, b"1").is_err());
        assert!(store.multi_delete(USERS, &["1"]).is_err());
        assert!(store.scan_all(None).is_err());

        let operations: Vec<&str> = tracer
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|(operation, _)| *operation)
            .collect();
        assert_eq!(
            operations,
            vec![
                "set",
                "set_with_ttl",
                "get",
                "multi_set",
                "multi_get",
                "delete",
                "multi_delete",
                "scan_all"
            ]
        );
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut store = store();
        store.set(USERS, b"1", b"alice").unwrap();

        store.close().unwrap();
        assert!(store.is_closed());
        store.close().unwrap();

        let err = store.get(USERS, b"1").unwrap_err();
        assert!(matches!(err, Error::Engine(EngineError::Closed)));
        assert!(store.paths().is_empty());
        assert!(store.scan_all(None).is_err());
    }
}
