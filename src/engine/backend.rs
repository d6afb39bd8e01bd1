//! redb-backed engine adapter.
//!
//! All buckets share one redb table keyed by encoded bytes. The adapter
//! exposes the primitives the store needs: snapshot reads with point lookups
//! and forward range scans, and atomic write batches.

use std::ops::{Bound, ControlFlow};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use redb::backends::InMemoryBackend;
use redb::{
    Database, Durability, ReadOnlyDatabase, ReadOnlyTable, ReadTransaction, ReadableDatabase, Table,
    TableDefinition, TableError, WriteTransaction,
};
use tracing::{debug, info, warn};

use crate::engine::value::{decode_value, encode_value};
use crate::engine::{Clock, EngineConfig, EngineError, SystemClock};

const DATA_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("bucket_data");

/// The redb handle behind an engine.
///
/// Read-only engines hold a [`ReadOnlyDatabase`], which takes a shared file
/// lock and never writes to the file.
enum Handle {
    Writable(Database),
    ReadOnly(ReadOnlyDatabase),
}

impl Handle {
    fn begin_read(&self) -> Result<ReadTransaction, EngineError> {
        match self {
            Handle::Writable(db) => db
                .begin_read()
                .map_err(|err| EngineError::Transaction(err.to_string())),
            Handle::ReadOnly(db) => db
                .begin_read()
                .map_err(|err| EngineError::Transaction(err.to_string())),
        }
    }

    fn begin_write(&self) -> Result<WriteTransaction, EngineError> {
        match self {
            Handle::Writable(db) => db
                .begin_write()
                .map_err(|err| EngineError::Transaction(err.to_string())),
            Handle::ReadOnly(_) => Err(EngineError::ReadOnly),
        }
    }
}

/// An opened redb database plus the configuration it was opened with.
pub struct RedbEngine {
    db: Handle,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
}

impl RedbEngine {
    /// Opens the database described by `config`, using wall-clock time for
    /// expiry.
    pub fn open(config: EngineConfig) -> Result<Self, EngineError> {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    /// Opens the database with a caller-supplied clock.
    pub fn open_with_clock(
        config: EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, EngineError> {
        config.validate()?;

        let mut builder = Database::builder();
        if let Some(cache_size) = config.cache_size {
            builder.set_cache_size(cache_size);
        }

        let db = match &config.path {
            Some(path) if config.read_only => {
                builder.open_read_only(path).map(Handle::ReadOnly)
            }
            Some(path) => builder.create(path).map(Handle::Writable),
            None => builder
                .create_with_backend(InMemoryBackend::new())
                .map(Handle::Writable),
        }
        .map_err(|err| EngineError::Open(err.to_string()))?;

        if !config.read_only {
            // Create the data table up front so readers never race its creation
            let txn = db.begin_write()?;
            txn.open_table(DATA_TABLE)
                .map_err(|err| EngineError::Table(err.to_string()))?;
            txn.commit()
                .map_err(|err| EngineError::Commit(err.to_string()))?;
        }

        info!(
            path = ?config.path,
            read_only = config.read_only,
            sync_on_write = config.sync_on_write,
            "opened bucket database"
        );

        Ok(Self { db, config, clock })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_read_only(&self) -> bool {
        self.config.read_only
    }

    /// Storage file paths. Empty for an in-memory database.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.config.path.iter().cloned().collect()
    }

    /// Current engine time in milliseconds since the Unix epoch.
    pub fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }

    /// Absolute expiry for an entry written now with the given TTL.
    pub fn expiry_after(&self, ttl: Duration) -> u64 {
        let ttl_millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        self.now_millis().saturating_add(ttl_millis)
    }

    /// Opens a read snapshot. It stays consistent for as long as it is held.
    pub fn snapshot(&self) -> Result<Snapshot, EngineError> {
        let txn = self.db.begin_read()?;

        let table = match txn.open_table(DATA_TABLE) {
            Ok(table) => Some(table),
            // A read-only open of a database that never saw a write
            Err(TableError::TableDoesNotExist(_)) => None,
            Err(err) => return Err(EngineError::Table(err.to_string())),
        };

        Ok(Snapshot {
            table,
            _txn: txn,
            now: self.now_millis(),
        })
    }

    /// Runs `f` against one consistent snapshot.
    pub fn view<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<EngineError>,
        F: FnOnce(&Snapshot) -> Result<T, E>,
    {
        let snapshot = self.snapshot()?;
        f(&snapshot)
    }

    /// Runs `f` against a write batch and commits it.
    ///
    /// If `f` fails the transaction is aborted and none of its writes become
    /// visible.
    pub fn update<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<EngineError>,
        F: FnOnce(&mut WriteBatch<'_>) -> Result<T, E>,
    {
        let mut txn = self.db.begin_write()?;

        if !self.config.sync_on_write {
            txn.set_durability(Durability::None)
                .map_err(|err| EngineError::Transaction(err.to_string()))?;
        }

        let outcome = {
            let table = txn
                .open_table(DATA_TABLE)
                .map_err(|err| EngineError::Table(err.to_string()))?;
            let mut batch = WriteBatch { table };
            f(&mut batch)
        };

        match outcome {
            Ok(value) => {
                txn.commit()
                    .map_err(|err| EngineError::Commit(err.to_string()))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(abort_err) = txn.abort() {
                    warn!(error = %abort_err, "failed to abort write batch");
                }
                Err(err)
            }
        }
    }

    /// Makes every earlier commit durable.
    ///
    /// A durable commit in redb also persists the non-durable commits before
    /// it, so an empty one is enough.
    pub fn sync(&self) -> Result<(), EngineError> {
        if self.config.read_only {
            return Ok(());
        }

        let txn = self.db.begin_write()?;
        txn.commit()
            .map_err(|err| EngineError::Commit(err.to_string()))?;

        debug!(path = ?self.config.path, "synced bucket database");
        Ok(())
    }
}

/// A consistent read view of the data table.
pub struct Snapshot {
    // Declared before the transaction so it is dropped first
    table: Option<ReadOnlyTable<&'static [u8], &'static [u8]>>,
    _txn: ReadTransaction,
    now: u64,
}

impl Snapshot {
    /// Point lookup. Missing and expired entries both read as `None`.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, EngineError> {
        let Some(table) = &self.table else {
            return Ok(None);
        };
        let Some(guard) = table.get(key)? else {
            return Ok(None);
        };

        let stored = decode_value(guard.value())?;
        if stored.is_expired(self.now) {
            return Ok(None);
        }

        Ok(Some(stored.payload.to_vec()))
    }

    /// Visits entries in key order starting at `start` until `visit` breaks
    /// or the table ends.
    ///
    /// With `fetch_values` unset the items carry no payload and nothing past
    /// the value header is read.
    pub fn scan<F>(
        &self,
        start: Bound<&[u8]>,
        fetch_values: bool,
        mut visit: F,
    ) -> Result<(), EngineError>
    where
        F: FnMut(Item<'_>) -> ControlFlow<()>,
    {
        let Some(table) = &self.table else {
            return Ok(());
        };

        for entry in table.range::<&[u8]>((start, Bound::Unbounded))? {
            let (key_guard, value_guard) = entry?;
            let stored = decode_value(value_guard.value())?;

            let item = Item {
                key: key_guard.value(),
                value: fetch_values.then_some(stored.payload),
                deleted_or_expired: stored.is_expired(self.now),
            };

            if visit(item).is_break() {
                break;
            }
        }

        Ok(())
    }
}

/// One entry visited by [`Snapshot::scan`].
#[derive(Debug, Clone, Copy)]
pub struct Item<'a> {
    key: &'a [u8],
    value: Option<&'a [u8]>,
    deleted_or_expired: bool,
}

impl<'a> Item<'a> {
    /// Physical (encoded) key.
    pub fn key(&self) -> &'a [u8] {
        self.key
    }

    /// Value payload, if the scan fetched values.
    pub fn value(&self) -> Option<&'a [u8]> {
        self.value
    }

    pub fn is_deleted_or_expired(&self) -> bool {
        self.deleted_or_expired
    }
}

/// Writes staged inside one write transaction.
pub struct WriteBatch<'txn> {
    table: Table<'txn, &'static [u8], &'static [u8]>,
}

impl WriteBatch<'_> {
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), EngineError> {
        let encoded = encode_value(value, None);
        self.table.insert(key, encoded.as_slice())?;
        Ok(())
    }

    /// Stages a write that expires at `expires_at` (milliseconds since the
    /// Unix epoch).
    pub fn set_with_expiry(
        &mut self,
        key: &[u8],
        value: &[u8],
        expires_at: u64,
    ) -> Result<(), EngineError> {
        let encoded = encode_value(value, Some(expires_at));
        self.table.insert(key, encoded.as_slice())?;
        Ok(())
    }

    /// Removes `key`. Removing an absent key is not an error.
    pub fn delete(&mut self, key: &[u8]) -> Result<(), EngineError> {
        self.table.remove(key)?;
        Ok(())
    }
}
