//! Configuration for the storage engine.
//!
//! Contains the options used when opening the redb database behind a store.

use std::path::PathBuf;

use crate::engine::EngineError;

/// Options for opening the storage engine.
///
/// The configuration is fixed once the engine is open.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Database file location. `None` keeps everything in memory.
    pub path: Option<PathBuf>,

    /// Open an existing database and reject every write.
    pub read_only: bool,

    /// Make each commit durable before it returns.
    ///
    /// When disabled, commits become durable on the next [`sync`] or on the
    /// next durable commit.
    ///
    /// [`sync`]: crate::BucketStore::sync
    pub sync_on_write: bool,

    /// Page cache size in bytes. `None` uses redb's default.
    pub cache_size: Option<usize>,
}

impl EngineConfig {
    /// Creates a configuration for a database file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::in_memory()
        }
    }

    /// Creates a configuration for a database that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            read_only: false,
            sync_on_write: true,
            cache_size: None,
        }
    }

    /// Set the read-only flag.
    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Set whether every commit is flushed to disk.
    #[must_use]
    pub fn sync_on_write(mut self, sync_on_write: bool) -> Self {
        self.sync_on_write = sync_on_write;
        self
    }

    /// Set the page cache size.
    #[must_use]
    pub fn cache_size(mut self, bytes: usize) -> Self {
        self.cache_size = Some(bytes);
        self
    }

    /// Checks option combinations that redb cannot honour.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.read_only && self.path.is_none() {
            return Err(EngineError::InvalidConfig(
                "read-only mode requires a database path".to_string(),
            ));
        }

        if self.cache_size == Some(0) {
            return Err(EngineError::InvalidConfig(
                "cache size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(config.path.is_none());
        assert!(!config.read_only);
        assert!(config.sync_on_write);
        assert!(config.cache_size.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_setters() {
        let config = EngineConfig::new("/tmp/store.redb")
            .read_only(true)
            .sync_on_write(false)
            .cache_size(1024 * 1024);

        assert_eq!(config.path, Some(PathBuf::from("/tmp/store.redb")));
        assert!(config.read_only);
        assert!(!config.sync_on_write);
        assert_eq!(config.cache_size, Some(1024 * 1024));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_read_only_in_memory_rejected() {
        let config = EngineConfig::in_memory().read_only(true);
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_zero_cache_rejected() {
        let config = EngineConfig::in_memory().cache_size(0);
        assert!(config.validate().is_err());
    }
}
