//! Configuration for IndexKV
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

/// Prefix of the key namespace reserved for IndexKV metadata.
///
/// Caller keys inside this namespace are rejected by the indexed wrapper,
/// so the registry document can never collide with caller data.
pub const RESERVED_PREFIX: &str = "__indexkv__/";

/// Main configuration for an IndexKV instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Registry Configuration
    // -------------------------------------------------------------------------
    /// Name of the registry document inside the reserved namespace
    pub registry_name: String,

    /// Bound of the queue feeding the registry writer task
    pub writer_queue_capacity: usize,

    // -------------------------------------------------------------------------
    // File Store Configuration
    // -------------------------------------------------------------------------
    /// Root directory for the file-backed store
    /// Internal structure:
    ///   {data_dir}/
    ///     └── store.wal        (write-ahead log, replayed on open)
    pub data_dir: PathBuf,

    /// Sync strategy: how often to fsync the WAL
    pub wal_sync_strategy: WalSyncStrategy,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry_name: "async-storage-keys".to_string(),
            writer_queue_capacity: 64,
            data_dir: PathBuf::from("./indexkv_data"),
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Full store key of the registry document
    pub fn registry_key(&self) -> String {
        format!("{}{}", RESERVED_PREFIX, self.registry_name)
    }

    /// Whether `key` falls inside the reserved metadata namespace
    pub fn is_reserved(key: &str) -> bool {
        key.starts_with(RESERVED_PREFIX)
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the registry document name (stored under [`RESERVED_PREFIX`])
    pub fn registry_name(mut self, name: impl Into<String>) -> Self {
        self.config.registry_name = name.into();
        self
    }

    /// Set the registry writer queue capacity
    pub fn writer_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.writer_queue_capacity = capacity;
        self
    }

    /// Set the data directory (root for the file store)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
