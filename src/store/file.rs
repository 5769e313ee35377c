//! File-backed store
//!
//! Keeps every live key in memory and makes each mutation durable by
//! appending it to a write-ahead log first.
//!
//! ## Lifecycle
//! 1. `open`: create the data directory, recover the WAL, replay it
//! 2. `set`/`remove`: WAL append, then in-memory update
//! 3. `compact`: rewrite the WAL with one `Put` per live key
//!
//! Inside a Tokio runtime the WAL work of `set`/`remove` runs on the
//! blocking pool, so fsyncs never stall the async workers.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::config::{Config, WalSyncStrategy};
use crate::error::{StoreError, StoreResult};
use crate::wal::{Operation, RecoveryResult, WalRecovery, WalWriter};

use super::Store;

/// Durable store over a single WAL file
///
/// ## Concurrency
/// `inner` is a single mutex: the WAL append and the map update of one
/// mutation happen together, so the log order always matches the
/// in-memory order.
pub struct FileStore {
    data_dir: PathBuf,
    wal_path: PathBuf,
    sync_strategy: WalSyncStrategy,
    inner: Arc<Mutex<FileStoreInner>>,
}

struct FileStoreInner {
    wal: WalWriter,
    entries: BTreeMap<String, Bytes>,
}

impl FileStoreInner {
    fn set(&mut self, key: String, value: Bytes) -> StoreResult<()> {
        self.wal.append(Operation::Put {
            key: key.clone(),
            value: value.to_vec(),
        })?;
        self.entries.insert(key, value);
        Ok(())
    }

    fn remove(&mut self, key: String) -> StoreResult<()> {
        if !self.entries.contains_key(&key) {
            return Ok(());
        }
        self.wal.append(Operation::Delete { key: key.clone() })?;
        self.entries.remove(&key);
        Ok(())
    }
}

impl FileStore {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "store.wal";
    const COMPACT_FILENAME: &'static str = "store.wal.compact";

    /// Open or create a store in `config.data_dir`
    pub fn open(config: &Config) -> StoreResult<Self> {
        fs::create_dir_all(&config.data_dir)?;
        let wal_path = config.data_dir.join(Self::WAL_FILENAME);

        let mut entries = BTreeMap::new();

        if wal_path.exists() {
            let (log, result) = WalRecovery::recover(&wal_path)?;
            Self::log_recovery(&result);

            for entry in log {
                match entry.operation {
                    Operation::Put { key, value } => {
                        entries.insert(key, Bytes::from(value));
                    }
                    Operation::Delete { key } => {
                        entries.remove(&key);
                    }
                }
            }
        }

        let wal = WalWriter::open(&wal_path, config.wal_sync_strategy)?;

        Ok(Self {
            data_dir: config.data_dir.clone(),
            wal_path,
            sync_strategy: config.wal_sync_strategy,
            inner: Arc::new(Mutex::new(FileStoreInner { wal, entries })),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> StoreResult<Self> {
        let config = Config::builder().data_dir(path).build();
        Self::open(&config)
    }

    fn log_recovery(result: &RecoveryResult) {
        if result.entries_recovered > 0 || result.entries_corrupted > 0 || result.was_truncated {
            tracing::info!(
                recovered = result.entries_recovered,
                corrupted = result.entries_corrupted,
                last_lsn = result.last_lsn,
                truncated = result.was_truncated,
                "WAL recovery finished"
            );
        }
    }

    /// Rewrite the log so it holds exactly one `Put` per live key
    ///
    /// The new log is written and synced beside the old one, then renamed
    /// over it. Until the rename succeeds the old log and its writer stay
    /// in use; after it, the writer of the new log takes over.
    ///
    /// Blocks on file I/O.
    pub fn compact(&self) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        let compact_path = self.data_dir.join(Self::COMPACT_FILENAME);
        if compact_path.exists() {
            fs::remove_file(&compact_path)?;
        }

        let mut writer = WalWriter::open(
            &compact_path,
            WalSyncStrategy::EveryNEntries { count: usize::MAX },
        )?;
        for (key, value) in inner.entries.iter() {
            writer.append(Operation::Put {
                key: key.clone(),
                value: value.to_vec(),
            })?;
        }
        writer.sync()?;

        fs::rename(&compact_path, &self.wal_path)?;
        writer.relocate(&self.wal_path, self.sync_strategy);
        inner.wal = writer;
        sync_dir(&self.data_dir)?;

        tracing::info!(live_keys = inner.entries.len(), "WAL compacted");
        Ok(())
    }

    /// Force the WAL to disk
    pub fn sync(&self) -> StoreResult<()> {
        self.inner.lock().wal.sync()
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All live keys in sorted order
    pub fn keys(&self) -> Vec<String> {
        self.inner.lock().entries.keys().cloned().collect()
    }

    /// LSN the next logged mutation will get
    pub fn current_lsn(&self) -> u64 {
        self.inner.lock().wal.current_lsn()
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn wal_path(&self) -> &Path {
        &self.wal_path
    }

    /// Run `op` against the locked state, off the async workers when a
    /// runtime is available
    async fn with_inner<T, F>(&self, op: F) -> StoreResult<T>
    where
        F: FnOnce(&mut FileStoreInner) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let inner = Arc::clone(&self.inner);
                handle
                    .spawn_blocking(move || {
                        let mut guard = inner.lock();
                        op(&mut *guard)
                    })
                    .await
                    .map_err(|e| StoreError::Backend(format!("WAL task failed: {}", e)))?
            }
            Err(_) => {
                let mut guard = self.inner.lock();
                op(&mut *guard)
            }
        }
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> StoreResult<()> {
    fs::File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> StoreResult<()> {
    Ok(())
}

#[async_trait]
impl Store for FileStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        Ok(self.inner.lock().entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Bytes) -> StoreResult<()> {
        let key = key.to_string();
        self.with_inner(move |inner| inner.set(key, value)).await
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        let key = key.to_string();
        self.with_inner(move |inner| inner.remove(key)).await
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        if let Err(e) = self.inner.lock().wal.sync() {
            tracing::warn!(error = %e, "Failed to sync WAL on close");
        }
    }
}
