//! WAL Writer
//!
//! Handles appending entries to the WAL file.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::config::WalSyncStrategy;
use crate::error::{StoreError, StoreResult};

use super::{Operation, WalEntry, WalRecovery};

/// Writes entries to the WAL file
///
/// Each record goes straight to the file in a single `write_all`. If that
/// fails, the file is cut back to the last complete record so a failed
/// append never resurfaces on replay. If the cut itself fails the writer
/// is poisoned and refuses every later append.
pub struct WalWriter {
    /// Location of the log file
    path: PathBuf,

    /// Append-mode handle
    file: File,

    /// Length of the log up to the last complete record
    len: u64,

    /// LSN the next appended entry will get
    next_lsn: u64,

    /// When to fsync
    sync_strategy: WalSyncStrategy,

    /// Entries appended since the last fsync
    uncommitted: usize,

    /// Set when a failed append could not be rolled back
    poisoned: bool,

    /// Fail the next append after writing this many bytes of it
    #[cfg(test)]
    pub(crate) fail_after: Option<usize>,
}

impl WalWriter {
    /// Open or create a WAL file for appending
    ///
    /// An existing log continues from its last LSN. A log with a torn or
    /// corrupted tail is refused: run [`WalRecovery::recover`] first.
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> StoreResult<Self> {
        let next_lsn = if path.exists() {
            let result = WalRecovery::verify(path)?;
            if result.was_truncated {
                return Err(StoreError::WalCorruption(format!(
                    "{} has a damaged tail, recover it before appending",
                    path.display()
                )));
            }
            result.last_lsn + 1
        } else {
            1
        };

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let len = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            len,
            next_lsn,
            sync_strategy,
            uncommitted: 0,
            poisoned: false,
            #[cfg(test)]
            fail_after: None,
        })
    }

    /// Append an operation to the WAL, returning its LSN
    ///
    /// On error the LSN is not consumed and the log holds no trace of
    /// the record.
    pub fn append(&mut self, operation: Operation) -> StoreResult<u64> {
        if self.poisoned {
            return Err(StoreError::WalWrite(format!(
                "{} is poisoned by an earlier failed append",
                self.path.display()
            )));
        }

        let lsn = self.next_lsn;
        let record = WalEntry::new(lsn, operation).serialize()?;

        if let Err(e) = self.write_record(&record) {
            self.rollback();
            return Err(StoreError::WalWrite(format!("lsn {}: {}", lsn, e)));
        }

        self.len += record.len() as u64;
        self.next_lsn += 1;
        self.uncommitted += 1;

        let due = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.uncommitted >= count.max(1),
        };
        if due {
            self.sync()?;
        }

        Ok(lsn)
    }

    #[cfg(not(test))]
    fn write_record(&mut self, record: &[u8]) -> io::Result<()> {
        self.file.write_all(record)
    }

    #[cfg(test)]
    fn write_record(&mut self, record: &[u8]) -> io::Result<()> {
        if let Some(limit) = self.fail_after.take() {
            self.file.write_all(&record[..limit.min(record.len())])?;
            return Err(io::Error::new(io::ErrorKind::Other, "injected write failure"));
        }
        self.file.write_all(record)
    }

    /// Cut the file back to the last complete record
    fn rollback(&mut self) {
        if let Err(e) = self.file.set_len(self.len) {
            tracing::error!(
                path = %self.path.display(),
                error = %e,
                "Failed to roll back a partial WAL record, refusing further appends"
            );
            self.poisoned = true;
        }
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> StoreResult<()> {
        self.file.sync_all()?;
        self.uncommitted = 0;
        Ok(())
    }

    /// Discard every entry and restart LSNs from 1
    pub fn truncate(&mut self) -> StoreResult<()> {
        self.file.set_len(0)?;
        self.file.sync_all()?;

        self.len = 0;
        self.next_lsn = 1;
        self.uncommitted = 0;
        self.poisoned = false;
        Ok(())
    }

    /// Point the writer at the path its file was renamed to
    ///
    /// The open handle follows the rename, so appends keep landing in the
    /// same file.
    pub(crate) fn relocate(&mut self, path: &Path, sync_strategy: WalSyncStrategy) {
        self.path = path.to_path_buf();
        self.sync_strategy = sync_strategy;
    }

    /// LSN the next appended entry will get
    pub fn current_lsn(&self) -> u64 {
        self.next_lsn
    }

    /// Entries appended since the last fsync
    pub fn uncommitted_count(&self) -> usize {
        self.uncommitted
    }

    /// Whether a failed append left the writer unusable
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }
}
