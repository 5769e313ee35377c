//! WAL Recovery
//!
//! Handles crash recovery by replaying the WAL.

use std::fs::OpenOptions;
use std::path::Path;

use crate::error::StoreResult;

use super::reader::{RawRecord, WalReader};
use super::WalEntry;

/// Handles WAL recovery after crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Number of corrupted entries skipped
    pub entries_corrupted: u64,

    /// Last valid LSN
    pub last_lsn: u64,

    /// Whether the WAL was truncated (partial writes removed)
    pub was_truncated: bool,
}

impl WalRecovery {
    /// Recover entries from a WAL file
    ///
    /// This will:
    /// 1. Read all valid entries
    /// 2. Stop at the first corrupted entry (CRC mismatch, or an LSN not
    ///    above the previous one)
    /// 3. Truncate the corrupted entry, partial writes and anything after them
    /// 4. Return all valid entries in order
    pub fn recover(path: &Path) -> StoreResult<(Vec<WalEntry>, RecoveryResult)> {
        let (entries, result, valid_len) = Self::scan(path)?;

        if result.was_truncated {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(valid_len)?;
            file.sync_all()?;
        }

        Ok((entries, result))
    }

    /// Verify integrity of a WAL file without modifying it
    ///
    /// `was_truncated` reports whether `recover` would truncate.
    pub fn verify(path: &Path) -> StoreResult<RecoveryResult> {
        let (_, result, _) = Self::scan(path)?;
        Ok(result)
    }

    /// Read records up to the first damaged one, returning the entries,
    /// stats and the length of the intact prefix
    fn scan(path: &Path) -> StoreResult<(Vec<WalEntry>, RecoveryResult, u64)> {
        let mut reader = WalReader::open(path)?;
        let mut entries = Vec::new();
        let mut result = RecoveryResult::default();

        let valid_len = loop {
            let record_start = reader.position();
            match reader.next_record()? {
                RawRecord::Entry(entry) if entry.lsn <= result.last_lsn => {
                    tracing::warn!(
                        lsn = entry.lsn,
                        previous = result.last_lsn,
                        "Out-of-order WAL entry, discarding the rest of the log"
                    );
                    result.entries_corrupted += 1;
                    result.was_truncated = true;
                    break record_start;
                }
                RawRecord::Entry(entry) => {
                    result.entries_recovered += 1;
                    result.last_lsn = entry.lsn;
                    entries.push(entry);
                }
                RawRecord::Corrupted { lsn, reason } => {
                    tracing::warn!(lsn, %reason, "Corrupted WAL entry, discarding the rest of the log");
                    result.entries_corrupted += 1;
                    result.was_truncated = true;
                    break record_start;
                }
                RawRecord::Torn => {
                    result.was_truncated = true;
                    break record_start;
                }
                RawRecord::End => break record_start,
            }
        };

        Ok((entries, result, valid_len))
    }
}
