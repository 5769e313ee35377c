//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::{StoreError, StoreResult};

use super::entry::RecordHeader;
use super::{WalEntry, HEADER_SIZE};

/// Outcome of reading one record
#[derive(Debug)]
pub(crate) enum RawRecord {
    /// A well-formed entry
    Entry(WalEntry),

    /// A complete record whose payload failed validation
    Corrupted { lsn: u64, reason: String },

    /// The file ends in the middle of a record
    Torn,

    /// Clean end of file on a record boundary
    End,
}

/// Reads entries from the WAL file
pub struct WalReader {
    reader: BufReader<File>,

    /// Byte offset of the next record
    position: u64,

    /// Total file length, used to spot impossible record lengths
    file_len: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> StoreResult<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();

        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
            file_len,
        })
    }

    /// Read the next entry from the WAL
    ///
    /// Returns `Ok(None)` at end of file, including a partially written
    /// last record. A complete record that fails validation is reported as
    /// `WalCorruption`.
    pub fn next_entry(&mut self) -> StoreResult<Option<WalEntry>> {
        match self.next_record()? {
            RawRecord::Entry(entry) => Ok(Some(entry)),
            RawRecord::End | RawRecord::Torn => Ok(None),
            RawRecord::Corrupted { lsn, reason } => Err(StoreError::WalCorruption(format!(
                "entry at lsn {}: {}",
                lsn, reason
            ))),
        }
    }

    /// Iterate over all entries
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            done: false,
        }
    }

    /// Byte offset just past the last complete record read
    pub fn position(&self) -> u64 {
        self.position
    }

    pub(crate) fn next_record(&mut self) -> StoreResult<RawRecord> {
        let mut header_bytes = [0u8; HEADER_SIZE];
        match read_full(&mut self.reader, &mut header_bytes)? {
            0 => return Ok(RawRecord::End),
            n if n < HEADER_SIZE => return Ok(RawRecord::Torn),
            _ => {}
        }

        let header = RecordHeader::parse(&header_bytes);
        let remaining = self
            .file_len
            .saturating_sub(self.position + HEADER_SIZE as u64);
        if header.len as u64 > remaining {
            return Ok(RawRecord::Torn);
        }

        let mut payload = vec![0u8; header.len as usize];
        if read_full(&mut self.reader, &mut payload)? < payload.len() {
            return Ok(RawRecord::Torn);
        }
        self.position += (HEADER_SIZE + payload.len()) as u64;

        match WalEntry::decode_payload(&header, &payload) {
            Ok(entry) => Ok(RawRecord::Entry(entry)),
            Err(e) => Ok(RawRecord::Corrupted {
                lsn: header.lsn,
                reason: e.to_string(),
            }),
        }
    }
}

/// Read until `buf` is full or EOF, returning the number of bytes read
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> StoreResult<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

/// Iterator over WAL entries
///
/// Stops after the first error.
pub struct WalIterator {
    reader: WalReader,
    done: bool,
}

impl Iterator for WalIterator {
    type Item = StoreResult<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
