//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries and their
//! on-disk record encoding.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Record header size: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The operation to perform
    pub operation: Operation,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: String, value: Vec<u8> },

    /// Delete a key
    Delete { key: String },
}

impl Operation {
    /// The key this operation touches
    pub fn key(&self) -> &str {
        match self {
            Operation::Put { key, .. } => key,
            Operation::Delete { key } => key,
        }
    }
}

/// Decoded record header
#[derive(Debug, Clone, Copy)]
pub(crate) struct RecordHeader {
    pub lsn: u64,
    pub crc: u32,
    pub len: u32,
}

impl RecordHeader {
    pub(crate) fn parse(bytes: &[u8; HEADER_SIZE]) -> Self {
        let mut lsn = [0u8; 8];
        let mut crc = [0u8; 4];
        let mut len = [0u8; 4];
        lsn.copy_from_slice(&bytes[0..8]);
        crc.copy_from_slice(&bytes[8..12]);
        len.copy_from_slice(&bytes[12..16]);

        Self {
            lsn: u64::from_be_bytes(lsn),
            crc: u32::from_be_bytes(crc),
            len: u32::from_be_bytes(len),
        }
    }
}

impl WalEntry {
    /// Create a new entry stamped with the current time
    pub fn new(lsn: u64, operation: Operation) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            lsn,
            operation,
            timestamp,
        }
    }

    /// Encode as a full record: header + bincode payload
    pub fn serialize(&self) -> StoreResult<Vec<u8>> {
        let payload =
            bincode::serialize(self).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let crc = crc32fast::hash(&payload);

        let mut record = Vec::with_capacity(HEADER_SIZE + payload.len());
        record.extend_from_slice(&self.lsn.to_be_bytes());
        record.extend_from_slice(&crc.to_be_bytes());
        record.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        record.extend_from_slice(&payload);

        Ok(record)
    }

    /// Decode a full record, verifying its checksum
    pub fn deserialize(bytes: &[u8]) -> StoreResult<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(StoreError::WalCorruption(format!(
                "record too short: {} bytes",
                bytes.len()
            )));
        }

        let mut header_bytes = [0u8; HEADER_SIZE];
        header_bytes.copy_from_slice(&bytes[..HEADER_SIZE]);
        let header = RecordHeader::parse(&header_bytes);

        let end = HEADER_SIZE + header.len as usize;
        if bytes.len() < end {
            return Err(StoreError::WalCorruption(format!(
                "payload truncated: expected {} bytes, found {}",
                header.len,
                bytes.len() - HEADER_SIZE
            )));
        }

        Self::decode_payload(&header, &bytes[HEADER_SIZE..end])
    }

    /// Decode a payload whose header has already been read
    pub(crate) fn decode_payload(header: &RecordHeader, payload: &[u8]) -> StoreResult<Self> {
        let actual = crc32fast::hash(payload);
        if actual != header.crc {
            return Err(StoreError::WalCorruption(format!(
                "CRC mismatch at lsn {}: expected {:08x}, got {:08x}",
                header.lsn, header.crc, actual
            )));
        }

        let entry: WalEntry = bincode::deserialize(payload)
            .map_err(|e| StoreError::WalCorruption(format!("undecodable payload: {}", e)))?;

        if entry.lsn != header.lsn {
            return Err(StoreError::WalCorruption(format!(
                "LSN mismatch: header {}, payload {}",
                header.lsn, entry.lsn
            )));
        }

        Ok(entry)
    }

    /// Size in bytes of the full record produced by `serialize`
    pub fn serialized_size(&self) -> StoreResult<usize> {
        let payload_len =
            bincode::serialized_size(self).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(HEADER_SIZE + payload_len as usize)
    }

    /// CRC32 of the encoded payload
    pub fn compute_crc(&self) -> StoreResult<u32> {
        let payload =
            bincode::serialize(self).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(crc32fast::hash(&payload))
    }
}
