//! On-disk record encoding: header fields and payload validation

use indexkv::wal::{WalEntry, HEADER_SIZE};
use indexkv::StoreError;

use crate::{delete, put, record};

#[test]
fn test_header_describes_payload() {
    let bytes = record(42, put("anime/7", b"{\"ep\":3}"));

    let lsn = u64::from_be_bytes(bytes[0..8].try_into().unwrap());
    let crc = u32::from_be_bytes(bytes[8..12].try_into().unwrap());
    let len = u32::from_be_bytes(bytes[12..16].try_into().unwrap()) as usize;

    assert_eq!(lsn, 42);
    assert_eq!(len, bytes.len() - HEADER_SIZE);
    assert_eq!(crc, crc32fast::hash(&bytes[HEADER_SIZE..]));
}

#[test]
fn test_decode_returns_the_logged_operation() {
    let entry = WalEntry::new(3, delete("gone"));
    let decoded = WalEntry::deserialize(&entry.serialize().unwrap()).unwrap();

    assert_eq!(decoded, entry);
    assert_eq!(decoded.serialized_size().unwrap(), entry.serialize().unwrap().len());
}

#[test]
fn test_damaged_records_are_rejected() {
    let good = record(1, put("k", b"value"));

    let mut flipped = good.clone();
    let last = flipped.len() - 1;
    flipped[last] ^= 0x01;

    // Header claims LSN 9, payload says 1; the checksum still matches
    let mut renumbered = good.clone();
    renumbered[7] = 9;

    let cut = good[..HEADER_SIZE + 2].to_vec();

    for (name, bytes) in [("flipped", flipped), ("renumbered", renumbered), ("cut", cut)] {
        let result = WalEntry::deserialize(&bytes);
        assert!(
            matches!(result, Err(StoreError::WalCorruption(_))),
            "{} record was accepted",
            name
        );
    }
}
