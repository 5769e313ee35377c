//! In-memory store
//!
//! HashMap-based store with RwLock for concurrency.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use crate::error::{StoreError, StoreResult};

use super::Store;

/// A simple in-memory store. Data does not outlive the instance.
///
/// With a quota set, a `set` that would push the total size of keys and
/// values past the limit fails with [`StoreError::QuotaExceeded`] and
/// leaves the store untouched.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<MemoryData>,
    quota: Option<usize>,
}

#[derive(Debug, Default)]
struct MemoryData {
    entries: HashMap<String, Bytes>,

    /// Sum of key and value lengths
    size: usize,
}

impl MemoryStore {
    /// Create an empty, unbounded store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store holding at most `max_bytes` of keys and values
    pub fn with_quota(max_bytes: usize) -> Self {
        Self {
            data: RwLock::new(MemoryData::default()),
            quota: Some(max_bytes),
        }
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.data.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.read().entries.contains_key(key)
    }

    /// Approximate size in bytes (keys + values)
    pub fn size(&self) -> usize {
        self.data.read().size
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        Ok(self.data.read().entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Bytes) -> StoreResult<()> {
        let mut data = self.data.write();

        let old = data.entries.get(key).map(|v| key.len() + v.len()).unwrap_or(0);
        let new_size = data.size - old + key.len() + value.len();

        if let Some(quota) = self.quota {
            if new_size > quota {
                return Err(StoreError::QuotaExceeded(format!(
                    "writing {:?} needs {} bytes, quota is {}",
                    key, new_size, quota
                )));
            }
        }

        data.entries.insert(key.to_string(), value);
        data.size = new_size;
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        let mut data = self.data.write();
        if let Some(value) = data.entries.remove(key) {
            data.size -= key.len() + value.len();
        }
        Ok(())
    }
}
