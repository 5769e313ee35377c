//! Store Module
//!
//! The capability contract every backing store must satisfy, plus the
//! backends shipped with the crate.
//!
//! ## Contract
//! - `get`: value or `None` (absent)
//! - `set`: completion, may fail with an I/O or quota error
//! - `remove`: completion, removing an absent key is not an error
//!
//! No atomicity across keys and no transactions are assumed. Each call is
//! independently failable.
//!
//! ## Backends
//! - [`MemoryStore`]: in-process map, optional byte quota
//! - [`FileStore`]: in-memory map made durable by a write-ahead log
//!
//! A type that lacks any of the three operations is not a `Store` and is
//! rejected at compile time:
//!
//! ```compile_fail
//! use indexkv::{Config, IndexedStore};
//!
//! struct ReadOnly;
//!
//! impl ReadOnly {
//!     async fn get(&self, _key: &str) -> Option<bytes::Bytes> { None }
//!     async fn set(&self, _key: &str, _value: bytes::Bytes) {}
//! }
//!
//! async fn open() {
//!     let _ = IndexedStore::open(ReadOnly, Config::default()).await;
//! }
//! ```

mod file;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StoreResult;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Asynchronous key-value store with get/set/remove only
#[async_trait]
pub trait Store: Send + Sync {
    /// Read the value stored under `key`
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>>;

    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: Bytes) -> StoreResult<()>;

    /// Remove `key`; a no-op if it is absent
    async fn remove(&self, key: &str) -> StoreResult<()>;
}

#[async_trait]
impl<S: Store + ?Sized> Store for Arc<S> {
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: Bytes) -> StoreResult<()> {
        (**self).set(key, value).await
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        (**self).remove(key).await
    }
}
