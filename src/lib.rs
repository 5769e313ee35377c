//! # IndexKV
//!
//! A key registry layered over asynchronous key-value stores that only
//! offer get/set/remove, with:
//! - A registry document tracking every key ever written (live or tombstoned)
//! - A single-writer registry actor, so concurrent writes never lose updates
//! - A reserved key namespace keeping the registry out of reach of callers
//! - A durable file store backed by a checksummed write-ahead log
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      IndexedStore                            │
//! │          get_item / set_item / remove_item                   │
//! └──────────────┬──────────────────────────┬───────────────────┘
//!                │ values                   │ registry updates
//!                │                          ▼
//!                │                 ┌─────────────────┐
//!                │                 │ Registry Writer │
//!                │                 │  (one at a time)│
//!                │                 └────────┬────────┘
//!                ▼                          ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Store (trait)                            │
//! │        MemoryStore      |      FileStore ──► WAL             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use indexkv::{IndexedStore, KeyState, MemoryStore};
//!
//! # #[tokio::main]
//! # async fn main() -> indexkv::Result<()> {
//! let (store, registry) = IndexedStore::with_defaults(MemoryStore::new()).await?;
//! assert!(registry.is_empty());
//!
//! store.set_item("anime/1", "watching").await?;
//! store.remove_item("anime/1").await?;
//!
//! let registry = store.registry().await?;
//! assert_eq!(registry.state("anime/1"), KeyState::Tombstoned);
//! assert_eq!(store.get_item("anime/1").await?, None);
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod wal;
pub mod store;
pub mod registry;
pub mod index;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{IndexError, Result, StoreError, StoreResult};
pub use config::{Config, WalSyncStrategy, RESERVED_PREFIX};
pub use store::{FileStore, MemoryStore, Store};
pub use registry::{KeyState, Presence, Registry};
pub use index::IndexedStore;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of IndexKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
