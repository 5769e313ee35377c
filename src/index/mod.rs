//! Index Module
//!
//! Wraps a [`Store`] so that every key written through it is recorded in
//! a registry document kept in the same store.
//!
//! ## Data Flow
//! ```text
//!   set_item(k, v)                 remove_item(k)
//!        │                               │
//!        └──────────┐         ┌──────────┘
//!                   ▼         ▼
//!            ┌───────────────────────┐
//!            │    Registry Writer    │  one request at a time,
//!            │  1. value set/remove  │  in arrival order
//!            │  2. read → modify →   │
//!            │     set registry      │
//!            └───────────┬───────────┘
//!                        ▼
//!          store[k], store["__indexkv__/<registry_name>"]
//! ```
//!
//! Both steps of a mutation run inside the writer, so for any key the
//! order of value writes matches the order of registry updates. A
//! concurrent `set_item(k)` and `remove_item(k)` therefore end with the
//! registry agreeing with whichever of the two ran last.
//!
//! `get_item` goes straight to the store.
//!
//! ## Invariants
//! - After `set_item(k, _)` resolves `Ok`, the registry holds `k: true`
//! - After `remove_item(k)` resolves `Ok` for a live `k`, the registry
//!   holds `k: null`; entries are never deleted except by [`IndexedStore::compact`]
//! - The registry document is created on open if absent and never removed

mod writer;

use std::sync::Arc;

use bytes::Bytes;
use tokio::runtime::Handle;

use crate::config::Config;
use crate::error::{IndexError, Result};
use crate::registry::Registry;
use crate::store::Store;

use writer::{Mutation, RegistryWriter};

/// A store whose keys are tracked in a registry document
///
/// Clones share the same store and the same registry writer.
pub struct IndexedStore<S> {
    store: Arc<S>,
    writer: RegistryWriter,
    config: Arc<Config>,
    registry_key: Arc<str>,
}

impl<S> Clone for IndexedStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            writer: self.writer.clone(),
            config: Arc::clone(&self.config),
            registry_key: Arc::clone(&self.registry_key),
        }
    }
}

impl<S: Store + 'static> IndexedStore<S> {
    /// Open the wrapper over `store`
    ///
    /// Must be awaited inside a Tokio runtime: the registry writer is a
    /// task on the current runtime. Outside one, open fails with
    /// [`IndexError::Runtime`] before touching the store.
    ///
    /// On open:
    /// 1. Validate the config and the runtime (no I/O on failure)
    /// 2. Read the registry document
    /// 3. If absent, persist an empty one
    /// 4. Start the registry writer
    ///
    /// Returns the wrapper and the registry as found (or created).
    pub async fn open(store: S, config: Config) -> Result<(Self, Registry)> {
        Self::validate_config(&config)?;
        let runtime = Handle::try_current().map_err(|e| IndexError::Runtime(e.to_string()))?;

        let registry_key = config.registry_key();
        let store = Arc::new(store);

        let registry = match store.get(&registry_key).await {
            Ok(Some(bytes)) => Registry::decode(&bytes)?,
            Ok(None) => {
                let empty = Registry::new();
                if let Err(e) = store.set(&registry_key, empty.encode()?).await {
                    tracing::warn!(registry_key = %registry_key, error = %e, "Failed to create registry");
                    return Err(e.into());
                }
                tracing::info!(registry_key = %registry_key, "Created empty registry");
                empty
            }
            Err(e) => {
                tracing::warn!(registry_key = %registry_key, error = %e, "Failed to read registry");
                return Err(e.into());
            }
        };

        tracing::info!(
            registry_key = %registry_key,
            entries = registry.len(),
            "Indexed store opened"
        );

        let writer = RegistryWriter::spawn(
            &runtime,
            Arc::clone(&store),
            registry_key.clone(),
            config.writer_queue_capacity,
        );

        let indexed = Self {
            store,
            writer,
            config: Arc::new(config),
            registry_key: Arc::from(registry_key),
        };

        Ok((indexed, registry))
    }

    /// Open with the default config
    pub async fn with_defaults(store: S) -> Result<(Self, Registry)> {
        Self::open(store, Config::default()).await
    }

    fn validate_config(config: &Config) -> Result<()> {
        if config.registry_name.is_empty() {
            return Err(IndexError::Validation(
                "registry name must not be empty".to_string(),
            ));
        }
        if config.writer_queue_capacity == 0 {
            return Err(IndexError::Validation(
                "writer queue capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_key(key: &str) -> Result<()> {
        if Config::is_reserved(key) {
            return Err(IndexError::Validation(format!(
                "key {:?} is inside the reserved namespace",
                key
            )));
        }
        Ok(())
    }

    // =========================================================================
    // Item Operations
    // =========================================================================

    /// Read `key` straight from the store
    pub async fn get_item(&self, key: &str) -> Result<Option<Bytes>> {
        Ok(self.store.get(key).await?)
    }

    /// Write `value` under `key`, then record `key` as present
    ///
    /// Steps (each independently failable, a failure aborts the rest):
    /// 1. Write the value
    /// 2. Mark the key present in the registry (written only if it was not)
    ///
    /// Both steps run on the registry writer, after every mutation queued
    /// before this one.
    pub async fn set_item(&self, key: &str, value: impl Into<Bytes>) -> Result<()> {
        Self::validate_key(key)?;

        let written = self
            .writer
            .mutate(Mutation::Set {
                key: key.to_string(),
                value: value.into(),
            })
            .await?;
        tracing::trace!(key, registry_written = written, "set_item done");
        Ok(())
    }

    /// Remove `key` from the store, then tombstone it in the registry
    ///
    /// Keys the registry has never seen stay unknown.
    pub async fn remove_item(&self, key: &str) -> Result<()> {
        Self::validate_key(key)?;

        let written = self
            .writer
            .mutate(Mutation::Remove {
                key: key.to_string(),
            })
            .await?;
        tracing::trace!(key, registry_written = written, "remove_item done");
        Ok(())
    }

    // =========================================================================
    // Registry Operations
    // =========================================================================

    /// Current registry, read after every previously submitted update
    pub async fn registry(&self) -> Result<Registry> {
        self.writer.snapshot().await
    }

    /// Keys currently marked present, in sorted order
    pub async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.registry().await?.live_keys())
    }

    /// Prune every tombstone from the registry, returning how many were dropped
    ///
    /// Never runs on its own; call it once nothing depends on knowing
    /// which keys used to exist.
    pub async fn compact(&self) -> Result<usize> {
        match self.writer.prune().await {
            Ok(pruned) => {
                tracing::info!(pruned, "Registry compacted");
                Ok(pruned)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Registry compaction failed");
                Err(e)
            }
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Store key holding the registry document
    pub fn registry_key(&self) -> &str {
        &self.registry_key
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The wrapped store
    pub fn store(&self) -> &S {
        &self.store
    }
}
