//! Registry Writer
//!
//! Single-writer actor that owns every mutation made through the wrapper.
//!
//! Requests arrive over a bounded channel and are applied one at a time,
//! in arrival order. A mutation writes or removes the value, then re-reads
//! the registry from the store, applies its change and writes the document
//! back only if it changed. Because no two requests overlap, concurrent
//! `set_item`/`remove_item` calls can neither overwrite each other's
//! registry updates nor land their value and registry steps in different
//! orders.

use std::sync::Arc;

use bytes::Bytes;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

use crate::error::{IndexError, Result};
use crate::registry::Registry;
use crate::store::Store;

/// A caller mutation: the value step plus its registry change
#[derive(Debug)]
pub(crate) enum Mutation {
    Set { key: String, value: Bytes },
    Remove { key: String },
}

impl Mutation {
    fn key(&self) -> &str {
        match self {
            Mutation::Set { key, .. } | Mutation::Remove { key } => key,
        }
    }
}

enum RegistryRequest {
    /// Reply: whether the registry document was written back
    Mutate {
        mutation: Mutation,
        reply: oneshot::Sender<Result<bool>>,
    },

    /// Reply: number of tombstones pruned
    Prune { reply: oneshot::Sender<Result<usize>> },

    Snapshot { reply: oneshot::Sender<Result<Registry>> },
}

/// Handle to the writer task. Cloning shares the same queue.
#[derive(Clone)]
pub(crate) struct RegistryWriter {
    tx: mpsc::Sender<RegistryRequest>,
}

impl RegistryWriter {
    /// Spawn the writer task on `runtime`
    ///
    /// The task stops once every handle has been dropped and the queue
    /// has drained.
    pub(crate) fn spawn<S>(
        runtime: &Handle,
        store: Arc<S>,
        registry_key: String,
        capacity: usize,
    ) -> Self
    where
        S: Store + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<RegistryRequest>(capacity);

        runtime.spawn(async move {
            let store = store.as_ref();
            while let Some(request) = rx.recv().await {
                let delivered = match request {
                    RegistryRequest::Mutate { mutation, reply } => reply
                        .send(apply_mutation(store, &registry_key, mutation).await)
                        .is_ok(),
                    RegistryRequest::Prune { reply } => reply
                        .send(prune(store, &registry_key).await)
                        .is_ok(),
                    RegistryRequest::Snapshot { reply } => reply
                        .send(load(store, &registry_key).await.map(|(registry, _)| registry))
                        .is_ok(),
                };
                if !delivered {
                    tracing::trace!("Registry request caller went away before the reply");
                }
            }
            tracing::debug!(registry_key = %registry_key, "Registry writer stopped");
        });

        Self { tx }
    }

    /// Apply `mutation` and wait for it. Returns whether the registry was written.
    ///
    /// Once enqueued, the mutation runs to completion even if the caller
    /// stops waiting.
    pub(crate) async fn mutate(&self, mutation: Mutation) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(RegistryRequest::Mutate { mutation, reply }).await?;
        rx.await.map_err(|_| IndexError::WriterClosed)?
    }

    pub(crate) async fn prune(&self) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.send(RegistryRequest::Prune { reply }).await?;
        rx.await.map_err(|_| IndexError::WriterClosed)?
    }

    /// Registry as seen after every request queued before this one
    pub(crate) async fn snapshot(&self) -> Result<Registry> {
        let (reply, rx) = oneshot::channel();
        self.send(RegistryRequest::Snapshot { reply }).await?;
        rx.await.map_err(|_| IndexError::WriterClosed)?
    }

    async fn send(&self, request: RegistryRequest) -> Result<()> {
        self.tx
            .send(request)
            .await
            .map_err(|_| IndexError::WriterClosed)
    }
}

/// Read the registry; a missing document reads as empty
async fn load<S: Store + ?Sized>(store: &S, registry_key: &str) -> Result<(Registry, bool)> {
    match store.get(registry_key).await? {
        Some(bytes) => Ok((Registry::decode(&bytes)?, false)),
        None => Ok((Registry::new(), true)),
    }
}

async fn apply_mutation<S: Store + ?Sized>(
    store: &S,
    registry_key: &str,
    mutation: Mutation,
) -> Result<bool> {
    let key = mutation.key().to_string();

    let (step, stored) = match &mutation {
        Mutation::Set { key, value } => ("write value", store.set(key, value.clone()).await),
        Mutation::Remove { key } => ("remove value", store.remove(key).await),
    };
    if let Err(e) = stored {
        tracing::warn!(key = %key, step, error = %e, "Mutation failed");
        return Err(e.into());
    }

    match update_registry(store, registry_key, &mutation).await {
        Ok(written) => Ok(written),
        Err(e) => {
            tracing::warn!(key = %key, step = "update registry", error = %e, "Mutation failed");
            Err(e)
        }
    }
}

async fn update_registry<S: Store + ?Sized>(
    store: &S,
    registry_key: &str,
    mutation: &Mutation,
) -> Result<bool> {
    let (mut registry, missing) = load(store, registry_key).await?;

    let changed = match mutation {
        Mutation::Set { key, .. } => registry.mark_present(key),
        Mutation::Remove { key } => registry.mark_tombstoned(key),
    };

    if missing {
        tracing::warn!(registry_key = %registry_key, "Registry document missing, recreating");
    }
    if !changed && !missing {
        return Ok(false);
    }

    store.set(registry_key, registry.encode()?).await?;
    if changed {
        tracing::debug!(key = mutation.key(), "Registry updated");
    }
    Ok(true)
}

async fn prune<S: Store + ?Sized>(store: &S, registry_key: &str) -> Result<usize> {
    let (mut registry, missing) = load(store, registry_key).await?;

    let pruned = registry.prune_tombstones();
    if pruned > 0 || missing {
        store.set(registry_key, registry.encode()?).await?;
    }
    Ok(pruned)
}
