//! Tests for get_item / set_item / remove_item
//!
//! These tests verify:
//! - Registry state after each mutation
//! - Registry writes are skipped when nothing changes
//! - Reserved keys are rejected before any store call
//! - Store failures abort the remaining steps and surface unchanged

use bytes::Bytes;
use indexkv::{IndexError, IndexedStore, KeyState, MemoryStore, Store, StoreError};

use crate::helpers::{registry_key, Call, CountingStore, FailOn, FailingStore};

async fn counting() -> IndexedStore<CountingStore> {
    IndexedStore::with_defaults(CountingStore::new())
        .await
        .unwrap()
        .0
}

async fn failing() -> IndexedStore<FailingStore> {
    IndexedStore::with_defaults(FailingStore::new())
        .await
        .unwrap()
        .0
}

// =============================================================================
// Registry State Tests
// =============================================================================

#[tokio::test]
async fn test_set_marks_present() {
    let indexed = counting().await;

    indexed.set_item("a", "v1").await.unwrap();

    let registry = indexed.registry().await.unwrap();
    assert_eq!(registry.state("a"), KeyState::Present);
    assert_eq!(indexed.get_item("a").await.unwrap(), Some(Bytes::from("v1")));
}

#[tokio::test]
async fn test_remove_tombstones_present_key() {
    let indexed = counting().await;
    indexed.set_item("a", "v1").await.unwrap();

    indexed.remove_item("a").await.unwrap();

    let registry = indexed.registry().await.unwrap();
    assert_eq!(registry.state("a"), KeyState::Tombstoned);
    assert_eq!(registry.len(), 1);
    assert_eq!(indexed.get_item("a").await.unwrap(), None);
}

#[tokio::test]
async fn test_remove_unknown_key_leaves_no_trace() {
    let indexed = counting().await;
    let writes_before = indexed.store().registry_writes();

    indexed.remove_item("never-set").await.unwrap();

    assert_eq!(indexed.store().registry_writes(), writes_before);
    assert_eq!(
        indexed.registry().await.unwrap().state("never-set"),
        KeyState::Unknown
    );
}

#[tokio::test]
async fn test_set_after_remove_revives_key() {
    let indexed = counting().await;
    indexed.set_item("a", "1").await.unwrap();
    indexed.remove_item("a").await.unwrap();

    indexed.set_item("a", "2").await.unwrap();

    assert_eq!(indexed.registry().await.unwrap().state("a"), KeyState::Present);
    assert_eq!(indexed.keys().await.unwrap(), vec!["a".to_string()]);
}

#[tokio::test]
async fn test_second_set_skips_registry_write() {
    let indexed = counting().await;
    let writes_before = indexed.store().registry_writes();

    indexed.set_item("a", "v1").await.unwrap();
    indexed.set_item("a", "v2").await.unwrap();

    assert_eq!(indexed.store().registry_writes() - writes_before, 1);
    assert_eq!(indexed.get_item("a").await.unwrap(), Some(Bytes::from("v2")));
}

#[tokio::test]
async fn test_second_remove_skips_registry_write() {
    let indexed = counting().await;
    indexed.set_item("a", "v1").await.unwrap();
    let writes_before = indexed.store().registry_writes();

    indexed.remove_item("a").await.unwrap();
    indexed.remove_item("a").await.unwrap();

    assert_eq!(indexed.store().registry_writes() - writes_before, 1);
}

#[tokio::test]
async fn test_set_writes_value_before_registry() {
    let indexed = counting().await;
    let skip = indexed.store().call_count();

    indexed.set_item("a", "v1").await.unwrap();

    let calls: Vec<_> = indexed.store().calls().into_iter().skip(skip).collect();
    assert_eq!(
        calls,
        vec![
            Call::Set("a".to_string()),
            Call::Get(registry_key()),
            Call::Set(registry_key()),
        ]
    );
}

#[tokio::test]
async fn test_remove_deletes_value_before_registry() {
    let indexed = counting().await;
    indexed.set_item("a", "v1").await.unwrap();
    let skip = indexed.store().call_count();

    indexed.remove_item("a").await.unwrap();

    let calls: Vec<_> = indexed.store().calls().into_iter().skip(skip).collect();
    assert_eq!(
        calls,
        vec![
            Call::Remove("a".to_string()),
            Call::Get(registry_key()),
            Call::Set(registry_key()),
        ]
    );
}

#[tokio::test]
async fn test_get_item_bypasses_registry() {
    let indexed = counting().await;
    let skip = indexed.store().call_count();

    assert_eq!(indexed.get_item("a").await.unwrap(), None);

    let calls: Vec<_> = indexed.store().calls().into_iter().skip(skip).collect();
    assert_eq!(calls, vec![Call::Get("a".to_string())]);
}

#[tokio::test]
async fn test_set_item_accepts_owned_values() {
    let (indexed, _) = IndexedStore::with_defaults(MemoryStore::new()).await.unwrap();

    indexed.set_item("vec", vec![1u8, 2, 3]).await.unwrap();
    indexed.set_item("string", String::from("text")).await.unwrap();
    indexed.set_item("bytes", Bytes::from_static(b"raw")).await.unwrap();

    assert_eq!(
        indexed.keys().await.unwrap(),
        vec!["bytes".to_string(), "string".to_string(), "vec".to_string()]
    );
    assert_eq!(
        indexed.get_item("vec").await.unwrap(),
        Some(Bytes::from(vec![1u8, 2, 3]))
    );
}

#[tokio::test]
async fn test_lifecycle_scenario() {
    let (indexed, initial) = IndexedStore::with_defaults(CountingStore::new()).await.unwrap();
    assert!(initial.is_empty());
    assert!(indexed.store().inner().contains_key(&registry_key()));

    indexed.set_item("x", r#"{"v":1}"#).await.unwrap();
    let writes_after_first = indexed.store().registry_writes();
    assert_eq!(indexed.registry().await.unwrap().state("x"), KeyState::Present);

    indexed.set_item("x", r#"{"v":2}"#).await.unwrap();
    assert_eq!(indexed.registry().await.unwrap().state("x"), KeyState::Present);
    assert_eq!(indexed.store().registry_writes(), writes_after_first);

    indexed.remove_item("x").await.unwrap();
    let registry = indexed.registry().await.unwrap();
    assert_eq!(registry.state("x"), KeyState::Tombstoned);
    assert_eq!(&registry.encode().unwrap()[..], br#"{"x":null}"#);

    assert_eq!(indexed.get_item("x").await.unwrap(), None);
}

#[tokio::test]
async fn test_remove_on_legacy_false_entry_keeps_document() {
    let store = CountingStore::new();
    store
        .inner()
        .set(&registry_key(), Bytes::from_static(br#"{"k":false}"#))
        .await
        .unwrap();
    store.inner().set("k", Bytes::from_static(b"v")).await.unwrap();
    let (indexed, registry) = IndexedStore::with_defaults(store).await.unwrap();
    assert_eq!(registry.state("k"), KeyState::Tombstoned);

    // `false` already reads as a tombstone, so only the value goes away
    indexed.remove_item("k").await.unwrap();

    assert_eq!(indexed.store().registry_writes(), 0);
    assert_eq!(indexed.get_item("k").await.unwrap(), None);
    assert_eq!(
        indexed.get_item(indexed.registry_key()).await.unwrap(),
        Some(Bytes::from_static(br#"{"k":false}"#))
    );

    // The next write of the key normalizes the document
    indexed.set_item("k", "again").await.unwrap();
    assert_eq!(
        indexed.get_item(indexed.registry_key()).await.unwrap(),
        Some(Bytes::from_static(br#"{"k":true}"#))
    );
}

// =============================================================================
// Reserved Namespace Tests
// =============================================================================

#[tokio::test]
async fn test_reserved_keys_rejected_without_io() {
    let indexed = counting().await;
    let calls_before = indexed.store().call_count();

    let set = indexed.set_item(&registry_key(), "{}").await;
    let remove = indexed.remove_item("__indexkv__/anything").await;

    assert!(matches!(set, Err(IndexError::Validation(_))));
    assert!(matches!(remove, Err(IndexError::Validation(_))));
    assert_eq!(indexed.store().call_count(), calls_before);
}

#[tokio::test]
async fn test_get_item_can_read_registry_document() {
    let indexed = counting().await;
    indexed.set_item("a", "1").await.unwrap();

    let raw = indexed.get_item(indexed.registry_key()).await.unwrap();

    assert_eq!(raw, Some(Bytes::from_static(br#"{"a":true}"#)));
}

// =============================================================================
// Failure Propagation Tests
// =============================================================================

#[tokio::test]
async fn test_failed_value_write_skips_registry() {
    let indexed = failing().await;
    indexed.store().fail(FailOn::Set, "a");

    let err = indexed.set_item("a", "v1").await.unwrap_err();

    assert!(matches!(err, IndexError::Store(StoreError::Backend(_))));
    indexed.store().disarm();
    assert_eq!(indexed.registry().await.unwrap().state("a"), KeyState::Unknown);
}

#[tokio::test]
async fn test_failed_registry_write_surfaces_after_value_written() {
    let indexed = failing().await;
    indexed.store().fail(FailOn::Set, registry_key());

    let err = indexed.set_item("a", "v1").await.unwrap_err();

    assert!(matches!(err.as_store_error(), Some(StoreError::Backend(_))));
    assert!(indexed.store().inner().contains_key("a"));

    indexed.store().disarm();
    assert_eq!(indexed.registry().await.unwrap().state("a"), KeyState::Unknown);

    // A retry completes the registry update
    indexed.set_item("a", "v1").await.unwrap();
    assert_eq!(indexed.registry().await.unwrap().state("a"), KeyState::Present);
}

#[tokio::test]
async fn test_failed_remove_keeps_key_present() {
    let indexed = failing().await;
    indexed.set_item("a", "v1").await.unwrap();
    indexed.store().fail(FailOn::Remove, "a");

    let err = indexed.remove_item("a").await.unwrap_err();

    assert!(matches!(err, IndexError::Store(StoreError::Backend(_))));
    indexed.store().disarm();
    assert_eq!(indexed.registry().await.unwrap().state("a"), KeyState::Present);
    assert_eq!(indexed.get_item("a").await.unwrap(), Some(Bytes::from("v1")));
}

#[tokio::test]
async fn test_failed_get_propagates() {
    let indexed = failing().await;
    indexed.store().fail(FailOn::Get, "a");

    let err = indexed.get_item("a").await.unwrap_err();

    assert!(matches!(err, IndexError::Store(StoreError::Backend(_))));
}

#[tokio::test]
async fn test_quota_error_propagates_unchanged() {
    let (indexed, _) = IndexedStore::with_defaults(MemoryStore::with_quota(64))
        .await
        .unwrap();

    let err = indexed.set_item("big", vec![0u8; 128]).await.unwrap_err();

    assert!(matches!(err, IndexError::Store(StoreError::QuotaExceeded(_))));
    assert!(indexed.keys().await.unwrap().is_empty());
}

// =============================================================================
// Registry Recovery Tests
// =============================================================================

#[tokio::test]
async fn test_missing_registry_is_recreated_on_next_mutation() {
    let indexed = counting().await;
    indexed.set_item("a", "1").await.unwrap();

    indexed.store().remove(&registry_key()).await.unwrap();
    indexed.set_item("b", "2").await.unwrap();

    let registry = indexed.registry().await.unwrap();
    assert_eq!(registry.state("b"), KeyState::Present);
    // What the lost document knew is gone
    assert_eq!(registry.state("a"), KeyState::Unknown);
    assert!(indexed.store().inner().contains_key(&registry_key()));
}

#[tokio::test]
async fn test_missing_registry_recreated_even_without_change() {
    let indexed = counting().await;
    indexed.store().inner().remove(&registry_key()).await.unwrap();

    indexed.remove_item("never-set").await.unwrap();

    assert_eq!(
        indexed.store().inner().get(&registry_key()).await.unwrap(),
        Some(Bytes::from_static(b"{}"))
    );
}
