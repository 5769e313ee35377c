//! Key Registry
//!
//! The index of every key ever written through the wrapper, stored in the
//! backing store as an ordinary JSON document:
//!
//! ```text
//! { "anime/1": true, "anime/2": null }
//! ```
//!
//! `true` means the key is live, `null` means it was written once and has
//! since been removed (a tombstone). Keys missing from the document were
//! never touched.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{IndexError, Result};

/// Flag stored for a key in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// The key currently holds a value
    Present,

    /// The key held a value once and has been removed
    Tombstoned,
}

/// Tri-state answer to "what does the registry know about this key?"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Present,
    Tombstoned,

    /// Never written through the wrapper
    Unknown,
}

impl Serialize for Presence {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Presence::Present => serializer.serialize_bool(true),
            Presence::Tombstoned => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Presence {
    // `false` never comes from this crate; it is read as "not present"
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match Option::<bool>::deserialize(deserializer)? {
            Some(true) => Ok(Presence::Present),
            Some(false) | None => Ok(Presence::Tombstoned),
        }
    }
}

/// In-memory copy of the registry document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Registry {
    entries: BTreeMap<String, Presence>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the state of `key`
    pub fn state(&self, key: &str) -> KeyState {
        match self.entries.get(key) {
            Some(Presence::Present) => KeyState::Present,
            Some(Presence::Tombstoned) => KeyState::Tombstoned,
            None => KeyState::Unknown,
        }
    }

    /// Mark `key` live. Returns whether the document changed.
    pub fn mark_present(&mut self, key: &str) -> bool {
        match self.entries.get_mut(key) {
            Some(Presence::Present) => false,
            Some(flag) => {
                *flag = Presence::Present;
                true
            }
            None => {
                self.entries.insert(key.to_string(), Presence::Present);
                true
            }
        }
    }

    /// Tombstone `key` if it is live. Returns whether the document changed.
    ///
    /// Unknown keys stay unknown: removing a key that was never written
    /// through the wrapper leaves no trace.
    pub fn mark_tombstoned(&mut self, key: &str) -> bool {
        match self.entries.get_mut(key) {
            Some(flag) if *flag == Presence::Present => {
                *flag = Presence::Tombstoned;
                true
            }
            _ => false,
        }
    }

    /// Drop every tombstone, returning how many were removed
    pub fn prune_tombstones(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, flag| *flag == Presence::Present);
        before - self.entries.len()
    }

    /// Live keys in sorted order
    pub fn live_keys(&self) -> Vec<String> {
        self.keys_with(Presence::Present)
    }

    /// Tombstoned keys in sorted order
    pub fn tombstoned_keys(&self) -> Vec<String> {
        self.keys_with(Presence::Tombstoned)
    }

    fn keys_with(&self, wanted: Presence) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, flag)| **flag == wanted)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Iterate over every entry, tombstones included
    pub fn iter(&self) -> impl Iterator<Item = (&str, Presence)> {
        self.entries.iter().map(|(key, flag)| (key.as_str(), *flag))
    }

    /// Number of entries, tombstones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode as the stored JSON document
    pub fn encode(&self) -> Result<Bytes> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(|e| IndexError::Serialization(e.to_string()))
    }

    /// Decode the stored JSON document
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| IndexError::Serialization(e.to_string()))
    }
}

impl FromIterator<(String, Presence)> for Registry {
    fn from_iter<I: IntoIterator<Item = (String, Presence)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
