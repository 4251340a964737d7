//! In-memory store, used in tests and for ephemeral sessions.

use common::Error;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

use crate::KeyValueStore;

/// Store backed by a shared `DashMap` of serialized JSON text.
///
/// Values are kept as text so a corrupt entry behaves like it does on disk.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write raw text under a key, bypassing serialization.
    pub fn set_raw(&self, key: &str, raw: impl Into<String>) {
        self.entries.insert(key.to_string(), raw.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        let raw = self.entries.get(key)?;
        match serde_json::from_str(raw.value()) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::debug!("Corrupt entry under {}: {}", key, e);
                None
            }
        }
    }

    fn set(&self, key: &str, value: &Value) -> Result<(), Error> {
        let raw = serde_json::to_string(value)?;
        self.entries.insert(key.to_string(), raw);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_missing_is_none() {
        let store = MemoryStore::new();
        assert!(store.get("nope").is_none());
    }

    #[test]
    fn test_corrupt_entry_is_none() {
        let store = MemoryStore::new();
        store.set_raw("topReorderPoints", "{\"value\": [1, 2");
        assert!(store.get("topReorderPoints").is_none());
    }

    #[test]
    fn test_set_replaces_whole_value() {
        let store = MemoryStore::new();
        store.set("k", &json!({"a": 1, "b": 2})).unwrap();
        store.set("k", &json!({"a": 3})).unwrap();
        assert_eq!(store.get("k"), Some(json!({"a": 3})));
    }

    #[test]
    fn test_clones_share_entries() {
        let store = MemoryStore::new();
        let other = store.clone();
        other.set("k", &json!(true)).unwrap();
        assert_eq!(store.get("k"), Some(json!(true)));
        store.remove("k").unwrap();
        assert!(other.is_empty());
    }
}
