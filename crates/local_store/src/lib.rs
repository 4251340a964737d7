//! Persistent key-value storage for client-side state.
//!
//! Values are JSON documents stored under string keys. Reads never fail:
//! a missing or unparsable entry is reported as absent, so callers treat
//! corruption as a cache miss.

pub mod file;
pub mod keys;
pub mod memory;

use common::Error;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Synchronous JSON key-value store.
///
/// Every `set` is a full-value replace; there are no partial updates and no
/// cross-key transactions.
pub trait KeyValueStore: Send + Sync {
    /// Stored value, or `None` when missing or corrupt.
    fn get(&self, key: &str) -> Option<Value>;

    fn set(&self, key: &str, value: &Value) -> Result<(), Error>;

    /// Remove a key. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), Error>;
}

/// Typed helpers over any store.
pub trait KeyValueStoreExt: KeyValueStore {
    fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::debug!("Ignoring mistyped value under {}: {}", key, e);
                None
            }
        }
    }

    fn set_as<T: Serialize>(&self, key: &str, value: &T) -> Result<(), Error> {
        let json = serde_json::to_value(value)?;
        self.set(key, &json)
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStoreExt for S {}
