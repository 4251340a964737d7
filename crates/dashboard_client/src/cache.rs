//! Read-through cache with expiry over the persistent store.
//!
//! Entries are written only for successful, non-empty responses, so a
//! transient "no data yet" reply never occupies a key for a full TTL.

use common::{is_empty_payload, now_millis, Envelope, Error};
use local_store::{KeyValueStore, KeyValueStoreExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Where and for how long a resource is cached.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSpec {
    pub key: String,
    pub ttl: Duration,
    /// Shape version. Entries written under another version are ignored.
    pub version: Option<u32>,
}

impl CacheSpec {
    pub fn new(key: impl Into<String>, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            ttl,
            version: None,
        }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }
}

/// A cached payload and the wall-clock time it was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: Value,
    pub stored_at_millis: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
}

impl CacheEntry {
    pub fn new(value: Value, version: Option<u32>) -> Self {
        Self {
            value,
            stored_at_millis: now_millis(),
            version,
        }
    }

    /// Fresh when younger than the TTL and written under the current version.
    /// Timestamps from the future count as stale.
    pub fn is_fresh(&self, spec: &CacheSpec, now_millis: i64) -> bool {
        let age = now_millis - self.stored_at_millis;
        self.version == spec.version && age >= 0 && (age as u128) < spec.ttl.as_millis()
    }
}

/// Serve `spec.key` from the store when fresh, otherwise call `fetch` and
/// store its payload.
///
/// A failed store write is logged and the live response returned anyway.
/// If `cancel` fires while `fetch` is in flight the result is discarded and
/// nothing is written.
pub async fn with_cache<F, Fut>(
    store: &dyn KeyValueStore,
    spec: &CacheSpec,
    cancel: &CancellationToken,
    fetch: F,
) -> Result<Envelope, Error>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Envelope, Error>>,
{
    with_cache_adapted(store, spec, cancel, Envelope::new, move || async move {
        fetch().await.map(|env| env.data)
    })
    .await
}

/// Like [`with_cache`], normalizing every payload through `adapt`.
///
/// Cached values go through the same adapter as live ones, so an entry
/// written in an older response shape still comes back canonical, and the
/// emptiness test always sees the adapted payload.
pub async fn with_cache_adapted<A, F, Fut>(
    store: &dyn KeyValueStore,
    spec: &CacheSpec,
    cancel: &CancellationToken,
    adapt: A,
    fetch: F,
) -> Result<Envelope, Error>
where
    A: Fn(Value) -> Envelope,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Value, Error>>,
{
    match store.get_as::<CacheEntry>(&spec.key) {
        Some(entry) if entry.is_fresh(spec, now_millis()) => {
            let cached = adapt(entry.value);
            if !cached.is_empty() {
                debug!("Cache hit: {}", spec.key);
                return Ok(cached);
            }
            debug!("Cached value for {} is empty", spec.key);
        }
        Some(_) => debug!("Cache entry for {} is stale", spec.key),
        None => debug!("Cache miss: {}", spec.key),
    }

    let response = adapt(fetch().await?);

    if response.is_empty() {
        debug!("Empty payload for {}; not caching", spec.key);
        return Ok(response);
    }
    if cancel.is_cancelled() {
        debug!("Cancelled before caching {}", spec.key);
        return Err(Error::Cancelled);
    }

    let entry = CacheEntry::new(response.data.clone(), spec.version);
    if let Err(e) = store.set_as(&spec.key, &entry) {
        warn!("Failed to cache {}: {}", spec.key, e);
    }

    Ok(response)
}
