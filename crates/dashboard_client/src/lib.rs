//! Resilient client for the supply-chain analytics backend.
//!
//! Every resource is fetched as `retry(cache(http_get))`: a read-through
//! cache over a persistent key-value store, wrapped in exponential backoff.
//! After an upload batch the preload orchestrator warms every cache so the
//! dashboard opens from local data.

pub mod cache;
pub mod client;
pub mod endpoints;
pub mod forecast;
pub mod http;
pub mod preload;
pub mod retry;
pub mod uploads;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{with_cache, with_cache_adapted, CacheEntry, CacheSpec};
pub use client::DashboardClient;
pub use endpoints::Endpoint;
pub use forecast::DuplicateSeriesPerturbation;
pub use http::{ReqwestTransport, Transport};
pub use preload::PreloadSummary;
pub use retry::RetryPolicy;
pub use uploads::{FileDescriptor, FileOutcome, FileStatus, UploadPhase, UploadReport};

pub use tokio_util::sync::CancellationToken;
