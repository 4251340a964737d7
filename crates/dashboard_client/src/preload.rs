//! Warm every endpoint cache after an upload.
//!
//! All endpoints are requested concurrently and joined with an all-settle
//! barrier: one failing resource never stops the others, and the dashboard
//! is marked ready once everything has settled.

use common::Error;
use futures_util::future::join_all;
use local_store::{keys, KeyValueStoreExt};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::client::DashboardClient;
use crate::endpoints::Endpoint;

/// Outcome of one preload pass.
#[derive(Debug, Default)]
pub struct PreloadSummary {
    pub warmed: Vec<Endpoint>,
    pub failed: Vec<(Endpoint, Error)>,
    pub elapsed: Duration,
}

impl PreloadSummary {
    pub fn all_warmed(&self) -> bool {
        self.failed.is_empty()
    }
}

impl DashboardClient {
    /// Warm every cache and set the data-ready flag.
    ///
    /// Returns `true` even when individual endpoints failed. Returns `false`
    /// only when the pass itself could not complete: it was cancelled, or
    /// the flag could not be written.
    pub async fn preload_all_data(&self, cancel: &CancellationToken) -> bool {
        match self.try_preload(cancel).await {
            Ok(_) => true,
            Err(e) => {
                error!("Preload aborted: {}", e);
                false
            }
        }
    }

    /// Like [`preload_all_data`](Self::preload_all_data), reporting which
    /// endpoints failed.
    pub async fn try_preload(&self, cancel: &CancellationToken) -> Result<PreloadSummary, Error> {
        let started = Instant::now();
        info!("Preloading {} endpoints", Endpoint::ALL.len());

        let settled = join_all(Endpoint::ALL.into_iter().map(|endpoint| async move {
            (endpoint, self.fetch(endpoint, cancel).await)
        }))
        .await;

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut summary = PreloadSummary::default();
        for (endpoint, outcome) in settled {
            match outcome {
                Ok(_) => summary.warmed.push(endpoint),
                Err(e) => {
                    warn!("Preload of {} failed: {}", endpoint, e);
                    summary.failed.push((endpoint, e));
                }
            }
        }

        self.store().set_as(keys::DATA_READY, &true)?;
        summary.elapsed = started.elapsed();

        info!(
            "Preload finished in {:.1}s: {} warmed, {} failed",
            summary.elapsed.as_secs_f64(),
            summary.warmed.len(),
            summary.failed.len()
        );
        Ok(summary)
    }

    pub fn is_data_ready(&self) -> bool {
        self.store()
            .get_as::<bool>(keys::DATA_READY)
            .unwrap_or(false)
    }
}
