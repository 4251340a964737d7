//! Client facade: one method per backend resource.
//!
//! Every cached read is `retry(cache(get))`. The store and transport are
//! injected, so tests run against an in-memory store and a scripted backend.

use common::{
    AnalysisSummary, BottleneckRecord, ChartPoint, DashboardConfig, Envelope, Error,
    ForecastResult, MetricPoint, ReorderRecommendation, SupplierCluster, UploadResponse,
};
use local_store::{JsonFileStore, KeyValueStore};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::{with_cache_adapted, CacheSpec};
use crate::endpoints::{
    Endpoint, DOWNLOAD_RECOMMENDATIONS_PATH, RECOMMENDATIONS_FILE_NAME, UPLOAD_PATH,
};
use crate::forecast::DuplicateSeriesPerturbation;
use crate::http::{ReqwestTransport, Transport};
use crate::retry::RetryPolicy;

#[derive(Clone)]
pub struct DashboardClient {
    transport: Arc<dyn Transport>,
    store: Arc<dyn KeyValueStore>,
    policy: RetryPolicy,
    default_ttl: Duration,
    forecast_ttl: Duration,
    request_timeout: Duration,
    forecast_timeout: Duration,
    upload_timeout: Duration,
    perturbation: Option<DuplicateSeriesPerturbation>,
}

impl DashboardClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<dyn KeyValueStore>,
        cfg: &DashboardConfig,
    ) -> Self {
        Self {
            transport,
            store,
            policy: RetryPolicy::from(&cfg.retry),
            default_ttl: cfg.cache.default_ttl(),
            forecast_ttl: cfg.cache.forecast_ttl(),
            request_timeout: cfg.timeouts.request(),
            forecast_timeout: cfg.timeouts.forecast(),
            upload_timeout: cfg.timeouts.upload(),
            perturbation: DuplicateSeriesPerturbation::from_config(&cfg.forecast),
        }
    }

    /// HTTP transport to `cfg.api_url` and a file store in `cfg.store_dir`.
    pub fn from_config(cfg: &DashboardConfig) -> Result<Self, Error> {
        let transport = ReqwestTransport::new(&cfg.api_url)?;
        let store = JsonFileStore::open(&cfg.store_dir)?;
        Ok(Self::new(Arc::new(transport), Arc::new(store), cfg))
    }

    /// Replace the default retry policy.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    pub fn cache_spec(&self, endpoint: Endpoint) -> CacheSpec {
        let ttl = if endpoint.is_forecast() {
            self.forecast_ttl
        } else {
            self.default_ttl
        };
        CacheSpec {
            key: endpoint.cache_key().to_string(),
            ttl,
            version: endpoint.cache_version(),
        }
    }

    pub fn timeout(&self, endpoint: Endpoint) -> Duration {
        if endpoint.is_forecast() {
            self.forecast_timeout
        } else {
            self.request_timeout
        }
    }

    // ── Generic reads ─────────────────────────────────────────────────

    /// Fetch an endpoint under the client's retry policy.
    pub async fn fetch(
        &self,
        endpoint: Endpoint,
        cancel: &CancellationToken,
    ) -> Result<Envelope, Error> {
        self.fetch_with_policy(endpoint, &self.policy, cancel).await
    }

    /// Fetch an endpoint under an explicit retry policy.
    pub async fn fetch_with_policy(
        &self,
        endpoint: Endpoint,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<Envelope, Error> {
        let spec = self.cache_spec(endpoint);
        let timeout = self.timeout(endpoint);
        let store = self.store.as_ref();
        let transport = self.transport.as_ref();
        let path = endpoint.path();

        policy
            .run(cancel, || {
                with_cache_adapted(
                    store,
                    &spec,
                    cancel,
                    |raw| endpoint.adapt(raw),
                    move || transport.get_json(path, timeout),
                )
            })
            .await
    }

    async fn fetch_as<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        cancel: &CancellationToken,
    ) -> Result<T, Error> {
        let envelope = self.fetch(endpoint, cancel).await?;
        envelope.decode::<T>().map_err(|e| {
            debug!("Decoding {} failed: {}", endpoint, e);
            Error::MalformedPayload {
                path: endpoint.path().to_string(),
                reason: e.to_string(),
            }
        })
    }

    // ── Analysis ──────────────────────────────────────────────────────

    pub async fn analysis_summary(
        &self,
        cancel: &CancellationToken,
    ) -> Result<AnalysisSummary, Error> {
        self.fetch_as(Endpoint::AnalysisSummary, cancel).await
    }

    pub async fn monthly_orders_chart(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<ChartPoint>, Error> {
        self.fetch_as(Endpoint::MonthlyOrders, cancel).await
    }

    pub async fn top_categories_chart(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<ChartPoint>, Error> {
        self.fetch_as(Endpoint::TopCategories, cancel).await
    }

    pub async fn delivery_delay_chart(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<ChartPoint>, Error> {
        self.fetch_as(Endpoint::DeliveryDelay, cancel).await
    }

    pub async fn seller_shipping_chart(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<ChartPoint>, Error> {
        self.fetch_as(Endpoint::SellerShipping, cancel).await
    }

    pub async fn shipping_cost_category_chart(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<ChartPoint>, Error> {
        self.fetch_as(Endpoint::ShippingCostCategory, cancel).await
    }

    // ── Forecast ──────────────────────────────────────────────────────

    /// Per-category demand forecasts.
    ///
    /// The duplicate-series workaround, when enabled, runs on the returned
    /// copy; the cache keeps the backend payload untouched.
    pub async fn demand_forecast(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<ForecastResult>, Error> {
        let mut results: Vec<ForecastResult> =
            self.fetch_as(Endpoint::DemandForecast, cancel).await?;
        if let Some(p) = &self.perturbation {
            p.apply(&mut results);
        }
        Ok(results)
    }

    // ── Reorder ───────────────────────────────────────────────────────

    pub async fn reorder_strategy(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<ReorderRecommendation>, Error> {
        self.fetch_as(Endpoint::ReorderStrategy, cancel).await
    }

    pub async fn top_reorder_points(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<MetricPoint>, Error> {
        self.fetch_as(Endpoint::TopReorder, cancel).await
    }

    pub async fn top_safety_stock(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<MetricPoint>, Error> {
        self.fetch_as(Endpoint::TopSafetyStock, cancel).await
    }

    pub async fn top_lead_time(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<MetricPoint>, Error> {
        self.fetch_as(Endpoint::TopLeadTime, cancel).await
    }

    pub async fn top_inventory(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<MetricPoint>, Error> {
        self.fetch_as(Endpoint::TopInventory, cancel).await
    }

    pub async fn top_holding_cost(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<MetricPoint>, Error> {
        self.fetch_as(Endpoint::TopHoldingCost, cancel).await
    }

    pub async fn top_potential_saving(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<MetricPoint>, Error> {
        self.fetch_as(Endpoint::TopPotentialSaving, cancel).await
    }

    pub async fn supplier_clustering(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<SupplierCluster>, Error> {
        self.fetch_as(Endpoint::SupplierClustering, cancel).await
    }

    pub async fn bottleneck_analysis(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<BottleneckRecord>, Error> {
        self.fetch_as(Endpoint::Bottlenecks, cancel).await
    }

    // ── Uncached ──────────────────────────────────────────────────────

    /// Send one file to `POST /upload/`. Not cached and not retried.
    pub async fn upload_file(
        &self,
        file_name: &str,
        mime_type: &str,
        contents: Vec<u8>,
    ) -> Result<UploadResponse, Error> {
        let raw = self
            .transport
            .post_file(UPLOAD_PATH, file_name, mime_type, contents, self.upload_timeout)
            .await?;
        Ok(serde_json::from_value(raw)?)
    }

    /// Download the recommendations spreadsheet into `dest_dir`.
    pub async fn download_recommendations(
        &self,
        dest_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, Error> {
        let transport = self.transport.as_ref();
        let timeout = self.request_timeout;
        let bytes = self
            .policy
            .run(cancel, || transport.get_bytes(DOWNLOAD_RECOMMENDATIONS_PATH, timeout))
            .await?;

        tokio::fs::create_dir_all(dest_dir).await?;
        let path = dest_dir.join(RECOMMENDATIONS_FILE_NAME);
        tokio::fs::write(&path, &bytes).await?;

        info!("Saved {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }
}
