//! Resource types shared across the client.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// ── Envelope ──────────────────────────────────────────────────────────

/// Canonical `{ "data": ... }` wrapper every endpoint resolves to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub data: Value,
}

impl Envelope {
    pub fn new(data: Value) -> Self {
        Self { data }
    }

    /// True when the payload is "no data yet": an empty array, or an object
    /// wrapping an empty array under `data`.
    pub fn is_empty(&self) -> bool {
        is_empty_payload(&self.data)
    }

    /// Deserialize the payload into a typed resource.
    pub fn decode<T: serde::de::DeserializeOwned>(self) -> crate::Result<T> {
        Ok(serde_json::from_value(self.data)?)
    }
}

/// Emptiness test shared by the cache read and write paths.
///
/// Both legacy placements are checked: `[]` and `{"data": []}`.
pub fn is_empty_payload(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => matches!(map.get("data"), Some(Value::Array(items)) if items.is_empty()),
        _ => false,
    }
}

// ── Analysis ──────────────────────────────────────────────────────────

/// EDA summary from `/analyze/summary`. Field set varies by dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl AnalysisSummary {
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(Value::as_f64)
    }
}

/// One bar/slice of an analysis chart.
///
/// Chart endpoints label points by `category`, `month`, `seller` or `status`
/// and measure them by `value`, `count`, `cost` or `duration`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    #[serde(alias = "category", alias = "month", alias = "seller", alias = "status")]
    pub label: String,
    #[serde(alias = "count", alias = "cost", alias = "duration", alias = "orders")]
    pub value: f64,
}

/// Category metric from the `/reorder/charts/top-*` endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub category: String,
    pub value: f64,
}

// ── Forecast ──────────────────────────────────────────────────────────

/// Per-category demand forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub chart_data: Vec<ForecastPoint>,
    #[serde(default)]
    pub forecast_table: Vec<ForecastRow>,
    #[serde(default)]
    pub mae_rmse_comparison: Option<Value>,
}

impl ForecastResult {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// A point of either the actual series or one model's forecast series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub month: String,
    pub orders: f64,
    /// Series tag: the actual series or a model name (`XGBoost`, `ARIMA`).
    #[serde(rename = "type")]
    pub series: String,
}

impl ForecastPoint {
    /// Whether this point belongs to the observed history.
    pub fn is_actual(&self) -> bool {
        matches!(
            self.series.to_lowercase().as_str(),
            "thực tế" | "actual" | "history" | "historical"
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    pub month: String,
    pub predicted_orders: f64,
}

// ── Reorder ───────────────────────────────────────────────────────────

/// EOQ-based reorder recommendation for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReorderRecommendation {
    pub category: String,
    pub avg_lead_time_days: f64,
    pub forecast_avg_demand: f64,
    #[serde(default)]
    pub demand_std: Option<f64>,
    pub safety_stock: f64,
    pub reorder_point: f64,
    pub optimal_inventory: f64,
    pub holding_cost: f64,
    #[serde(default)]
    pub optimization_recommendations: Option<Value>,
}

/// Supplier cluster assignment from `/reorder/analysis/clustering`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierCluster {
    pub seller_id: String,
    pub total_orders: i64,
    pub avg_shipping_days: f64,
    pub avg_freight: f64,
    pub cluster: i64,
    #[serde(default)]
    pub cluster_description: String,
}

/// Seller flagged by `/reorder/analysis/bottlenecks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BottleneckRecord {
    pub seller_id: String,
    pub total_orders: i64,
    pub late_ratio: f64,
    #[serde(default)]
    pub top_category: Option<String>,
    pub severity: String,
}

// ── Uploads ───────────────────────────────────────────────────────────

/// Metadata of a file sent to the backend, kept locally for bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFileRecord {
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    pub mime_type: String,
    pub last_modified_millis: i64,
    pub uploaded_at_millis: i64,
}

/// Backend reply to `POST /upload/`.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub filename: Option<String>,
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
