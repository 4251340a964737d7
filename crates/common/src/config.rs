//! Client configuration types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Base URL of the analytics backend.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Directory backing the persistent key-value store.
    #[serde(default = "default_store_dir")]
    pub store_dir: String,

    /// Retry policy for endpoint calls.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Cache expiry windows.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Per-request timeouts (seconds).
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Forecast duplicate-series workaround.
    #[serde(default)]
    pub forecast: ForecastConfig,
}

/// Exponential backoff parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first call.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt, in milliseconds.
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Multiplier applied to the delay after each failed attempt.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

/// Cache expiry windows (milliseconds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl")]
    pub default_ttl_ms: u64,

    /// The forecast is expensive to compute server-side, so it lives longer.
    #[serde(default = "default_forecast_ttl")]
    pub forecast_ttl_ms: u64,
}

/// Request timeouts (seconds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_request_timeout")]
    pub request_secs: u64,

    #[serde(default = "default_forecast_timeout")]
    pub forecast_secs: u64,

    #[serde(default = "default_upload_timeout")]
    pub upload_secs: u64,
}

/// Seeded perturbation of forecast series that duplicate the actual series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    #[serde(default = "default_true")]
    pub perturb_duplicate_series: bool,

    #[serde(default = "default_perturbation_seed")]
    pub perturbation_seed: u64,

    /// Maximum relative change, e.g. 0.05 for ±5%.
    #[serde(default = "default_max_perturbation")]
    pub max_perturbation: f64,
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    pub fn forecast_ttl(&self) -> Duration {
        Duration::from_millis(self.forecast_ttl_ms)
    }
}

impl TimeoutConfig {
    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    pub fn forecast(&self) -> Duration {
        Duration::from_secs(self.forecast_secs)
    }

    pub fn upload(&self) -> Duration {
        Duration::from_secs(self.upload_secs)
    }
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_true() -> bool {
    true
}

fn default_api_url() -> String {
    "http://localhost:8000".into()
}
fn default_store_dir() -> String {
    ".supply-dash".into()
}

fn default_max_attempts() -> u32 {
    5
}
fn default_initial_delay() -> u64 {
    2000
}
fn default_backoff_factor() -> f64 {
    1.5
}

fn default_ttl() -> u64 {
    3_600_000
}
fn default_forecast_ttl() -> u64 {
    21_600_000
}

fn default_request_timeout() -> u64 {
    30
}
fn default_forecast_timeout() -> u64 {
    120
}
fn default_upload_timeout() -> u64 {
    120
}

fn default_perturbation_seed() -> u64 {
    42
}
fn default_max_perturbation() -> f64 {
    0.05
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            backoff_factor: default_backoff_factor(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_ms: default_ttl(),
            forecast_ttl_ms: default_forecast_ttl(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: default_request_timeout(),
            forecast_secs: default_forecast_timeout(),
            upload_secs: default_upload_timeout(),
        }
    }
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            perturb_duplicate_series: default_true(),
            perturbation_seed: default_perturbation_seed(),
            max_perturbation: default_max_perturbation(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            store_dir: default_store_dir(),
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
            timeouts: TimeoutConfig::default(),
            forecast: ForecastConfig::default(),
        }
    }
}
