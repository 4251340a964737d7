//! Catalogue of backend resources.
//!
//! Each endpoint knows its path, its cache key and how to fold the shapes
//! the backend has returned over time into the canonical envelope.

use common::{Envelope, Error};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Cache shape version for the forecast. Bumped when the stored shape of
/// forecast entries changed, so older entries are refetched.
pub const FORECAST_CACHE_VERSION: u32 = 2;

pub const UPLOAD_PATH: &str = "/upload/";
pub const DOWNLOAD_RECOMMENDATIONS_PATH: &str = "/reorder/download/recommendations";
pub const RECOMMENDATIONS_FILE_NAME: &str = "optimization_recommendations.xlsx";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    AnalysisSummary,
    MonthlyOrders,
    TopCategories,
    DeliveryDelay,
    SellerShipping,
    ShippingCostCategory,
    DemandForecast,
    ReorderStrategy,
    TopReorder,
    TopSafetyStock,
    TopLeadTime,
    TopInventory,
    TopHoldingCost,
    TopPotentialSaving,
    SupplierClustering,
    Bottlenecks,
}

impl Endpoint {
    /// Every cached resource, in dashboard order.
    pub const ALL: [Endpoint; 16] = [
        Endpoint::AnalysisSummary,
        Endpoint::MonthlyOrders,
        Endpoint::TopCategories,
        Endpoint::DeliveryDelay,
        Endpoint::SellerShipping,
        Endpoint::ShippingCostCategory,
        Endpoint::DemandForecast,
        Endpoint::ReorderStrategy,
        Endpoint::TopReorder,
        Endpoint::TopSafetyStock,
        Endpoint::TopLeadTime,
        Endpoint::TopInventory,
        Endpoint::TopHoldingCost,
        Endpoint::TopPotentialSaving,
        Endpoint::SupplierClustering,
        Endpoint::Bottlenecks,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Endpoint::AnalysisSummary => "/analyze/summary",
            Endpoint::MonthlyOrders => "/analyze/chart/monthly-orders",
            Endpoint::TopCategories => "/analyze/chart/top-categories",
            Endpoint::DeliveryDelay => "/analyze/chart/delivery-delay",
            Endpoint::SellerShipping => "/analyze/chart/seller-shipping",
            Endpoint::ShippingCostCategory => "/analyze/chart/shipping-cost-category",
            Endpoint::DemandForecast => "/forecast/demand/all",
            Endpoint::ReorderStrategy => "/reorder/strategy",
            Endpoint::TopReorder => "/reorder/charts/top-reorder",
            Endpoint::TopSafetyStock => "/reorder/charts/top-safety-stock",
            Endpoint::TopLeadTime => "/reorder/charts/top-lead-time",
            Endpoint::TopInventory => "/reorder/charts/top-inventory",
            Endpoint::TopHoldingCost => "/reorder/charts/top-holding-cost",
            Endpoint::TopPotentialSaving => "/reorder/charts/top-potential-saving",
            Endpoint::SupplierClustering => "/reorder/analysis/clustering",
            Endpoint::Bottlenecks => "/reorder/analysis/bottlenecks",
        }
    }

    pub fn cache_key(self) -> &'static str {
        match self {
            Endpoint::AnalysisSummary => "analysisSummary",
            Endpoint::MonthlyOrders => "monthlyOrdersChart",
            Endpoint::TopCategories => "topCategoriesChart",
            Endpoint::DeliveryDelay => "deliveryDelayChart",
            Endpoint::SellerShipping => "sellerShippingChart",
            Endpoint::ShippingCostCategory => "shippingCostCategoryChart",
            Endpoint::DemandForecast => "demandForecast",
            Endpoint::ReorderStrategy => "reorderStrategy",
            Endpoint::TopReorder => "topReorderPoints",
            Endpoint::TopSafetyStock => "topSafetyStock",
            Endpoint::TopLeadTime => "topLeadTime",
            Endpoint::TopInventory => "topInventory",
            Endpoint::TopHoldingCost => "topHoldingCost",
            Endpoint::TopPotentialSaving => "topPotentialSaving",
            Endpoint::SupplierClustering => "supplierClustering",
            Endpoint::Bottlenecks => "bottleneckAnalysis",
        }
    }

    /// Short command-line name.
    pub fn slug(self) -> &'static str {
        match self {
            Endpoint::AnalysisSummary => "summary",
            Endpoint::MonthlyOrders => "monthly-orders",
            Endpoint::TopCategories => "top-categories",
            Endpoint::DeliveryDelay => "delivery-delay",
            Endpoint::SellerShipping => "seller-shipping",
            Endpoint::ShippingCostCategory => "shipping-cost-category",
            Endpoint::DemandForecast => "forecast",
            Endpoint::ReorderStrategy => "reorder-strategy",
            Endpoint::TopReorder => "top-reorder",
            Endpoint::TopSafetyStock => "top-safety-stock",
            Endpoint::TopLeadTime => "top-lead-time",
            Endpoint::TopInventory => "top-inventory",
            Endpoint::TopHoldingCost => "top-holding-cost",
            Endpoint::TopPotentialSaving => "top-potential-saving",
            Endpoint::SupplierClustering => "clustering",
            Endpoint::Bottlenecks => "bottlenecks",
        }
    }

    pub fn is_forecast(self) -> bool {
        matches!(self, Endpoint::DemandForecast)
    }

    /// The `/analyze/chart/*` resources.
    pub fn is_analysis_chart(self) -> bool {
        matches!(
            self,
            Endpoint::MonthlyOrders
                | Endpoint::TopCategories
                | Endpoint::DeliveryDelay
                | Endpoint::SellerShipping
                | Endpoint::ShippingCostCategory
        )
    }

    pub fn cache_version(self) -> Option<u32> {
        self.is_forecast().then_some(FORECAST_CACHE_VERSION)
    }

    /// Fold a raw response body into the canonical envelope.
    ///
    /// * `[...]` becomes `{data: [...]}`.
    /// * `{data: X}` and `{data: {data: X}}` both become `{data: X}`.
    /// * The forecast may arrive as a single object; it becomes a
    ///   one-element list so callers always see per-category results.
    /// * Analysis charts arrive as `{chart: {chart: <png>, data: [...]}}`
    ///   (or flat `{chart: <png>, data: [...]}`); only the series is kept.
    pub fn adapt(self, raw: Value) -> Envelope {
        let raw = if self.is_analysis_chart() {
            lift_chart_data(raw)
        } else {
            raw
        };
        let data = unwrap_data(raw);
        match (self, data) {
            (Endpoint::DemandForecast, Value::Object(map)) => {
                Envelope::new(Value::Array(vec![Value::Object(map)]))
            }
            (_, data) => Envelope::new(data),
        }
    }
}

fn lift_chart_data(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("chart") => match map.remove("chart") {
            Some(Value::Object(mut inner)) if inner.contains_key("data") => {
                inner.remove("data").unwrap_or(Value::Null)
            }
            Some(chart) => match map.remove("data") {
                Some(data) => data,
                None => {
                    map.insert("chart".to_string(), chart);
                    Value::Object(map)
                }
            },
            None => Value::Object(map),
        },
        other => other,
    }
}

fn unwrap_data(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.len() == 1 && map.contains_key("data") => {
            unwrap_data(map.remove("data").unwrap_or(Value::Null))
        }
        other => other,
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    /// Accepts the slug, the cache key, or the path.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Endpoint::ALL
            .into_iter()
            .find(|e| e.slug() == needle || e.cache_key() == needle || e.path() == needle)
            .ok_or_else(|| Error::Other(format!("unknown endpoint: {}", needle)))
    }
}
