//! Scripted backend for unit tests.

use async_trait::async_trait;
use common::{DashboardConfig, Error};
use local_store::MemoryStore;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::client::DashboardClient;
use crate::endpoints::{Endpoint, UPLOAD_PATH};
use crate::http::Transport;

enum Reply {
    Json(Value),
    Malformed,
}

struct Route {
    failures_left: usize,
    replies: VecDeque<Reply>,
}

#[derive(Default)]
pub(crate) struct MockTransport {
    routes: Mutex<HashMap<String, Route>>,
    calls: Mutex<HashMap<String, usize>>,
    uploaded: Mutex<Vec<String>>,
    rejected_uploads: Mutex<HashSet<String>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn route(&self, path: &str, failures_left: usize, reply: Reply) {
        self.routes.lock().unwrap().insert(
            path.to_string(),
            Route {
                failures_left,
                replies: VecDeque::from([reply]),
            },
        );
    }

    /// Always answer `value`.
    pub fn respond(&self, path: &str, value: Value) {
        self.route(path, 0, Reply::Json(value));
    }

    /// Answer each value once in turn; the last one repeats.
    pub fn respond_seq(&self, path: &str, values: Vec<Value>) {
        self.routes.lock().unwrap().insert(
            path.to_string(),
            Route {
                failures_left: 0,
                replies: values.into_iter().map(Reply::Json).collect(),
            },
        );
    }

    /// Fail with a transport error forever.
    pub fn fail(&self, path: &str) {
        self.route(path, usize::MAX, Reply::Json(Value::Null));
    }

    /// Fail `n` times, then answer `value`.
    pub fn fail_times(&self, path: &str, n: usize, value: Value) {
        self.route(path, n, Reply::Json(value));
    }

    /// Answer with a body that is not valid JSON.
    pub fn malformed(&self, path: &str) {
        self.route(path, 0, Reply::Malformed);
    }

    /// Make `POST /upload/` reject this file name.
    pub fn reject_upload(&self, file_name: &str) {
        self.rejected_uploads
            .lock()
            .unwrap()
            .insert(file_name.to_string());
    }

    /// Register a small non-empty payload for every endpoint.
    pub fn respond_all(&self) {
        for e in Endpoint::ALL {
            self.respond(e.path(), sample_payload(e));
        }
    }

    pub fn calls(&self, path: &str) -> usize {
        self.calls.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn uploaded(&self) -> Vec<String> {
        self.uploaded.lock().unwrap().clone()
    }

    fn next(&self, path: &str) -> Result<Value, Error> {
        *self.calls.lock().unwrap().entry(path.to_string()).or_default() += 1;

        let mut routes = self.routes.lock().unwrap();
        let route = routes.get_mut(path).ok_or_else(|| Error::Api {
            status: 404,
            message: format!("no route for {}", path),
        })?;

        if route.failures_left > 0 {
            if route.failures_left != usize::MAX {
                route.failures_left -= 1;
            }
            return Err(Error::Http(format!("{}: connection refused", path)));
        }

        let reply = if route.replies.len() > 1 {
            route.replies.pop_front()
        } else {
            route.replies.front().map(|r| match r {
                Reply::Json(v) => Reply::Json(v.clone()),
                Reply::Malformed => Reply::Malformed,
            })
        };

        match reply {
            Some(Reply::Json(v)) => Ok(v),
            Some(Reply::Malformed) => crate::http::parse_json_body(path, "[{\"value\": NaN}]"),
            None => Ok(Value::Null),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get_json(&self, path: &str, _timeout: Duration) -> Result<Value, Error> {
        self.next(path)
    }

    async fn get_bytes(&self, path: &str, _timeout: Duration) -> Result<Vec<u8>, Error> {
        match self.next(path)? {
            Value::String(s) => Ok(s.into_bytes()),
            other => Ok(other.to_string().into_bytes()),
        }
    }

    async fn post_file(
        &self,
        path: &str,
        file_name: &str,
        _mime_type: &str,
        _contents: Vec<u8>,
        _timeout: Duration,
    ) -> Result<Value, Error> {
        assert_eq!(path, UPLOAD_PATH);
        *self.calls.lock().unwrap().entry(path.to_string()).or_default() += 1;

        if self.rejected_uploads.lock().unwrap().contains(file_name) {
            return Err(Error::Api {
                status: 400,
                message: r#"{"error": "Invalid file type"}"#.into(),
            });
        }
        self.uploaded.lock().unwrap().push(file_name.to_string());
        Ok(json!({"message": "File uploaded successfully", "filename": file_name}))
    }
}

/// Client over the mock transport and a shared in-memory store, with the
/// default retry policy.
pub(crate) fn test_client(transport: &Arc<MockTransport>, store: &MemoryStore) -> DashboardClient {
    DashboardClient::new(
        transport.clone(),
        Arc::new(store.clone()),
        &DashboardConfig::default(),
    )
}

pub(crate) fn sample_payload(endpoint: Endpoint) -> Value {
    match endpoint {
        Endpoint::AnalysisSummary => json!({"total_orders": 99441, "total_customers": 96096}),
        Endpoint::MonthlyOrders => json!([{"month": "2018-01", "count": 7269}]),
        Endpoint::TopCategories => json!([{"category": "bed_bath_table", "count": 11115}]),
        Endpoint::DeliveryDelay => json!([{"status": "late", "value": 7826}]),
        Endpoint::SellerShipping => json!([{"seller": "s1", "duration": 8.3}]),
        Endpoint::ShippingCostCategory => json!([{"category": "toys", "cost": 18.2}]),
        Endpoint::DemandForecast => json!([{
            "category": "toys",
            "status": "success",
            "chart_data": [{"month": "2018-01", "orders": 10, "type": "Thực tế"}],
            "forecast_table": [{"month": "2018-09", "predicted_orders": 12}]
        }]),
        Endpoint::ReorderStrategy => json!([{
            "category": "toys",
            "avg_lead_time_days": 9.5,
            "forecast_avg_demand": 120.0,
            "safety_stock": 30.0,
            "reorder_point": 68.0,
            "optimal_inventory": 210.0,
            "holding_cost": 52.5
        }]),
        Endpoint::SupplierClustering => json!([{
            "seller_id": "s1",
            "total_orders": 40,
            "avg_shipping_days": 7.1,
            "avg_freight": 19.9,
            "cluster": 0,
            "cluster_description": "Fast, high volume"
        }]),
        Endpoint::Bottlenecks => json!([{
            "seller_id": "s2",
            "total_orders": 12,
            "late_ratio": 0.42,
            "top_category": "toys",
            "severity": "high"
        }]),
        _ => json!({"data": [{"category": "toys", "value": 1.0}]}),
    }
}
