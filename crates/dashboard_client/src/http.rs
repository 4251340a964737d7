//! HTTP transport to the analytics backend.
//!
//! The `Transport` trait is the seam between the resilience layer and the
//! network; tests substitute a scripted implementation.

use async_trait::async_trait;
use common::Error;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Raw backend calls. No caching, no retries.
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET a JSON document.
    async fn get_json(&self, path: &str, timeout: Duration) -> Result<Value, Error>;

    /// GET a binary body.
    async fn get_bytes(&self, path: &str, timeout: Duration) -> Result<Vec<u8>, Error>;

    /// POST one file as multipart field `file`.
    async fn post_file(
        &self,
        path: &str,
        file_name: &str,
        mime_type: &str,
        contents: Vec<u8>,
        timeout: Duration,
    ) -> Result<Value, Error>;
}

/// `reqwest`-backed transport with connection pooling.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: &str) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .user_agent("supply-dash/0.1")
            .pool_max_idle_per_host(4)
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Http(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// URL helper.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        &self,
        req: reqwest::RequestBuilder,
        path: &str,
    ) -> Result<reqwest::Response, Error> {
        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Http(format!("timed out requesting {}", path))
            } else {
                Error::Http(format!("{}: {}", path, e))
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message: body.chars().take(500).collect(),
            });
        }
        Ok(resp)
    }
}

/// Parse a JSON body strictly.
///
/// Bodies that are not valid JSON (bare `NaN` tokens included) are reported
/// as malformed rather than patched up.
pub fn parse_json_body(path: &str, body: &str) -> Result<Value, Error> {
    serde_json::from_str(body).map_err(|e| Error::MalformedPayload {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get_json(&self, path: &str, timeout: Duration) -> Result<Value, Error> {
        debug!("GET {}", path);
        let resp = self
            .send(self.client.get(self.url(path)).timeout(timeout), path)
            .await?;
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Http(format!("reading {}: {}", path, e)))?;
        parse_json_body(path, &body)
    }

    async fn get_bytes(&self, path: &str, timeout: Duration) -> Result<Vec<u8>, Error> {
        debug!("GET {} (binary)", path);
        let resp = self
            .send(self.client.get(self.url(path)).timeout(timeout), path)
            .await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::Http(format!("reading {}: {}", path, e)))?;
        Ok(bytes.to_vec())
    }

    async fn post_file(
        &self,
        path: &str,
        file_name: &str,
        mime_type: &str,
        contents: Vec<u8>,
        timeout: Duration,
    ) -> Result<Value, Error> {
        debug!("POST {} ({}, {} bytes)", path, file_name, contents.len());
        let part = reqwest::multipart::Part::bytes(contents)
            .file_name(file_name.to_string())
            .mime_str(mime_type)
            .map_err(|e| Error::Http(format!("invalid mime type {}: {}", mime_type, e)))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let resp = self
            .send(
                self.client.post(self.url(path)).multipart(form).timeout(timeout),
                path,
            )
            .await?;
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Http(format!("reading {}: {}", path, e)))?;
        parse_json_body(path, &body)
    }
}
