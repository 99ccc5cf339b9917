//! Concrete collaborators wired into the dispatcher.

use crate::config::HttpConfig;
use async_trait::async_trait;
use larder_core::{Error, Result};
use larder_mcp::{HttpClient, ToolError};
use larder_resilience::CircuitBreakers;
use serde_json::Value;
use std::sync::Arc;

/// Breaker key for outbound HTTP.
pub const HTTP_BREAKER: &str = "http-client";

/// JSON-over-HTTP client backed by `reqwest`.
///
/// Connection failures, timeouts and 5xx responses count against the
/// `http-client` breaker; 4xx responses are the caller's problem and do not.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
    breakers: Arc<CircuitBreakers>,
}

impl ReqwestHttpClient {
    /// Build a client from config, sharing `breakers` with the rest of the
    /// process.
    pub fn new(config: &HttpConfig, breakers: Arc<CircuitBreakers>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout()?)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::config(format!("http client: {e}")))?;
        Ok(Self { client, breakers })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> std::result::Result<Value, ToolError> {
        self.breakers.call(HTTP_BREAKER, || execute(request)).await?
    }
}

/// Send `request`. The outer error counts against the breaker, the inner
/// one does not.
///
/// Transport errors carry the request URL, so they are logged and callers
/// only see a fixed message.
async fn execute(
    request: reqwest::RequestBuilder,
) -> std::result::Result<std::result::Result<Value, ToolError>, ToolError> {
    let response = request.send().await.map_err(|e| {
        log::warn!("upstream request failed: {e}");
        ToolError::new("upstream_unavailable", "upstream unavailable")
    })?;
    let status = response.status();
    if status.is_server_error() {
        return Err(ToolError::new(
            "upstream_unavailable",
            format!("upstream returned {status}"),
        ));
    }
    if !status.is_success() {
        return Ok(Err(ToolError::new(
            "upstream_rejected",
            format!("upstream returned {status}"),
        )));
    }
    Ok(response.json::<Value>().await.map_err(|e| {
        log::warn!("upstream returned invalid JSON: {e}");
        ToolError::new("upstream_invalid", "upstream returned invalid JSON")
    }))
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get_json(&self, url: &str) -> std::result::Result<Value, ToolError> {
        log::debug!("GET {url}");
        self.send(self.client.get(url)).await
    }

    async fn post_json(&self, url: &str, body: &Value) -> std::result::Result<Value, ToolError> {
        log::debug!("POST {url}");
        self.send(self.client.post(url).json(body)).await
    }
}
