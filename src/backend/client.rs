//! Store REST API Client
//!
//! HTTP client for the store's tenant-scoped v2.0 endpoints:
//!
//! - `GET  {base}/v2.0/{tenant}/metrics/search?query=..&include_enum_values=true`
//! - `POST {base}/v2.0/{tenant}/views?from=..&to=..&resolution=..[&select=..]`
//!
//! A 401 forces one token refresh and one retry. Other failures are not retried.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::auth::TokenProvider;
use super::{
    BackendError, BackendResult, FetchRequest, MetricData, MetricStore, MultiFetchResponse,
    SearchResult,
};

/// Connection settings for [`HttpMetricStore`]
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Base URL of the store (e.g., "http://localhost:20000")
    pub base_url: String,
    /// Tenant all requests are scoped to
    pub tenant: String,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:20000".to_string(),
            tenant: "tenant".to_string(),
            request_timeout_ms: 30_000,
        }
    }
}

/// Store client over reqwest
pub struct HttpMetricStore {
    client: Client,
    config: StoreConfig,
    auth: Arc<dyn TokenProvider>,
}

impl HttpMetricStore {
    /// Create a new client with the given configuration and token source
    pub fn new(config: StoreConfig, auth: Arc<dyn TokenProvider>) -> BackendResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self {
            client,
            config,
            auth,
        })
    }

    /// Get the current configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn tenant_url(&self, suffix: &str) -> String {
        format!(
            "{}/v2.0/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.tenant,
            suffix
        )
    }

    /// Send a request built by `build`, re-authenticating once on 401
    async fn send_authenticated<F>(&self, build: F) -> BackendResult<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let token = self.auth.token(false).await?;
        let response = self.send_once(build(), token).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        warn!("Store rejected credentials, refreshing token");
        let token = self.auth.token(true).await?;
        let response = self.send_once(build(), token).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(BackendError::AuthFailure {
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }

    async fn send_once(
        &self,
        request: RequestBuilder,
        token: Option<String>,
    ) -> BackendResult<Response> {
        let request = match token {
            Some(token) => request.header(self.auth.header_name(), token),
            None => request,
        };

        request
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout
                } else if e.is_connect() {
                    BackendError::Unavailable {
                        status: 0,
                        message: e.to_string(),
                    }
                } else {
                    BackendError::Transport(e)
                }
            })
    }

    /// Send a search, leaving the response status to the caller
    async fn send_search(&self, pattern: &str, include_enum_values: bool) -> BackendResult<Response> {
        let url = self.tenant_url("metrics/search");
        let include = include_enum_values.to_string();

        self.send_authenticated(|| {
            self.client
                .get(&url)
                .query(&[("query", pattern), ("include_enum_values", include.as_str())])
        })
        .await
    }
}

async fn error_status(response: Response) -> BackendError {
    let status = response.status().as_u16();
    BackendError::Unavailable {
        status,
        message: response.text().await.unwrap_or_default(),
    }
}

#[async_trait]
impl MetricStore for HttpMetricStore {
    async fn search(
        &self,
        pattern: &str,
        include_enum_values: bool,
    ) -> BackendResult<Vec<SearchResult>> {
        let response = self.send_search(pattern, include_enum_values).await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(
                pattern = %pattern,
                status = status.as_u16(),
                "Search failed, treating as no results: {}",
                text
            );
            return Ok(Vec::new());
        }

        let body = response.text().await?;
        let results: Vec<SearchResult> = serde_json::from_str(&body)
            .map_err(|e| BackendError::Malformed(format!("search response: {}", e)))?;
        debug!(pattern = %pattern, results = results.len(), "Search complete");
        Ok(results)
    }

    async fn fetch(&self, request: &FetchRequest) -> BackendResult<Vec<MetricData>> {
        let url = self.tenant_url("views");

        let mut params = vec![
            ("from", request.from_ms.to_string()),
            ("to", request.to_ms.to_string()),
            ("resolution", request.resolution.as_str().to_string()),
        ];
        if let Some(select) = &request.select {
            params.push(("select", select.join(",")));
        }

        let response = self
            .send_authenticated(|| {
                self.client
                    .post(&url)
                    .query(&params)
                    .json(&request.metrics)
            })
            .await?;

        if !response.status().is_success() {
            return Err(error_status(response).await);
        }

        let body = response.text().await?;
        let parsed: MultiFetchResponse = serde_json::from_str(&body)
            .map_err(|e| BackendError::Malformed(format!("multi-fetch response: {}", e)))?;
        debug!(
            requested = request.metrics.len(),
            returned = parsed.metrics.len(),
            resolution = %request.resolution,
            "Multi-fetch complete"
        );
        Ok(parsed.metrics)
    }

    async fn ping(&self) -> BackendResult<()> {
        let response = self.send_search(super::PING_PATTERN, false).await?;
        if !response.status().is_success() {
            return Err(error_status(response).await);
        }
        Ok(())
    }
}
