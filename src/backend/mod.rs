//! Metrics Store Access
//!
//! The query engine only needs two operations from the store behind it:
//!
//! - **Search**: expand a glob into the canonical metric names it matches,
//!   optionally with the enum values known for each metric
//! - **Multi-fetch**: return resolution-bucketed samples for a batch of
//!   metrics over a millisecond window
//!
//! ## Implementations
//!
//! - [`HttpMetricStore`]: REST client for the store's v2.0 API
//! - [`InMemoryStore`]: in-process store, used by tests and demos
//!
//! Authentication is a separate capability ([`TokenProvider`]) handed to the
//! HTTP client at construction.

mod auth;
mod client;
mod memory;

pub use auth::{NoAuth, StaticToken, TokenProvider};
pub use client::{HttpMetricStore, StoreConfig};
pub use memory::InMemoryStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::query::Resolution;

/// Read access to a rollup metrics store
#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Canonical metric names matching `pattern`
    async fn search(
        &self,
        pattern: &str,
        include_enum_values: bool,
    ) -> BackendResult<Vec<SearchResult>>;

    /// Samples for every metric in `request`
    async fn fetch(&self, request: &FetchRequest) -> BackendResult<Vec<MetricData>>;

    /// Whether the store answers at all
    ///
    /// Unlike [`search`](Self::search), implementations must report an error
    /// status from the store as an error.
    async fn ping(&self) -> BackendResult<()> {
        self.search(PING_PATTERN, false).await.map(|_| ())
    }
}

/// Search pattern for [`MetricStore::ping`]; matches only top-level names
const PING_PATTERN: &str = "*";

/// One entry of a search response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Canonical metric name
    pub metric: String,
    /// Known enum values, present only for enum metrics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

impl SearchResult {
    /// A plain numeric metric
    pub fn plain(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            enum_values: None,
        }
    }

    /// An enum metric with its known values
    pub fn with_enum_values<I, S>(metric: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            metric: metric.into(),
            enum_values: Some(values.into_iter().map(Into::into).collect()),
        }
    }
}

/// A batched fetch for one window and resolution
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    /// Canonical metric names
    pub metrics: Vec<String>,
    /// Window start, milliseconds since epoch
    pub from_ms: i64,
    /// Window end, milliseconds since epoch
    pub to_ms: i64,
    pub resolution: Resolution,
    /// Fields the store should return; all fields when `None`
    pub select: Option<Vec<String>>,
}

/// Samples for one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricData {
    pub metric: String,
    #[serde(default)]
    pub data: Vec<Sample>,
}

/// A resolution-bucketed sample
///
/// The value lives under one of several field names (`average`, `latest`,
/// ...) or, for enum metrics, in a nested `enum_values` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Milliseconds since epoch
    pub timestamp: i64,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Sample {
    /// Create a sample with no fields
    pub fn new(timestamp: i64) -> Self {
        Self {
            timestamp,
            fields: Map::new(),
        }
    }

    /// Builder method: add a field
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

/// Body of a multi-fetch response
#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct MultiFetchResponse {
    #[serde(default)]
    pub metrics: Vec<MetricData>,
}

/// Errors that can occur when talking to the store
#[derive(Error, Debug)]
pub enum BackendError {
    /// Still rejected after one forced token refresh
    #[error("Authentication failed with status {status}")]
    AuthFailure { status: u16 },

    /// Non-auth error status
    #[error("Store returned {status}: {message}")]
    Unavailable { status: u16, message: String },

    /// Body did not have the expected shape
    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Request timeout")]
    Timeout,

    /// The token provider could not produce a token
    #[error("Token error: {0}")]
    Token(String),
}

/// Result type for store operations
pub type BackendResult<T> = Result<T, BackendError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_search_result_wire_shape() {
        let parsed: Vec<SearchResult> = serde_json::from_value(json!([
            {"metric": "a.b.c", "unit": "percent"},
            {"metric": "x.y.z", "enum_values": ["v1", "v2"]}
        ]))
        .unwrap();

        assert_eq!(parsed[0], SearchResult::plain("a.b.c"));
        assert_eq!(parsed[1], SearchResult::with_enum_values("x.y.z", ["v1", "v2"]));
    }

    #[test]
    fn test_multi_fetch_wire_shape() {
        let parsed: MultiFetchResponse = serde_json::from_value(json!({
            "metrics": [{
                "metric": "a.b.c",
                "type": "number",
                "unit": "unknown",
                "data": [
                    {"timestamp": 1426120000000i64, "average": 6421.18, "numPoints": 1},
                    {"timestamp": 1426120300000i64, "enum_values": {"v1": 13}}
                ]
            }]
        }))
        .unwrap();

        let data = &parsed.metrics[0].data;
        assert_eq!(parsed.metrics[0].metric, "a.b.c");
        assert_eq!(data[0].timestamp, 1_426_120_000_000);
        assert_eq!(data[0].fields["average"], json!(6421.18));
        assert!(!data[0].fields.contains_key("timestamp"));
        assert_eq!(data[1].fields["enum_values"]["v1"], json!(13));
    }

    #[test]
    fn test_sample_builder() {
        let sample = Sample::new(5).field("average", 1.5).field("numPoints", 2);
        assert_eq!(sample.fields.len(), 2);
        assert_eq!(sample.fields["numPoints"], json!(2));
    }
}
