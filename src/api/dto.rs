//! Data Transfer Objects
//!
//! Request and response types for the API endpoints, shaped after Graphite's
//! `/metrics/find` tree format and `/render` JSON format.

use serde::{Deserialize, Serialize};

use crate::query::{Node, PointValue, TimeInfo};

// ============================================
// FIND DTOs
// ============================================

/// Query string of `GET /metrics/find`
#[derive(Debug, Deserialize)]
pub struct FindParams {
    /// Dotted glob
    pub query: String,
}

/// One node in Graphite's tree JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Last path segment
    pub text: String,
    /// Full dotted path
    pub id: String,
    /// 1 for leaves, 0 for branches
    pub leaf: u8,
    pub expandable: u8,
    #[serde(rename = "allowChildren")]
    pub allow_children: u8,
}

impl From<&Node> for TreeNode {
    fn from(node: &Node) -> Self {
        let branch = u8::from(!node.is_leaf());
        Self {
            text: node.name().to_string(),
            id: node.path().to_string(),
            leaf: u8::from(node.is_leaf()),
            expandable: branch,
            allow_children: branch,
        }
    }
}

// ============================================
// RENDER DTOs
// ============================================

/// Parsed parameters of `/render`
#[derive(Debug, Default, PartialEq)]
pub struct RenderParams {
    /// One glob per `target`
    pub targets: Vec<String>,
    /// Raw `from` value
    pub from: Option<String>,
    /// Raw `until` value
    pub until: Option<String>,
}

/// One rendered series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSeries {
    /// External path of the leaf
    pub target: String,
    /// `[value, timestamp]` pairs
    pub datapoints: Vec<(Option<PointValue>, i64)>,
}

impl RenderSeries {
    /// Pair grid values with their timestamps
    pub fn new(target: String, values: &[Option<PointValue>], time_info: &TimeInfo) -> Self {
        let datapoints = values
            .iter()
            .enumerate()
            .map(|(i, v)| (*v, time_info.start + i as i64 * time_info.step))
            .collect();
        Self { target, datapoints }
    }
}

// ============================================
// HEALTH DTOs
// ============================================

/// Full health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: healthy, unhealthy
    pub status: String,
    /// Store status
    pub store: String,
    /// Path translation mode: plain, aliased
    pub mode: String,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Application version
    pub version: String,
}
