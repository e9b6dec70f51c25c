//! Find Routes
//!
//! - GET /metrics/find?query=<glob> - Resolve a glob into tree nodes

use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;

use crate::api::dto::{FindParams, TreeNode};
use crate::api::error::ApiResult;
use crate::api::state::AppState;

/// GET /metrics/find
///
/// Returns one tree node per branch or leaf directly matched by the glob.
/// A glob that matches nothing returns an empty list.
pub async fn find_metrics(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FindParams>,
) -> ApiResult<Json<Vec<TreeNode>>> {
    let nodes = state.engine.find(&params.query).await?;
    Ok(Json(nodes.iter().map(TreeNode::from).collect()))
}
