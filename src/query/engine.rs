//! Query Engine
//!
//! Ties the pieces together:
//!
//! ```text
//! find:  pattern → NodeResolver → nodes
//! fetch: nodes → canonical ids → BatchPlanner → store (concurrent)
//!              → merge by metric → DataKey → Aligner → series per leaf
//! ```
//!
//! The engine holds no per-request state; concurrent calls are independent.

use futures_util::future::try_join_all;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::backend::{FetchRequest, MetricStore, Sample};
use crate::query::align::{align, Grid};
use crate::query::batch::{BatchLimits, BatchPlanner};
use crate::query::data_key::{PointValue, DEFAULT_FIELD_PREFERENCE, ENUM_VALUES_FIELD};
use crate::query::error::{QueryError, QueryResult};
use crate::query::path::MetricPath;
use crate::query::resolution::ResolutionTable;
use crate::query::resolver::{FetchDescriptor, Node, NodeResolver};
use crate::query::translate::PathTranslator;

/// Static engine configuration
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub translator: PathTranslator,
    pub resolution: ResolutionTable,
    pub batching: BatchLimits,
    /// Field preference for leaves without an explicit submetric
    pub default_keys: Vec<String>,
    /// Ask the store to return only the fields the engine can read
    pub select_fields: bool,
    /// Most grid points a single fetch may produce per series
    pub max_points: usize,
}

pub const DEFAULT_MAX_POINTS: usize = 100_000;

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            translator: PathTranslator::Plain,
            resolution: ResolutionTable::default(),
            batching: BatchLimits::default(),
            default_keys: DEFAULT_FIELD_PREFERENCE.iter().map(|s| s.to_string()).collect(),
            select_fields: false,
            max_points: DEFAULT_MAX_POINTS,
        }
    }
}

/// Grid description returned with every fetch
///
/// `end` is one step past the requested end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeInfo {
    pub start: i64,
    pub end: i64,
    pub step: i64,
}

/// Aligned series keyed by external path
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchResult {
    pub time_info: TimeInfo,
    pub series: BTreeMap<String, Vec<Option<PointValue>>>,
}

/// Find and fetch over a metric store
pub struct QueryEngine {
    store: Arc<dyn MetricStore>,
    settings: EngineSettings,
    planner: BatchPlanner,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn MetricStore>, settings: EngineSettings) -> Self {
        let planner = BatchPlanner::new(settings.batching);
        Self {
            store,
            settings,
            planner,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Resolve a glob into nodes
    pub async fn find(&self, pattern: &str) -> QueryResult<Vec<Node>> {
        NodeResolver::new(self.store.as_ref(), &self.settings.translator)
            .find(pattern)
            .await
    }

    /// Fields to request when `select_fields` is on
    fn select_list(&self) -> Option<Vec<String>> {
        if !self.settings.select_fields {
            return None;
        }
        let mut fields = self.settings.default_keys.clone();
        if let Some(aliases) = self.settings.translator.aliases() {
            for token in aliases.tokens() {
                if let Some(field) = aliases.field(token) {
                    if !fields.iter().any(|f| f == field) {
                        fields.push(field.to_string());
                    }
                }
            }
        }
        fields.push(ENUM_VALUES_FIELD.to_string());
        Some(fields)
    }

    /// Fetch aligned series for every leaf in `nodes` over `[start, end)`
    ///
    /// Branches are ignored. Leaves whose metric the store did not return are
    /// left out of the result. Any failed batch fails the whole call.
    pub async fn fetch(&self, nodes: &[Node], start: i64, end: i64) -> QueryResult<FetchResult> {
        let started = Instant::now();
        let resolution = self.settings.resolution.choose(start, end);
        let step = self.settings.resolution.step_seconds(resolution);
        let grid = Grid::new(start, end, step)?;
        if grid.len() > self.settings.max_points {
            return Err(QueryError::InvalidWindow(format!(
                "{} points at a {}s step exceeds the limit of {}",
                grid.len(),
                step,
                self.settings.max_points
            )));
        }
        let time_info = TimeInfo {
            start: grid.start(),
            end: grid.end() + grid.step(),
            step: grid.step(),
        };

        let leaves: Vec<(&MetricPath, &FetchDescriptor)> = nodes
            .iter()
            .filter_map(|node| match node {
                Node::Leaf { path, fetch } => Some((path, fetch)),
                Node::Branch { .. } => None,
            })
            .collect();
        if leaves.is_empty() {
            return Ok(FetchResult {
                time_info,
                series: BTreeMap::new(),
            });
        }

        let mut seen = HashSet::new();
        let ids: Vec<MetricPath> = leaves
            .iter()
            .filter(|(_, fetch)| seen.insert(fetch.metric.clone()))
            .map(|(_, fetch)| fetch.metric.clone())
            .collect();
        let batches = self.planner.plan(&ids)?;

        let select = self.select_list();
        let requests: Vec<FetchRequest> = batches
            .iter()
            .map(|batch| FetchRequest {
                metrics: batch.metric_names(),
                from_ms: grid.start_ms(),
                to_ms: grid.end_ms(),
                resolution,
                select: select.clone(),
            })
            .collect();

        let responses = try_join_all(requests.iter().map(|r| self.store.fetch(r))).await?;

        let mut samples: HashMap<String, Vec<Sample>> = HashMap::new();
        for data in responses.into_iter().flatten() {
            samples.entry(data.metric).or_default().extend(data.data);
        }

        let mut series = BTreeMap::new();
        for (path, fetch) in leaves {
            let Some(metric_samples) = samples.get(&fetch.metric.to_string()) else {
                debug!(metric = %fetch.metric, "Store returned no data, omitting {}", path);
                continue;
            };
            let key = self
                .settings
                .translator
                .data_key(&fetch.selector, &self.settings.default_keys)?
                .resolve(metric_samples);
            series.insert(path.to_string(), align(metric_samples, &grid, &key));
        }

        debug!(
            resolution = %resolution,
            step,
            leaves = series.len(),
            ids = ids.len(),
            batches = batches.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Fetch complete"
        );

        Ok(FetchResult { time_info, series })
    }
}
