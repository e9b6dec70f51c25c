//! In-process metric store
//!
//! Behaves like the HTTP store at the trait boundary: search matches the glob
//! against the leading segments of every known metric, so deeper metrics are
//! returned too, and fetch silently omits metrics it does not know.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

use super::{BackendError, BackendResult, FetchRequest, MetricData, MetricStore, Sample, SearchResult};
use crate::query::{GlobPattern, MetricPath};

#[derive(Debug, Clone, Default)]
struct StoredMetric {
    enum_values: Option<Vec<String>>,
    samples: Vec<Sample>,
}

/// Metric store held in memory
#[derive(Debug, Default)]
pub struct InMemoryStore {
    metrics: BTreeMap<String, StoredMetric>,
    fetch_failure: Option<u16>,
    searches: Mutex<Vec<String>>,
    fetches: Mutex<Vec<FetchRequest>>,
    search_calls: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: add a plain numeric metric
    pub fn with_metric(mut self, name: impl Into<String>, samples: Vec<Sample>) -> Self {
        self.metrics.insert(
            name.into(),
            StoredMetric {
                enum_values: None,
                samples,
            },
        );
        self
    }

    /// Builder method: add an enum metric with its known values
    pub fn with_enum_metric<I, S>(
        mut self,
        name: impl Into<String>,
        values: I,
        samples: Vec<Sample>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metrics.insert(
            name.into(),
            StoredMetric {
                enum_values: Some(values.into_iter().map(Into::into).collect()),
                samples,
            },
        );
        self
    }

    /// Builder method: make every fetch fail with `status`
    pub fn with_fetch_failure(mut self, status: u16) -> Self {
        self.fetch_failure = Some(status);
        self
    }

    /// Patterns searched so far, in call order
    pub async fn searches(&self) -> Vec<String> {
        self.searches.lock().await.clone()
    }

    /// Fetch requests received so far, in call order
    pub async fn fetches(&self) -> Vec<FetchRequest> {
        self.fetches.lock().await.clone()
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetricStore for InMemoryStore {
    async fn search(
        &self,
        pattern: &str,
        include_enum_values: bool,
    ) -> BackendResult<Vec<SearchResult>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.searches.lock().await.push(pattern.to_string());

        let glob = GlobPattern::parse(pattern)
            .map_err(|e| BackendError::Unavailable {
                status: 400,
                message: e.to_string(),
            })?;

        let results = self
            .metrics
            .iter()
            .filter(|(name, _)| {
                MetricPath::parse(name)
                    .map(|path| glob.matches_prefix(&path))
                    .unwrap_or(false)
            })
            .map(|(name, stored)| SearchResult {
                metric: name.clone(),
                enum_values: if include_enum_values {
                    stored.enum_values.clone()
                } else {
                    None
                },
            })
            .collect();

        Ok(results)
    }

    async fn fetch(&self, request: &FetchRequest) -> BackendResult<Vec<MetricData>> {
        self.fetches.lock().await.push(request.clone());

        if let Some(status) = self.fetch_failure {
            return Err(BackendError::Unavailable {
                status,
                message: "injected failure".to_string(),
            });
        }

        let data = request
            .metrics
            .iter()
            .filter_map(|name| {
                let stored = self.metrics.get(name)?;
                let samples = stored
                    .samples
                    .iter()
                    .filter(|s| s.timestamp >= request.from_ms && s.timestamp <= request.to_ms)
                    .map(|s| match &request.select {
                        Some(select) => {
                            let mut kept = Sample::new(s.timestamp);
                            for field in select {
                                if let Some(value) = s.fields.get(field) {
                                    kept.fields.insert(field.clone(), value.clone());
                                }
                            }
                            kept
                        }
                        None => s.clone(),
                    })
                    .collect();
                Some(MetricData {
                    metric: name.clone(),
                    data: samples,
                })
            })
            .collect();

        Ok(data)
    }
}
