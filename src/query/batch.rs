//! Multi-fetch request batching
//!
//! Metric ids are packed greedily, in input order, into batches bounded by a
//! metric count and an estimated request size. Each id costs its dotted length
//! plus a fixed per-item overhead (quotes and separator in the JSON body).

use crate::query::error::{QueryError, QueryResult};
use crate::query::path::MetricPath;

/// Bounds on a single multi-fetch request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    pub max_count: usize,
    pub max_bytes: usize,
    pub per_item_overhead: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_count: 100,
            max_bytes: 20_000,
            per_item_overhead: 3,
        }
    }
}

impl BatchLimits {
    pub fn new(max_count: usize, max_bytes: usize, per_item_overhead: usize) -> QueryResult<Self> {
        if max_count == 0 || max_bytes == 0 {
            return Err(QueryError::Configuration(
                "batch limits must be positive".to_string(),
            ));
        }
        Ok(Self {
            max_count,
            max_bytes,
            per_item_overhead,
        })
    }
}

/// Ids sent in one multi-fetch request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Batch {
    ids: Vec<MetricPath>,
    size: usize,
}

impl Batch {
    pub fn ids(&self) -> &[MetricPath] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Estimated size in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// Dotted ids, ready for the request body
    pub fn metric_names(&self) -> Vec<String> {
        self.ids.iter().map(ToString::to_string).collect()
    }
}

/// Greedy batch packer
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchPlanner {
    limits: BatchLimits,
}

impl BatchPlanner {
    pub fn new(limits: BatchLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> BatchLimits {
        self.limits
    }

    fn cost(&self, id: &MetricPath) -> usize {
        id.serialized_len() + self.limits.per_item_overhead
    }

    /// Partition `ids` into batches, preserving order
    ///
    /// Fails with [`QueryError::BatchOverflow`] when a single id can never fit.
    pub fn plan(&self, ids: &[MetricPath]) -> QueryResult<Vec<Batch>> {
        let mut batches = Vec::new();
        let mut current = Batch::default();

        for id in ids {
            let cost = self.cost(id);
            if cost >= self.limits.max_bytes {
                return Err(QueryError::BatchOverflow {
                    metric: id.to_string(),
                    size: cost,
                    max_bytes: self.limits.max_bytes,
                });
            }

            let full = current.len() >= self.limits.max_count
                || current.size + cost >= self.limits.max_bytes;
            if full && !current.is_empty() {
                batches.push(std::mem::take(&mut current));
            }

            current.size += cost;
            current.ids.push(id.clone());
        }

        if !current.is_empty() {
            batches.push(current);
        }
        Ok(batches)
    }
}
