//! Glob resolution into branch and leaf nodes
//!
//! The store only answers "which canonical metrics match this glob". Every
//! canonical metric expands into one or more external leaves (see
//! [`PathTranslator::external_leaves`]), which may sit one or two segments
//! below the metric itself. Resolving a query of depth `d` therefore also
//! searches the parent pattern, and in aliased mode the grandparent when the
//! query could end on the enum token.
//!
//! A leaf whose query path is exactly `d` segments deep becomes a
//! [`Node::Leaf`]; a deeper visible one becomes a [`Node::Branch`] on its
//! first `d` segments. Hidden enum leaves never produce branches.

use futures_util::future::try_join_all;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::backend::{MetricStore, SearchResult};
use crate::query::error::QueryResult;
use crate::query::path::{GlobPattern, MetricPath};
use crate::query::translate::{PathTranslator, Selector};

/// What a leaf needs for a later fetch
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchDescriptor {
    /// Canonical id sent to the store
    pub metric: MetricPath,
    pub selector: Selector,
}

/// One result of a find
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    /// Something deeper exists below this path
    Branch { path: MetricPath },
    /// A fetchable series
    Leaf {
        path: MetricPath,
        fetch: FetchDescriptor,
    },
}

impl Node {
    pub fn path(&self) -> &MetricPath {
        match self {
            Node::Branch { path } | Node::Leaf { path, .. } => path,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }

    /// Final path segment
    pub fn name(&self) -> &str {
        self.path().last()
    }

    pub fn fetch_descriptor(&self) -> Option<&FetchDescriptor> {
        match self {
            Node::Leaf { fetch, .. } => Some(fetch),
            Node::Branch { .. } => None,
        }
    }
}

/// Resolves glob queries against a store
pub struct NodeResolver<'a> {
    store: &'a dyn MetricStore,
    translator: &'a PathTranslator,
}

impl<'a> NodeResolver<'a> {
    pub fn new(store: &'a dyn MetricStore, translator: &'a PathTranslator) -> Self {
        Self { store, translator }
    }

    /// Patterns that have to be searched to see every leaf under `glob`
    fn search_patterns(&self, glob: &GlobPattern) -> Vec<GlobPattern> {
        let depth = glob.depth();
        let mut patterns = Vec::with_capacity(3);

        let aliases = self.translator.aliases();
        let tail_is_token = aliases
            .map(|a| {
                glob.last_is_literal()
                    && (a.is_alias(glob.last_segment()) || a.is_enum_token(glob.last_segment()))
            })
            .unwrap_or(false);

        if !tail_is_token {
            patterns.push(glob.clone());
        }
        if let Some(parent) = glob.ancestor(1) {
            patterns.push(parent);
        }
        if let Some(token) = aliases.and_then(|a| a.enum_token()) {
            if depth > 2 && glob.last_matches(token) {
                if let Some(grandparent) = glob.ancestor(2) {
                    patterns.push(grandparent);
                }
            }
        }
        patterns
    }

    /// Resolve `pattern` into nodes, sorted by path
    ///
    /// A pattern that matches nothing resolves to an empty list.
    pub async fn find(&self, pattern: &str) -> QueryResult<Vec<Node>> {
        let glob = GlobPattern::parse(pattern)?;
        let depth = glob.depth();
        let patterns = self.search_patterns(&glob);

        let responses = try_join_all(patterns.iter().map(|p| {
            let p = p.to_string();
            async move { self.store.search(&p, true).await }
        }))
        .await?;

        let merged = merge_results(responses.into_iter().flatten());

        let mut seen = HashSet::new();
        let mut nodes = Vec::new();
        for (metric, enum_values) in merged {
            let canonical = match MetricPath::parse(&metric) {
                Ok(path) => path,
                Err(e) => {
                    warn!(metric = %metric, "Skipping unusable metric name: {}", e);
                    continue;
                }
            };

            for leaf in self.translator.external_leaves(&canonical, &enum_values) {
                if !glob.matches_prefix(&leaf.query_path) {
                    continue;
                }
                let node = if leaf.query_path.depth() == depth {
                    let (metric, selector) = self.translator.to_canonical(&leaf.path, &enum_values);
                    Node::Leaf {
                        path: leaf.path,
                        fetch: FetchDescriptor { metric, selector },
                    }
                } else if leaf.is_hidden() {
                    continue;
                } else {
                    Node::Branch {
                        path: leaf.query_path.prefix(depth),
                    }
                };
                if seen.insert((node.path().clone(), node.is_leaf())) {
                    nodes.push(node);
                }
            }
        }

        nodes.sort_by(|a, b| {
            a.path()
                .cmp(b.path())
                .then(a.is_leaf().cmp(&b.is_leaf()))
        });
        debug!(
            pattern = %pattern,
            searches = patterns.len(),
            nodes = nodes.len(),
            "Resolved pattern"
        );
        Ok(nodes)
    }
}

/// Union search results by metric name, keeping first-seen order for both
/// metrics and their enum values
fn merge_results(results: impl Iterator<Item = SearchResult>) -> Vec<(String, Vec<String>)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut merged: Vec<(String, Vec<String>)> = Vec::new();

    for result in results {
        let slot = match index.get(&result.metric) {
            Some(&slot) => slot,
            None => {
                index.insert(result.metric.clone(), merged.len());
                merged.push((result.metric.clone(), Vec::new()));
                merged.len() - 1
            }
        };
        let values = &mut merged[slot].1;
        for value in result.enum_values.unwrap_or_default() {
            if !values.contains(&value) {
                values.push(value);
            }
        }
    }
    merged
}
