//! Floodlight Query Engine
//!
//! Resolves dotted glob queries into branch/leaf nodes and renders leaves as
//! fixed-step series:
//!
//! - **Path**: metric paths and per-segment glob patterns
//! - **Resolution**: rollup tiers and how a window picks one
//! - **DataKey**: which sample field a leaf reads
//! - **Translate**: external paths vs. canonical store ids (aliases, enums)
//! - **Resolver**: glob → nodes
//! - **Batch**: size-bounded multi-fetch requests
//! - **Align**: samples → grid, with interior gap interpolation
//! - **Engine**: find and fetch over a [`MetricStore`](crate::backend::MetricStore)
//!
//! # Examples
//!
//! ```rust,ignore
//! use floodlight::query::{EngineSettings, QueryEngine};
//!
//! let engine = QueryEngine::new(store, EngineSettings::default());
//!
//! let nodes = engine.find("servers.*.cpu").await?;
//! let result = engine.fetch(&nodes, 1426120000, 1426147000).await?;
//! for (path, points) in &result.series {
//!     println!("{} {:?}", path, points);
//! }
//! ```

mod align;
mod batch;
mod data_key;
mod engine;
mod error;
mod path;
mod resolution;
mod resolver;
mod translate;

pub use align::{align, interpolate_gaps, Grid, MAX_EPOCH_SECONDS};
pub use batch::{Batch, BatchLimits, BatchPlanner};
pub use data_key::{
    DataKey, FieldValue, PointValue, ResolvedKey, DEFAULT_FIELD_PREFERENCE, ENUM_VALUES_FIELD,
};
pub use engine::{EngineSettings, FetchResult, QueryEngine, TimeInfo, DEFAULT_MAX_POINTS};
pub use error::{QueryError, QueryResult};
pub use path::{GlobPattern, MetricPath};
pub use resolution::{Resolution, ResolutionTable};
pub use resolver::{FetchDescriptor, Node, NodeResolver};
pub use translate::{ExternalLeaf, PathTranslator, Selector, SubmetricAliases};
