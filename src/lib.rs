//! # Floodlight
//!
//! Glob queries and grid-aligned time series over a rollup metrics store.
//!
//! ## Features
//!
//! - **Find**: resolve `servers.*.cpu` style globs into branches and leaves
//! - **Submetric aliases**: expose rollup fields and enum values as path segments
//! - **Fetch**: batched multi-metric fetches aligned to a fixed-step grid
//! - **Graphite-compatible API**: `/metrics/find` and `/render` over Axum
//!
//! ## Modules
//!
//! - [`backend`]: Metric store trait, HTTP client and in-memory store
//! - [`query`]: Path translation, node resolution, batching and alignment
//! - [`api`]: REST API server with Axum
//! - [`config`]: TOML configuration with environment overrides
//! - [`logging`]: Tracing subscriber setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use floodlight::backend::{HttpMetricStore, NoAuth, StoreConfig};
//! use floodlight::query::{EngineSettings, QueryEngine};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = HttpMetricStore::new(StoreConfig::default(), Arc::new(NoAuth))?;
//!     let engine = QueryEngine::new(Arc::new(store), EngineSettings::default());
//!
//!     let nodes = engine.find("servers.*.cpu").await?;
//!     let result = engine.fetch(&nodes, 1426120000, 1426147000).await?;
//!
//!     println!("{} series, step {}s", result.series.len(), result.time_info.step);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod backend;
pub mod config;
pub mod logging;
pub mod query;

// Re-export top-level types for convenience
pub use backend::{
    BackendError, BackendResult, HttpMetricStore, InMemoryStore, MetricStore, StoreConfig,
};

pub use query::{
    EngineSettings, FetchResult, MetricPath, Node, PathTranslator, PointValue, QueryEngine,
    QueryError, QueryResult, TimeInfo,
};

pub use api::{build_router, serve, ApiError, AppState};

pub use config::{Config, ConfigError, LoggingConfig};
