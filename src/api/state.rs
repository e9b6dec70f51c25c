//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::Instant;

use crate::backend::MetricStore;
use crate::config::ApiConfig;
use crate::query::{EngineSettings, PathTranslator, QueryEngine};

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Find/fetch engine over the store
    pub engine: Arc<QueryEngine>,
    /// The store itself, for readiness checks
    pub store: Arc<dyn MetricStore>,
    /// API configuration
    pub config: Arc<ApiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    pub fn new(store: Arc<dyn MetricStore>, settings: EngineSettings, config: ApiConfig) -> Self {
        Self {
            engine: Arc::new(QueryEngine::new(Arc::clone(&store), settings)),
            store,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Name of the path translation mode
    pub fn mode(&self) -> &'static str {
        match self.engine.settings().translator {
            PathTranslator::Plain => "plain",
            PathTranslator::Aliased(_) => "aliased",
        }
    }
}
