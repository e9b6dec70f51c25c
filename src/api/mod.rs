//! Floodlight HTTP API
//!
//! Graphite-compatible query surface, built with Axum.
//!
//! # Endpoints
//!
//! ## Find
//! - `GET /metrics/find?query=<glob>` - Branches and leaves matched by a glob
//!
//! ## Render
//! - `GET /render` - Aligned series for `target` globs over `from`/`until`
//! - `POST /render` - Same, parameters in a form body
//!
//! ## Health
//! - `GET /health/live` - Liveness check
//! - `GET /health/ready` - Readiness check
//! - `GET /health` - Full health status
//!
//! # Example
//!
//! ```rust,ignore
//! use floodlight::api::{serve, AppState};
//! use floodlight::backend::{HttpMetricStore, NoAuth, StoreConfig};
//! use floodlight::config::ApiConfig;
//! use floodlight::query::EngineSettings;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = HttpMetricStore::new(StoreConfig::default(), Arc::new(NoAuth))?;
//!     let config = ApiConfig::default();
//!
//!     let state = AppState::new(Arc::new(store), EngineSettings::default(), config.clone());
//!     serve(state, &config).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::ApiConfig;

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let metric_routes = Router::new().route("/find", get(routes::find::find_metrics));

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    let shared_state = Arc::new(state);

    Router::new()
        .nest("/metrics", metric_routes)
        .route(
            "/render",
            get(routes::render::render).post(routes::render::render),
        )
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(shared_state)
}

/// Start the API server
pub async fn serve(state: AppState, config: &ApiConfig) -> Result<(), ApiError> {
    let mode = state.mode();
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Floodlight API listening on {} ({} paths)", addr, mode);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Floodlight API shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
///
/// A handler that cannot be installed never fires; the other one still can.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{HttpMetricStore, InMemoryStore, NoAuth, Sample, StoreConfig};
    use crate::query::EngineSettings;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    fn test_store() -> InMemoryStore {
        InMemoryStore::new()
            .with_metric(
                "servers.web01.cpu",
                vec![
                    Sample::new(0).field("average", 1),
                    Sample::new(120_000).field("average", 3),
                ],
            )
            .with_metric("servers.web02.cpu", vec![])
    }

    fn create_test_app(store: InMemoryStore) -> Router {
        let state = AppState::new(Arc::new(store), EngineSettings::default(), ApiConfig::default());
        build_router(state)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    #[tokio::test]
    async fn test_health_live() {
        let (status, _) = get_json(create_test_app(test_store()), "/health/live").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_ready() {
        let (status, _) = get_json(create_test_app(test_store()), "/health/ready").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_full() {
        let (status, body) = get_json(create_test_app(test_store()), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["mode"], "plain");
    }

    /// A store whose every endpoint answers 503
    async fn spawn_failing_store() -> HttpMetricStore {
        let app = Router::new().fallback(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = StoreConfig {
            base_url: format!("http://{}", addr),
            request_timeout_ms: 5_000,
            ..Default::default()
        };
        HttpMetricStore::new(config, Arc::new(NoAuth)).unwrap()
    }

    fn app_over(store: HttpMetricStore) -> Router {
        let state = AppState::new(Arc::new(store), EngineSettings::default(), ApiConfig::default());
        build_router(state)
    }

    #[tokio::test]
    async fn test_health_ready_fails_on_store_error_status() {
        let store = spawn_failing_store().await;
        let app = app_over(store);
        let (status, _) = get_json(app.clone(), "/health/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, body) = get_json(app.clone(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "unhealthy");
        assert_eq!(body["store"], "error");

        // Find stays lenient and reports no matches
        let (status, body) = get_json(app, "/metrics/find?query=servers.*").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_find_branches() {
        let (status, body) =
            get_json(create_test_app(test_store()), "/metrics/find?query=servers.*").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!([
                {"text": "web01", "id": "servers.web01", "leaf": 0, "expandable": 1, "allowChildren": 1},
                {"text": "web02", "id": "servers.web02", "leaf": 0, "expandable": 1, "allowChildren": 1}
            ])
        );
    }

    #[tokio::test]
    async fn test_find_no_match() {
        let (status, body) =
            get_json(create_test_app(test_store()), "/metrics/find?query=nothing.*").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_render_get() {
        let (status, body) = get_json(
            create_test_app(test_store()),
            "/render?target=servers.web01.cpu&from=0&until=300",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!([{
                "target": "servers.web01.cpu",
                "datapoints": [[1, 0], [2, 60], [3, 120], [null, 180], [null, 240]]
            }])
        );
    }

    #[tokio::test]
    async fn test_render_post_form() {
        let app = create_test_app(test_store());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/render")
                    .header("Content-Type", "application/x-www-form-urlencoded")
                    .body(Body::from("target=servers.*.cpu&from=0&until=300"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        let targets: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["target"].as_str().unwrap())
            .collect();
        assert_eq!(targets, vec!["servers.web01.cpu", "servers.web02.cpu"]);
        assert_eq!(body[1]["datapoints"][0], json!([null, 0]));
    }

    #[tokio::test]
    async fn test_render_requires_target() {
        let (status, body) =
            get_json(create_test_app(test_store()), "/render?from=0&until=300").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_render_rejects_bad_times() {
        let app = create_test_app(test_store());
        let (status, _) = get_json(app, "/render?target=a&from=yesterday").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let app = create_test_app(test_store());
        let (status, _) = get_json(app, "/render?target=a&from=300&until=300").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_render_rejects_huge_windows() {
        let app = create_test_app(test_store());
        let (status, body) = get_json(
            app,
            "/render?target=servers.web01.cpu&from=0&until=20000000000000000",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        // Representable, but far more points than the grid allows
        let app = create_test_app(test_store());
        let (status, body) = get_json(
            app,
            "/render?target=servers.web01.cpu&from=-253402300799&until=253402300799",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_QUERY");
    }

    #[tokio::test]
    async fn test_render_store_failure() {
        let app = create_test_app(test_store().with_fetch_failure(503));
        let (status, body) =
            get_json(app, "/render?target=servers.web01.cpu&from=0&until=300").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "BACKEND_ERROR");
    }
}
