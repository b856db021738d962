use anyhow::bail;
use axum::{
    Router,
    extract::State,
    http::header,
    response::{IntoResponse, Json},
    routing::get,
};
use hmetrics_core::MetricSnapshot;
use hmetrics_core::config::ServerConfig;
use hmetrics_observability::prometheus_exporter::{CONTENT_TYPE, translate};
use hmetrics_observability::sources::gather;
use hmetrics_observability::{ComplexMetric, ComplexMetricRegistry, SnapshotSource};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Complex metric recording every scrape of the metrics endpoint.
pub const SCRAPE_METRIC: &str = "hmetrics_scrape";

const RESERVED_PATHS: [&str; 2] = ["/snapshot", "/health"];

/// Shared state for the exporter routes.
pub struct ServerState {
    pub sources: Vec<Arc<dyn SnapshotSource>>,
    pub scrape: Arc<ComplexMetric>,
    pub metrics_path: String,
}

impl ServerState {
    /// State exporting `registry`'s engine, with scrape accounting registered
    /// on the same registry.
    pub fn new(
        registry: &ComplexMetricRegistry,
        metrics_path: &str,
        buckets: &[f64],
    ) -> anyhow::Result<Self> {
        let metrics_path = if metrics_path.starts_with('/') {
            metrics_path.to_string()
        } else {
            format!("/{metrics_path}")
        };
        if let Some(c) = metrics_path.chars().find(|c| !is_path_char(*c)) {
            bail!("metrics path {metrics_path:?} contains unsupported character {c:?}");
        }
        if RESERVED_PATHS.contains(&metrics_path.as_str()) {
            bail!("metrics path {metrics_path} collides with a built-in route");
        }

        let scrape = registry.register_complex_map(
            SCRAPE_METRIC,
            "Scrapes served by the metrics endpoint",
            buckets,
        )?;
        let engine: Arc<dyn SnapshotSource> = Arc::new(registry.engine().clone());

        Ok(Self {
            sources: vec![engine],
            scrape,
            metrics_path,
        })
    }

    /// Export `source` after the ones already attached.
    pub fn with_source(mut self, source: Arc<dyn SnapshotSource>) -> Self {
        self.sources.push(source);
        self
    }
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("sources", &self.sources.len())
            .field("metrics_path", &self.metrics_path)
            .finish_non_exhaustive()
    }
}

/// Build the exporter router.
pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route(&state.metrics_path, get(metrics_handler))
        .route("/snapshot", get(snapshot_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Bind `config.addr` and serve until Ctrl-C or SIGTERM.
pub async fn serve(config: &ServerConfig, state: Arc<ServerState>) -> anyhow::Result<()> {
    if !config.enabled {
        info!("Metrics server disabled");
        return Ok(());
    }

    let listener = tokio::net::TcpListener::bind(&config.addr).await?;
    info!(
        addr = %listener.local_addr()?,
        path = %state.metrics_path,
        "Starting metrics server"
    );

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Metrics server stopped");
    Ok(())
}

/// Characters accepted in the configured metrics path; route syntax such as
/// `{param}` or `*` is not.
fn is_path_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '_' | '.' | '~')
}

async fn metrics_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let start = Instant::now();
    let body = translate(gather(&state.sources));
    // Recorded after rendering; a scrape shows up in the next one.
    state
        .scrape
        .add("path", &state.metrics_path, 1.0, 0.0, Some(start.elapsed()));
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], body)
}

async fn snapshot_handler(State(state): State<Arc<ServerState>>) -> Json<Vec<MetricSnapshot>> {
    Json(gather(&state.sources))
}

async fn health_handler(State(state): State<Arc<ServerState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "sources": state.sources.len(),
    }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
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
    info!("Shutdown signal received");
}
