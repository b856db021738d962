// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  hmetrics: label-keyed process metrics over Prometheus text
//
//  Recording:  lock-free series on a shared MetricsEngine
//  Export:     axum on a tokio runtime, /metrics /snapshot /health
//  Config:     YAML file + HMETRICS_* environment
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use clap::Parser;
use hmetrics_core::HmetricsConfig;
use hmetrics_core::config::LogConfig;
use hmetrics_observability::ComplexMetricRegistry;
use hmetrics_server::ServerState;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hmetrics", version, about = "Prometheus exporter for process metrics")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "/etc/hmetrics/hmetrics.yaml")]
    config: PathBuf,

    /// Log level; overrides `logging.level` from the config file
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ── Config ──
    let config_found = cli.config.exists();
    let config = if config_found {
        HmetricsConfig::load(&cli.config)?
    } else {
        HmetricsConfig::default()
    };

    // ── Tracing ──
    init_tracing(&config.logging, cli.log_level.as_deref());

    info!(version = env!("CARGO_PKG_VERSION"), "hmetrics starting");
    if config_found {
        info!(path = %cli.config.display(), "Loaded config file");
    } else {
        info!(path = %cli.config.display(), "No config file found, using defaults");
    }

    // ── Metrics ──
    let buckets = config.buckets.bounds()?;
    let registry = ComplexMetricRegistry::global();
    let mut state = ServerState::new(registry, &config.server.metrics_path, &buckets)?;
    if config.process_metrics {
        state = with_process_metrics(state);
    }
    info!(
        sources = state.sources.len(),
        buckets = buckets.len(),
        "Metric sources ready"
    );

    // ── Serve ──
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("hmetrics")
        .build()?;
    runtime.block_on(hmetrics_server::serve(&config.server, Arc::new(state)))?;

    info!("hmetrics stopped");
    Ok(())
}

fn init_tracing(logging: &LogConfig, cli_level: Option<&str>) {
    let level = cli_level.unwrap_or(&logging.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[cfg(target_os = "linux")]
fn with_process_metrics(state: ServerState) -> ServerState {
    use hmetrics_observability::sources::PrometheusRegistrySource;

    match PrometheusRegistrySource::with_process_collector() {
        Ok(source) => state.with_source(Arc::new(source)),
        Err(e) => {
            tracing::warn!(error = %e, "Process metrics unavailable");
            state
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn with_process_metrics(state: ServerState) -> ServerState {
    info!("Process metrics are only collected on Linux");
    state
}
