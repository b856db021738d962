use crate::buckets::try_new_buckets;
use crate::error::Result;
use figment::{Figment, providers::{Env, Format, Serialized, Yaml}};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HmetricsConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub buckets: BucketConfig,
    #[serde(default)]
    pub logging: LogConfig,
    /// Export CPU / memory / fd metrics of this process.
    #[serde(default = "default_true")]
    pub process_metrics: bool,
}

/// Scrape endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_addr")]
    pub addr: String,
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,
}

/// Default histogram bounds, expanded with [`try_new_buckets`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketConfig {
    #[serde(default = "default_bucket_start")]
    pub start: f64,
    #[serde(default = "default_bucket_factor")]
    pub factor: f64,
    #[serde(default = "default_bucket_count")]
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

// ── Defaults ──────────────────────────────────────────────────

fn default_true() -> bool { true }
fn default_addr() -> String { "0.0.0.0:9464".into() }
fn default_metrics_path() -> String { "/metrics".into() }
fn default_bucket_start() -> f64 { 0.001 }
fn default_bucket_factor() -> f64 { 2.0 }
fn default_bucket_count() -> usize { 16 }
fn default_log_level() -> String { "info".into() }

// ── Impls ─────────────────────────────────────────────────────

impl Default for HmetricsConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            buckets: BucketConfig::default(),
            logging: LogConfig::default(),
            process_metrics: true,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: default_addr(),
            metrics_path: default_metrics_path(),
        }
    }
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            start: default_bucket_start(),
            factor: default_bucket_factor(),
            count: default_bucket_count(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl BucketConfig {
    /// Expand into histogram bounds, rejecting invalid parameters.
    pub fn bounds(&self) -> Result<Vec<f64>> {
        try_new_buckets(self.start, self.factor, self.count)
    }
}

impl HmetricsConfig {
    /// Load configuration from YAML file + env overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let config: HmetricsConfig = Self::figment(path).extract()?;
        tracing::debug!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(HmetricsConfig::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed("HMETRICS_").split("__"))
    }
}
