use crate::snapshot::MetricType;
use thiserror::Error;

/// Unified error type for hmetrics.
#[derive(Error, Debug)]
pub enum HmetricsError {
    #[error("Invalid buckets: {0}")]
    InvalidBuckets(String),

    #[error("Invalid metric name: {0:?}")]
    InvalidMetricName(String),

    #[error("Metric {name:?} already registered as {existing} ({reason})")]
    MetricConflict {
        name: String,
        existing: MetricType,
        reason: &'static str,
    },

    #[error("Config error: {0}")]
    Config(#[from] Box<figment::Error>),
}

impl From<figment::Error> for HmetricsError {
    fn from(err: figment::Error) -> Self {
        HmetricsError::Config(Box::new(err))
    }
}

/// Result type alias for hmetrics operations.
pub type Result<T> = std::result::Result<T, HmetricsError>;
