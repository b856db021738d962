use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of a metric, shared by every series registered under one name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
}

impl MetricType {
    /// Name used on the `# TYPE` line of the exposition format.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
            MetricType::Histogram => "histogram",
        }
    }
}

impl std::fmt::Display for MetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Point-in-time readout of a single series.
///
/// For histograms `value` holds the sum of all observations, `bounds` the
/// bucket upper bounds in increasing order, and `counts` the per-bucket
/// (non-cumulative) observation counts. `counts` has one more entry than
/// `bounds`: the last one counts observations above every bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub help: String,
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    pub value: f64,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bounds: Vec<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub counts: Vec<u64>,
}

impl MetricSnapshot {
    /// Snapshot of an unlabeled counter or gauge.
    pub fn scalar(id: u64, name: impl Into<String>, metric_type: MetricType, value: f64) -> Self {
        Self {
            id,
            name: name.into(),
            help: String::new(),
            metric_type,
            value,
            labels: HashMap::new(),
            bounds: Vec::new(),
            counts: Vec::new(),
        }
    }

    /// Snapshot of an unlabeled histogram.
    pub fn histogram(
        id: u64,
        name: impl Into<String>,
        sum: f64,
        bounds: Vec<f64>,
        counts: Vec<u64>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            help: String::new(),
            metric_type: MetricType::Histogram,
            value: sum,
            labels: HashMap::new(),
            bounds,
            counts,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(name.into(), value.into());
        self
    }

    /// Total number of observations across all buckets, overflow included.
    pub fn total_count(&self) -> u64 {
        self.counts.iter().sum()
    }
}
