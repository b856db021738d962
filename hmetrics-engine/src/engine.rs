use crate::map::{MapInner, MetricMap, SeriesTable};
use crate::series::Series;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use hmetrics_core::{HmetricsError, MetricLabels, MetricSnapshot, MetricType, Result};
use std::any::{Any, TypeId};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// A registered map, type-erased so maps over different key types can share
/// one name table.
struct Registered {
    metric_type: MetricType,
    key_type: TypeId,
    bounds: Arc<[f64]>,
    map: Arc<dyn Any + Send + Sync>,
}

/// In-process metric store.
///
/// Owns every registered metric map and the series created through them,
/// and produces point-in-time snapshots for exposition. Cloning is cheap;
/// clones share state.
#[derive(Clone, Default)]
pub struct MetricsEngine {
    maps: Arc<DashMap<String, Registered>>,
    table: Arc<SeriesTable>,
}

impl MetricsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide engine.
    pub fn global() -> &'static MetricsEngine {
        static ENGINE: OnceLock<MetricsEngine> = OnceLock::new();
        ENGINE.get_or_init(MetricsEngine::new)
    }

    /// Register a metric map, or return the one already registered under
    /// `name` when its type, key type and bounds match.
    ///
    /// `buckets` is only meaningful for histograms and is ignored otherwise.
    pub fn register_map<K: MetricLabels>(
        &self,
        metric_type: MetricType,
        name: &str,
        help: &str,
        buckets: &[f64],
    ) -> Result<MetricMap<K>> {
        validate_name(name)?;
        let bounds: Arc<[f64]> = if metric_type == MetricType::Histogram {
            validate_bounds(name, buckets)?;
            Arc::from(buckets)
        } else {
            Arc::from(Vec::new())
        };

        match self.maps.entry(name.to_string()) {
            Entry::Occupied(entry) => {
                let existing = entry.get();
                let conflict = |reason| HmetricsError::MetricConflict {
                    name: name.to_string(),
                    existing: existing.metric_type,
                    reason,
                };
                if existing.metric_type != metric_type {
                    return Err(conflict("different metric type"));
                }
                if existing.key_type != TypeId::of::<K>() {
                    return Err(conflict("different label key type"));
                }
                if existing.bounds[..] != bounds[..] {
                    return Err(conflict("different histogram buckets"));
                }
                let inner = Arc::clone(&existing.map)
                    .downcast::<MapInner<K>>()
                    .map_err(|_| conflict("different label key type"))?;
                debug!(metric = name, "Metric map already registered");
                Ok(MetricMap { inner })
            }
            Entry::Vacant(entry) => {
                let inner = Arc::new(MapInner::<K>::new(
                    metric_type,
                    name,
                    help,
                    Arc::clone(&bounds),
                    Arc::clone(&self.table),
                ));
                entry.insert(Registered {
                    metric_type,
                    key_type: TypeId::of::<K>(),
                    bounds,
                    map: inner.clone(),
                });
                info!(metric = name, kind = %metric_type, "Metric registered");
                Ok(MetricMap { inner })
            }
        }
    }

    /// Register an unlabeled metric and return its single series.
    pub fn register(
        &self,
        metric_type: MetricType,
        name: &str,
        help: &str,
        buckets: &[f64],
    ) -> Result<Arc<Series>> {
        let map = self.register_map::<()>(metric_type, name, help, buckets)?;
        Ok(map.get(&()))
    }

    /// Current state of every series, in creation order.
    pub fn snapshot(&self) -> Vec<MetricSnapshot> {
        let mut series: Vec<Arc<Series>> = self
            .table
            .series
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        series.sort_by_key(|s| s.id());
        series.iter().map(|s| s.snapshot()).collect()
    }

    /// Number of registered metric names.
    pub fn metric_count(&self) -> usize {
        self.maps.len()
    }

    /// Number of series across all metrics.
    pub fn series_count(&self) -> usize {
        self.table.series.len()
    }
}

impl std::fmt::Debug for MetricsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsEngine")
            .field("metrics", &self.maps.len())
            .field("series", &self.table.series.len())
            .finish()
    }
}

/// Metric names follow `[a-zA-Z_:][a-zA-Z0-9_:]*`.
fn validate_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_' || first == ':')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(HmetricsError::InvalidMetricName(name.to_string()))
    }
}

fn validate_bounds(name: &str, bounds: &[f64]) -> Result<()> {
    if bounds.iter().any(|b| b.is_nan()) {
        return Err(HmetricsError::InvalidBuckets(format!(
            "{name}: bucket bound is NaN"
        )));
    }
    if !bounds.windows(2).all(|w| w[0] < w[1]) {
        return Err(HmetricsError::InvalidBuckets(format!(
            "{name}: bucket bounds must be strictly increasing"
        )));
    }
    Ok(())
}
