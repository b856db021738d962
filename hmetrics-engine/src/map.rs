use crate::series::Series;
use dashmap::DashMap;
use hmetrics_core::{MetricLabels, MetricType};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Every series created by one engine, keyed by series id.
#[derive(Debug, Default)]
pub(crate) struct SeriesTable {
    pub(crate) series: DashMap<u64, Arc<Series>>,
    next_id: AtomicU64,
}

impl SeriesTable {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

pub(crate) struct MapInner<K> {
    pub(crate) metric_type: MetricType,
    pub(crate) name: Arc<str>,
    pub(crate) help: Arc<str>,
    pub(crate) bounds: Arc<[f64]>,
    series: DashMap<K, Arc<Series>>,
    table: Arc<SeriesTable>,
}

impl<K: MetricLabels> MapInner<K> {
    pub(crate) fn new(
        metric_type: MetricType,
        name: &str,
        help: &str,
        bounds: Arc<[f64]>,
        table: Arc<SeriesTable>,
    ) -> Self {
        Self {
            metric_type,
            name: Arc::from(name),
            help: Arc::from(help),
            bounds,
            series: DashMap::new(),
            table,
        }
    }

    fn create(&self, key: &K) -> Arc<Series> {
        let labels: HashMap<String, String> = key
            .label_pairs()
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        let id = self.table.next_id();
        let series = Arc::new(Series::new(
            id,
            self.metric_type,
            Arc::clone(&self.name),
            Arc::clone(&self.help),
            labels,
            Arc::clone(&self.bounds),
        ));
        self.table.series.insert(id, Arc::clone(&series));
        debug!(metric = %self.name, id, "Series created");
        series
    }
}

/// A named, typed family of series keyed by `K`.
///
/// Series are created on first access and live as long as the engine.
/// Cloning is cheap; clones share the same series.
pub struct MetricMap<K> {
    pub(crate) inner: Arc<MapInner<K>>,
}

impl<K> Clone for MetricMap<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: MetricLabels> MetricMap<K> {
    /// Get the series for `key`, creating it on first use.
    pub fn get(&self, key: &K) -> Arc<Series> {
        if let Some(series) = self.inner.series.get(key) {
            return Arc::clone(series.value());
        }
        let entry = self
            .inner
            .series
            .entry(key.clone())
            .or_insert_with(|| self.inner.create(key));
        Arc::clone(entry.value())
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn help(&self) -> &str {
        &self.inner.help
    }

    pub fn metric_type(&self) -> MetricType {
        self.inner.metric_type
    }

    /// Histogram bounds; empty for counters and gauges.
    pub fn bounds(&self) -> &[f64] {
        &self.inner.bounds
    }

    /// Number of distinct keys seen so far.
    pub fn len(&self) -> usize {
        self.inner.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.series.is_empty()
    }
}

impl<K> std::fmt::Debug for MetricMap<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricMap")
            .field("name", &self.inner.name)
            .field("type", &self.inner.metric_type)
            .field("bounds", &self.inner.bounds)
            .finish_non_exhaustive()
    }
}
