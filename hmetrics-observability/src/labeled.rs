use hmetrics_core::{Label, MetricLabels, MetricType, Result};
use hmetrics_engine::{MetricMap, MetricsEngine, Series};
use std::sync::Arc;

/// Keyed accessor over one logical metric.
///
/// Holds no metric state of its own: each key resolves to an engine-owned
/// series, created on first use and never evicted.
#[derive(Debug)]
pub struct LabeledMetricMap<K> {
    map: MetricMap<K>,
}

impl<K> Clone for LabeledMetricMap<K> {
    fn clone(&self) -> Self {
        Self {
            map: self.map.clone(),
        }
    }
}

impl<K: MetricLabels> LabeledMetricMap<K> {
    pub fn register(
        engine: &MetricsEngine,
        metric_type: MetricType,
        name: &str,
        help: &str,
        buckets: &[f64],
    ) -> Result<Self> {
        Ok(Self {
            map: engine.register_map(metric_type, name, help, buckets)?,
        })
    }

    /// Series handle for `key`.
    #[inline]
    pub fn series(&self, key: &K) -> Arc<Series> {
        self.map.get(key)
    }

    pub fn name(&self) -> &str {
        self.map.name()
    }

    pub fn metric_type(&self) -> MetricType {
        self.map.metric_type()
    }

    /// Number of distinct keys recorded so far.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Counter keyed by `(name, item)`.
#[derive(Debug, Clone)]
pub struct CounterMap(LabeledMetricMap<Label>);

impl CounterMap {
    pub fn add(&self, name: &str, item: &str, v: f64) {
        self.0.series(&Label::new(name, item)).add(v);
    }

    pub fn set(&self, name: &str, item: &str, v: f64) {
        self.0.series(&Label::new(name, item)).set(v);
    }

    pub fn inner(&self) -> &LabeledMetricMap<Label> {
        &self.0
    }
}

/// Gauge keyed by `(name, item)`.
#[derive(Debug, Clone)]
pub struct GaugeMap(LabeledMetricMap<Label>);

impl GaugeMap {
    pub fn add(&self, name: &str, item: &str, v: f64) {
        self.0.series(&Label::new(name, item)).add(v);
    }

    pub fn set(&self, name: &str, item: &str, v: f64) {
        self.0.series(&Label::new(name, item)).set(v);
    }

    pub fn inner(&self) -> &LabeledMetricMap<Label> {
        &self.0
    }
}

/// Histogram keyed by `(name, item)`.
#[derive(Debug, Clone)]
pub struct HistogramMap(LabeledMetricMap<Label>);

impl HistogramMap {
    /// Record `v` as one observation.
    pub fn add(&self, name: &str, item: &str, v: f64) {
        self.0.series(&Label::new(name, item)).put(v);
    }

    pub fn inner(&self) -> &LabeledMetricMap<Label> {
        &self.0
    }
}

pub fn register_counter_map(engine: &MetricsEngine, name: &str, help: &str) -> Result<CounterMap> {
    LabeledMetricMap::register(engine, MetricType::Counter, name, help, &[]).map(CounterMap)
}

pub fn register_gauge_map(engine: &MetricsEngine, name: &str, help: &str) -> Result<GaugeMap> {
    LabeledMetricMap::register(engine, MetricType::Gauge, name, help, &[]).map(GaugeMap)
}

pub fn register_histogram_map(
    engine: &MetricsEngine,
    name: &str,
    help: &str,
    buckets: &[f64],
) -> Result<HistogramMap> {
    LabeledMetricMap::register(engine, MetricType::Histogram, name, help, buckets)
        .map(HistogramMap)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_of(engine: &MetricsEngine, metric: &str, item: &str) -> Option<f64> {
        engine
            .snapshot()
            .into_iter()
            .find(|s| s.name == metric && s.labels.get("item").map(String::as_str) == Some(item))
            .map(|s| s.value)
    }

    #[test]
    fn counter_map_add_and_set() {
        let engine = MetricsEngine::new();
        let counter = register_counter_map(&engine, "jobs_total", "Jobs").unwrap();
        counter.add("queue", "high", 2.0);
        counter.add("queue", "high", 3.0);
        assert_eq!(value_of(&engine, "jobs_total", "high"), Some(5.0));

        counter.set("queue", "high", 1.0);
        assert_eq!(value_of(&engine, "jobs_total", "high"), Some(1.0));
    }

    #[test]
    fn gauge_map_tracks_keys_independently() {
        let engine = MetricsEngine::new();
        let gauge = register_gauge_map(&engine, "conns", "").unwrap();
        gauge.add("pool", "a", 4.0);
        gauge.add("pool", "b", 1.0);
        gauge.add("pool", "a", -1.0);
        assert_eq!(value_of(&engine, "conns", "a"), Some(3.0));
        assert_eq!(value_of(&engine, "conns", "b"), Some(1.0));
        assert_eq!(gauge.inner().len(), 2);
    }

    #[test]
    fn histogram_map_add_is_an_observation() {
        let engine = MetricsEngine::new();
        let hist = register_histogram_map(&engine, "size_bytes", "", &[10.0, 100.0]).unwrap();
        hist.add("req", "body", 5.0);
        hist.add("req", "body", 50.0);
        hist.add("req", "body", 500.0);

        let snap = engine
            .snapshot()
            .into_iter()
            .find(|s| s.name == "size_bytes")
            .unwrap();
        assert_eq!(snap.counts, vec![1, 1, 1]);
        assert_eq!(snap.value, 555.0);
    }

    #[test]
    fn histogram_map_ignores_nan() {
        let engine = MetricsEngine::new();
        let hist = register_histogram_map(&engine, "wait_seconds", "", &[1.0]).unwrap();
        hist.add("queue", "a", f64::NAN);
        hist.add("queue", "a", 0.5);
        let snap = engine.snapshot().remove(0);
        assert_eq!(snap.counts, vec![1, 0]);
        assert_eq!(snap.value, 0.5);
    }

    #[test]
    fn maps_are_debug_formatted_by_name() {
        let engine = MetricsEngine::new();
        let counter = register_counter_map(&engine, "jobs_total", "").unwrap();
        assert!(format!("{counter:?}").contains("jobs_total"));
    }

    #[test]
    fn generic_map_over_unit_key() {
        let engine = MetricsEngine::new();
        let map = LabeledMetricMap::<()>::register(&engine, MetricType::Gauge, "up", "", &[]).unwrap();
        map.series(&()).set(1.0);
        assert_eq!(map.len(), 1);
        assert!(engine.snapshot()[0].labels.is_empty());
    }
}
