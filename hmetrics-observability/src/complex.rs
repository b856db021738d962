//! Counter + gauge + histogram bundles registered under one logical name.
//!
//! A [`ComplexMetric`] named `x` owns three engine maps, `x_counter`,
//! `x_gauge` and `x_histogram`, all keyed by [`Label`]. One call to
//! [`ComplexMetric::add`] updates whichever of them actually changed.

use hmetrics_core::{Label, MetricType, Result};
use hmetrics_engine::{MetricMap, MetricsEngine};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tracing::debug;

/// Named bundle of one counter, one gauge and one histogram map.
#[derive(Debug)]
pub struct ComplexMetric {
    name: String,
    counter: MetricMap<Label>,
    gauge: MetricMap<Label>,
    histogram: MetricMap<Label>,
}

impl ComplexMetric {
    /// Record one event for `(name, item)`.
    ///
    /// - the counter moves only when `c > 0`
    /// - the gauge moves by `g` only when `g != 0`
    /// - the histogram observes `t` in seconds when a duration is given;
    ///   `Some(Duration::ZERO)` is a real observation
    pub fn add(&self, name: &str, item: &str, c: f64, g: f64, t: Option<Duration>) {
        let label = Label::new(name, item);
        if c > 0.0 {
            self.counter.get(&label).add(c);
        }
        if g != 0.0 {
            self.gauge.get(&label).add(g);
        }
        if let Some(t) = t {
            self.histogram.get(&label).put(t.as_secs_f64());
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn counter(&self) -> &MetricMap<Label> {
        &self.counter
    }

    pub fn gauge(&self) -> &MetricMap<Label> {
        &self.gauge
    }

    pub fn histogram(&self) -> &MetricMap<Label> {
        &self.histogram
    }
}

/// Name-keyed, idempotent registry of [`ComplexMetric`]s.
///
/// The lock covers lookup-or-insert only; recording goes straight to the
/// returned bundle.
#[derive(Debug)]
pub struct ComplexMetricRegistry {
    engine: MetricsEngine,
    metrics: Mutex<HashMap<String, Arc<ComplexMetric>>>,
}

impl ComplexMetricRegistry {
    pub fn new(engine: MetricsEngine) -> Self {
        Self {
            engine,
            metrics: Mutex::new(HashMap::new()),
        }
    }

    /// Registry bound to [`MetricsEngine::global`].
    pub fn global() -> &'static ComplexMetricRegistry {
        static REGISTRY: OnceLock<ComplexMetricRegistry> = OnceLock::new();
        REGISTRY.get_or_init(|| ComplexMetricRegistry::new(MetricsEngine::global().clone()))
    }

    pub fn engine(&self) -> &MetricsEngine {
        &self.engine
    }

    /// Register `name`, or return the bundle registered earlier under it.
    ///
    /// A repeated call returns the existing bundle unchanged; `help` and
    /// `buckets` of later calls are ignored.
    pub fn register_complex_map(
        &self,
        name: &str,
        help: &str,
        buckets: &[f64],
    ) -> Result<Arc<ComplexMetric>> {
        let mut metrics = self.metrics.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = metrics.get(name) {
            return Ok(Arc::clone(existing));
        }

        let metric = Arc::new(ComplexMetric {
            name: name.to_string(),
            counter: self.engine.register_map(
                MetricType::Counter,
                &format!("{name}_counter"),
                help,
                &[],
            )?,
            gauge: self.engine.register_map(
                MetricType::Gauge,
                &format!("{name}_gauge"),
                help,
                &[],
            )?,
            histogram: self.engine.register_map(
                MetricType::Histogram,
                &format!("{name}_histogram"),
                help,
                buckets,
            )?,
        });
        metrics.insert(name.to_string(), Arc::clone(&metric));
        debug!(metric = name, "Complex metric registered");
        Ok(metric)
    }

    /// Number of registered bundles.
    pub fn len(&self) -> usize {
        self.metrics.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Register on the process-wide registry.
pub fn register_complex_map(name: &str, help: &str, buckets: &[f64]) -> Result<Arc<ComplexMetric>> {
    ComplexMetricRegistry::global().register_complex_map(name, help, buckets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hmetrics_core::MetricSnapshot;

    fn find<'a>(snaps: &'a [MetricSnapshot], name: &str) -> Option<&'a MetricSnapshot> {
        snaps.iter().find(|s| s.name == name)
    }

    // ── Registration ─────────────────────────────────────────────

    #[test]
    fn register_creates_three_suffixed_metrics() {
        let engine = MetricsEngine::new();
        let registry = ComplexMetricRegistry::new(engine.clone());
        registry
            .register_complex_map("rpc", "RPC activity", &[0.1, 1.0])
            .unwrap();

        assert_eq!(engine.metric_count(), 3);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn register_twice_returns_the_same_bundle() {
        let registry = ComplexMetricRegistry::new(MetricsEngine::new());
        let a = registry.register_complex_map("x", "help", &[1.0]).unwrap();
        let b = registry.register_complex_map("x", "other help", &[5.0]).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn register_conflicting_engine_name_fails() {
        let engine = MetricsEngine::new();
        engine
            .register_map::<Label>(MetricType::Gauge, "db_counter", "", &[])
            .unwrap();
        let registry = ComplexMetricRegistry::new(engine);
        assert!(registry.register_complex_map("db", "", &[1.0]).is_err());
        assert!(registry.is_empty());
    }

    // ── Conditional updates ──────────────────────────────────────

    #[test]
    fn add_updates_only_changed_parts() {
        let engine = MetricsEngine::new();
        let registry = ComplexMetricRegistry::new(engine.clone());
        let m = registry.register_complex_map("op", "", &[0.5, 1.0]).unwrap();

        m.add("disk", "read", 0.0, 0.0, None);
        assert!(engine.snapshot().is_empty());

        m.add("disk", "read", 1.0, 0.0, None);
        let snaps = engine.snapshot();
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].name, "op_counter");

        m.add("disk", "read", -3.0, 2.0, None);
        let snaps = engine.snapshot();
        assert_eq!(find(&snaps, "op_counter").unwrap().value, 1.0);
        assert_eq!(find(&snaps, "op_gauge").unwrap().value, 2.0);
        assert!(find(&snaps, "op_histogram").is_none());
    }

    #[test]
    fn zero_duration_is_recorded() {
        let engine = MetricsEngine::new();
        let registry = ComplexMetricRegistry::new(engine.clone());
        let m = registry.register_complex_map("op", "", &[0.5, 1.0]).unwrap();

        m.add("disk", "write", 0.0, 0.0, Some(Duration::ZERO));
        let snaps = engine.snapshot();
        let hist = find(&snaps, "op_histogram").unwrap();
        assert_eq!(hist.counts, vec![1, 0, 0]);
        assert_eq!(hist.value, 0.0);
    }

    #[test]
    fn duration_is_observed_in_seconds() {
        let engine = MetricsEngine::new();
        let registry = ComplexMetricRegistry::new(engine.clone());
        let m = registry.register_complex_map("op", "", &[0.5, 1.0]).unwrap();

        m.add("disk", "write", 0.0, 0.0, Some(Duration::from_millis(750)));
        let snaps = engine.snapshot();
        let hist = find(&snaps, "op_histogram").unwrap();
        assert_eq!(hist.counts, vec![0, 1, 0]);
        assert_eq!(hist.value, 0.75);
    }

    #[test]
    fn negative_gauge_delta_is_applied() {
        let engine = MetricsEngine::new();
        let registry = ComplexMetricRegistry::new(engine.clone());
        let m = registry.register_complex_map("sessions", "", &[1.0]).unwrap();
        m.add("svc", "web", 0.0, 3.0, None);
        m.add("svc", "web", 0.0, -1.0, None);
        let snaps = engine.snapshot();
        assert_eq!(find(&snaps, "sessions_gauge").unwrap().value, 2.0);
    }

    #[test]
    fn concurrent_registration_yields_one_bundle() {
        let registry = Arc::new(ComplexMetricRegistry::new(MetricsEngine::new()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.register_complex_map("race", "", &[1.0]).unwrap())
            })
            .collect();
        let bundles: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(bundles.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(registry.engine().metric_count(), 3);
    }
}
