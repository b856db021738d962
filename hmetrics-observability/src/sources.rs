use hmetrics_core::MetricSnapshot;
use hmetrics_engine::MetricsEngine;
use std::sync::Arc;

/// Anything that can produce a point-in-time list of series.
pub trait SnapshotSource: Send + Sync {
    fn snapshot(&self) -> Vec<MetricSnapshot>;
}

impl SnapshotSource for MetricsEngine {
    fn snapshot(&self) -> Vec<MetricSnapshot> {
        MetricsEngine::snapshot(self)
    }
}

/// Concatenate the snapshots of several sources, in source order.
///
/// Every source numbers its series on its own, so ids are shifted past the
/// highest id of the preceding sources. The result never repeats an id.
pub fn gather(sources: &[Arc<dyn SnapshotSource>]) -> Vec<MetricSnapshot> {
    let mut out = Vec::new();
    let mut offset = 0u64;
    for source in sources {
        let mut max_id = 0;
        for mut snap in source.snapshot() {
            max_id = max_id.max(snap.id);
            snap.id += offset;
            out.push(snap);
        }
        offset += max_id + 1;
    }
    out
}


#[cfg(feature = "prometheus")]
pub use self::registry::PrometheusRegistrySource;

#[cfg(feature = "prometheus")]
mod registry {
    use super::SnapshotSource;
    use hmetrics_core::{MetricSnapshot, MetricType};
    use prometheus::Registry;
    use prometheus::proto::{self, MetricFamily};
    use tracing::debug;

    /// Exposes metrics collected by a `prometheus::Registry`.
    ///
    /// Counters, gauges and histograms are converted; summaries and untyped
    /// families are skipped. Series ids follow gather order.
    #[derive(Clone, Default)]
    pub struct PrometheusRegistrySource {
        registry: Registry,
    }

    impl PrometheusRegistrySource {
        pub fn new(registry: Registry) -> Self {
            Self { registry }
        }

        /// Registry holding the CPU, memory and file-descriptor metrics of
        /// the current process.
        #[cfg(target_os = "linux")]
        pub fn with_process_collector() -> prometheus::Result<Self> {
            let registry = Registry::new();
            registry.register(Box::new(
                prometheus::process_collector::ProcessCollector::for_self(),
            ))?;
            Ok(Self { registry })
        }

        pub fn registry(&self) -> &Registry {
            &self.registry
        }
    }

    impl SnapshotSource for PrometheusRegistrySource {
        fn snapshot(&self) -> Vec<MetricSnapshot> {
            let mut out = Vec::new();
            let mut next_id = 0;
            for family in self.registry.gather() {
                convert_family(&family, &mut next_id, &mut out);
            }
            out
        }
    }

    impl std::fmt::Debug for PrometheusRegistrySource {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("PrometheusRegistrySource").finish_non_exhaustive()
        }
    }

    fn convert_family(family: &MetricFamily, next_id: &mut u64, out: &mut Vec<MetricSnapshot>) {
        let metric_type = match family.get_field_type() {
            proto::MetricType::COUNTER => MetricType::Counter,
            proto::MetricType::GAUGE => MetricType::Gauge,
            proto::MetricType::HISTOGRAM => MetricType::Histogram,
            other => {
                debug!(metric = family.get_name(), kind = ?other, "Skipping unsupported metric family");
                return;
            }
        };

        for metric in family.get_metric() {
            let labels = metric
                .get_label()
                .iter()
                .map(|l| (l.get_name().to_string(), l.get_value().to_string()))
                .collect();

            let (value, bounds, counts) = match metric_type {
                MetricType::Counter => (metric.get_counter().get_value(), Vec::new(), Vec::new()),
                MetricType::Gauge => (metric.get_gauge().get_value(), Vec::new(), Vec::new()),
                MetricType::Histogram => {
                    // Proto buckets are cumulative; snapshots hold per-bucket counts.
                    let h = metric.get_histogram();
                    let mut bounds = Vec::with_capacity(h.get_bucket().len());
                    let mut counts = Vec::with_capacity(h.get_bucket().len() + 1);
                    let mut prev = 0u64;
                    for bucket in h.get_bucket() {
                        let cumulative = bucket.get_cumulative_count();
                        bounds.push(bucket.get_upper_bound());
                        counts.push(cumulative.saturating_sub(prev));
                        prev = cumulative;
                    }
                    counts.push(h.get_sample_count().saturating_sub(prev));
                    (h.get_sample_sum(), bounds, counts)
                }
            };

            *next_id += 1;
            out.push(MetricSnapshot {
                id: *next_id,
                name: family.get_name().to_string(),
                help: family.get_help().to_string(),
                metric_type,
                value,
                labels,
                bounds,
                counts,
            });
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::prometheus_exporter::translate;
        use prometheus::{GaugeVec, HistogramOpts, HistogramVec, IntCounter, Opts};

        #[test]
        fn empty_registry_has_no_snapshots() {
            let source = PrometheusRegistrySource::new(Registry::new());
            assert!(source.snapshot().is_empty());
        }

        #[test]
        fn counters_and_gauges_keep_labels_and_help() {
            let registry = Registry::new();
            let counter = IntCounter::with_opts(Opts::new("jobs_total", "Jobs run")).unwrap();
            let gauge = GaugeVec::new(Opts::new("queue_depth", "Queued jobs"), &["queue"]).unwrap();
            registry.register(Box::new(counter.clone())).unwrap();
            registry.register(Box::new(gauge.clone())).unwrap();
            counter.inc_by(3);
            gauge.with_label_values(&["high"]).set(7.0);

            let snaps = PrometheusRegistrySource::new(registry).snapshot();
            let jobs = snaps.iter().find(|s| s.name == "jobs_total").unwrap();
            assert_eq!(jobs.metric_type, MetricType::Counter);
            assert_eq!(jobs.value, 3.0);
            assert_eq!(jobs.help, "Jobs run");

            let depth = snaps.iter().find(|s| s.name == "queue_depth").unwrap();
            assert_eq!(depth.labels.get("queue").map(String::as_str), Some("high"));
            assert_eq!(depth.value, 7.0);
        }

        #[test]
        fn histogram_buckets_are_decumulated() {
            let registry = Registry::new();
            let hist = HistogramVec::new(
                HistogramOpts::new("op_seconds", "Op latency").buckets(vec![1.0, 2.0]),
                &["op"],
            )
            .unwrap();
            registry.register(Box::new(hist.clone())).unwrap();
            for v in [0.5, 1.5, 3.0] {
                hist.with_label_values(&["read"]).observe(v);
            }

            let snaps = PrometheusRegistrySource::new(registry).snapshot();
            assert_eq!(snaps.len(), 1);
            assert_eq!(snaps[0].bounds, vec![1.0, 2.0]);
            assert_eq!(snaps[0].counts, vec![1, 1, 1]);
            assert_eq!(snaps[0].value, 5.0);

            let text = translate(snaps);
            assert!(text.contains("op_seconds_bucket{op=\"read\",le=\"2\"} 2\n"));
            assert!(text.contains("op_seconds_bucket{op=\"read\",le=\"+Inf\"} 3\n"));
            assert!(text.contains("op_seconds_count{op=\"read\"} 3\n"));
        }
    }
}
