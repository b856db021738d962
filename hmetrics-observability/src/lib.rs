pub mod complex;
pub mod labeled;
pub mod prometheus_exporter;
pub mod sources;

pub use complex::{ComplexMetric, ComplexMetricRegistry, register_complex_map};
pub use labeled::{
    CounterMap, GaugeMap, HistogramMap, LabeledMetricMap, register_counter_map,
    register_gauge_map, register_histogram_map,
};
pub use prometheus_exporter::{render, translate};
pub use sources::SnapshotSource;
