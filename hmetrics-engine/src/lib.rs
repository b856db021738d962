pub mod engine;
pub mod map;
pub mod series;

pub use engine::MetricsEngine;
pub use map::MetricMap;
pub use series::Series;
