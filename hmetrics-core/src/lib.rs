pub mod buckets;
pub mod config;
pub mod error;
pub mod label;
pub mod snapshot;

pub use buckets::{new_buckets, try_new_buckets};
pub use config::HmetricsConfig;
pub use error::{HmetricsError, Result};
pub use label::{Label, MetricLabels};
pub use snapshot::{MetricSnapshot, MetricType};
