use hmetrics_core::{MetricSnapshot, MetricType};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// An `f64` stored as its bit pattern.
#[derive(Debug, Default)]
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn set(&self, v: f64) {
        self.0.store(v.to_bits(), Ordering::Relaxed);
    }

    fn add(&self, delta: f64) {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + delta).to_bits();
            match self
                .0
                .compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

/// Update handle for one concrete series.
///
/// Handles are shared (`Arc<Series>`) between every caller that recorded
/// under the same key; all updates are lock-free.
#[derive(Debug)]
pub struct Series {
    id: u64,
    metric_type: MetricType,
    name: Arc<str>,
    help: Arc<str>,
    labels: HashMap<String, String>,
    value: AtomicF64,
    bounds: Arc<[f64]>,
    counts: Box<[AtomicU64]>,
}

impl Series {
    pub(crate) fn new(
        id: u64,
        metric_type: MetricType,
        name: Arc<str>,
        help: Arc<str>,
        labels: HashMap<String, String>,
        bounds: Arc<[f64]>,
    ) -> Self {
        let buckets = if metric_type == MetricType::Histogram {
            bounds.len() + 1
        } else {
            0
        };
        Self {
            id,
            metric_type,
            name,
            help,
            labels,
            value: AtomicF64::default(),
            bounds,
            counts: (0..buckets).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn metric_type(&self) -> MetricType {
        self.metric_type
    }

    /// Current value: counter/gauge value, or the observation sum.
    pub fn value(&self) -> f64 {
        self.value.get()
    }

    /// Add `delta`. Counters only move forward, so negative or NaN deltas
    /// on a counter are dropped.
    #[inline]
    pub fn add(&self, delta: f64) {
        if self.metric_type == MetricType::Counter && !(delta >= 0.0) {
            debug!(metric = %self.name, delta, "Dropping non-monotonic counter delta");
            return;
        }
        self.value.add(delta);
    }

    /// Overwrite the current value.
    #[inline]
    pub fn set(&self, value: f64) {
        self.value.set(value);
    }

    /// Record one histogram observation.
    ///
    /// The observation lands in the first bucket whose upper bound is
    /// `>= value`, or in the overflow bucket. NaN observations are dropped.
    #[inline]
    pub fn put(&self, value: f64) {
        if self.metric_type != MetricType::Histogram {
            debug!(metric = %self.name, "put on a non-histogram series, recording as set");
            self.value.set(value);
            return;
        }
        if value.is_nan() {
            debug!(metric = %self.name, "Dropping NaN histogram observation");
            return;
        }
        let idx = self.bounds.partition_point(|b| *b < value);
        self.counts[idx].fetch_add(1, Ordering::Relaxed);
        self.value.add(value);
    }

    /// Per-bucket counts, overflow last.
    pub fn counts(&self) -> Vec<u64> {
        self.counts
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .collect()
    }

    /// Point-in-time copy of this series.
    ///
    /// Counts and sum are read one atomic at a time. Under concurrent `put`
    /// calls the histogram `_count` and `_sum` may disagree by the
    /// observations in flight; each settles once writers are quiescent.
    pub fn snapshot(&self) -> MetricSnapshot {
        let (bounds, counts) = if self.metric_type == MetricType::Histogram {
            (self.bounds.to_vec(), self.counts())
        } else {
            (Vec::new(), Vec::new())
        };
        MetricSnapshot {
            id: self.id,
            name: self.name.to_string(),
            help: self.help.to_string(),
            metric_type: self.metric_type,
            value: self.value.get(),
            labels: self.labels.clone(),
            bounds,
            counts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(metric_type: MetricType, bounds: &[f64]) -> Series {
        Series::new(
            1,
            metric_type,
            Arc::from("test_metric"),
            Arc::from(""),
            HashMap::new(),
            Arc::from(bounds),
        )
    }

    #[test]
    fn counter_accumulates_and_ignores_negative_deltas() {
        let s = series(MetricType::Counter, &[]);
        s.add(1.5);
        s.add(2.0);
        s.add(-10.0);
        s.add(f64::NAN);
        assert_eq!(s.value(), 3.5);
    }

    #[test]
    fn gauge_moves_both_ways() {
        let s = series(MetricType::Gauge, &[]);
        s.add(5.0);
        s.add(-7.0);
        assert_eq!(s.value(), -2.0);
        s.set(42.0);
        assert_eq!(s.value(), 42.0);
    }

    #[test]
    fn histogram_put_uses_inclusive_upper_bounds() {
        let s = series(MetricType::Histogram, &[1.0, 5.0]);
        s.put(0.5);
        s.put(1.0);
        s.put(3.0);
        s.put(5.0);
        s.put(9.0);
        assert_eq!(s.counts(), vec![2, 2, 1]);
        assert_eq!(s.value(), 18.5);
    }

    #[test]
    fn histogram_drops_nan_observations() {
        let s = series(MetricType::Histogram, &[1.0, 5.0]);
        s.put(f64::NAN);
        s.put(2.0);
        assert_eq!(s.counts(), vec![0, 1, 0]);
        assert_eq!(s.value(), 2.0);
    }

    #[test]
    fn quiescent_histogram_snapshot_sum_matches_counts() {
        let s = Arc::new(series(MetricType::Histogram, &[0.5]));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let s = Arc::clone(&s);
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        s.put(1.0);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let snap = s.snapshot();
        assert_eq!(snap.total_count(), 1000);
        assert_eq!(snap.value, 1000.0);
    }

    #[test]
    fn histogram_snapshot_has_overflow_bucket() {
        let s = series(MetricType::Histogram, &[0.1, 0.2, 0.4]);
        s.put(10.0);
        let snap = s.snapshot();
        assert_eq!(snap.bounds.len() + 1, snap.counts.len());
        assert_eq!(snap.counts, vec![0, 0, 0, 1]);
    }

    #[test]
    fn scalar_snapshot_has_no_buckets() {
        let s = series(MetricType::Gauge, &[1.0]);
        s.set(3.0);
        let snap = s.snapshot();
        assert!(snap.bounds.is_empty());
        assert!(snap.counts.is_empty());
        assert_eq!(snap.value, 3.0);
    }

    #[test]
    fn concurrent_adds_are_not_lost() {
        let s = Arc::new(series(MetricType::Counter, &[]));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let s = Arc::clone(&s);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        s.add(1.0);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(s.value(), 8000.0);
    }
}
