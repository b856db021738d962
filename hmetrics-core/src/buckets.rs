use crate::error::{HmetricsError, Result};

/// Geometric histogram bounds: `start, start*factor, start*factor^2, ...`.
///
/// # Panics
///
/// Panics unless `count >= 1`, `start > 0` and `factor > 1`. Bounds are
/// chosen while wiring metrics at startup, so a bad value is a programming
/// error rather than a runtime condition.
pub fn new_buckets(start: f64, factor: f64, count: usize) -> Vec<f64> {
    match try_new_buckets(start, factor, count) {
        Ok(buckets) => buckets,
        Err(e) => panic!("new_buckets: {e}"),
    }
}

/// Fallible form of [`new_buckets`], used for bounds read from configuration.
pub fn try_new_buckets(start: f64, factor: f64, count: usize) -> Result<Vec<f64>> {
    if count < 1 {
        return Err(HmetricsError::InvalidBuckets(
            "bucket count must be positive".into(),
        ));
    }
    // Negated comparisons so NaN is rejected too.
    if !(start > 0.0) {
        return Err(HmetricsError::InvalidBuckets(format!(
            "start must be positive, got {start}"
        )));
    }
    if !(factor > 1.0) {
        return Err(HmetricsError::InvalidBuckets(format!(
            "factor must be greater than 1, got {factor}"
        )));
    }

    let mut buckets = Vec::with_capacity(count);
    let mut bound = start;
    for _ in 0..count {
        buckets.push(bound);
        bound *= factor;
    }
    Ok(buckets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubling_buckets() {
        assert_eq!(new_buckets(1.0, 2.0, 5), vec![1.0, 2.0, 4.0, 8.0, 16.0]);
    }

    #[test]
    fn single_bucket_is_start() {
        assert_eq!(new_buckets(0.25, 10.0, 1), vec![0.25]);
    }

    #[test]
    fn fractional_factor_grows_strictly() {
        let buckets = new_buckets(0.001, 1.5, 20);
        assert_eq!(buckets.len(), 20);
        assert!(buckets.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    #[should_panic(expected = "count")]
    fn zero_count_panics() {
        new_buckets(1.0, 2.0, 0);
    }

    #[test]
    #[should_panic(expected = "start")]
    fn zero_start_panics() {
        new_buckets(0.0, 2.0, 3);
    }

    #[test]
    #[should_panic(expected = "factor")]
    fn unit_factor_panics() {
        new_buckets(1.0, 1.0, 3);
    }

    #[test]
    fn try_new_buckets_reports_instead_of_panicking() {
        assert!(matches!(
            try_new_buckets(-1.0, 2.0, 3),
            Err(HmetricsError::InvalidBuckets(_))
        ));
        assert!(matches!(
            try_new_buckets(1.0, f64::NAN, 3),
            Err(HmetricsError::InvalidBuckets(_))
        ));
        assert!(try_new_buckets(1.0, 2.0, 3).is_ok());
    }
}
