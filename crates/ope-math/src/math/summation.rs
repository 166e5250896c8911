//! Compensated summation and moment statistics.
//!
//! Importance-weighted estimates sum many terms of wildly different
//! magnitude (a handful of large weights among thousands of near-zero
//! ones), so plain left-to-right summation loses precision exactly where
//! the estimate is most fragile. All aggregation in the estimation engine
//! goes through the Kahan-compensated routines here.

/// Kahan-compensated sum of a slice.
///
/// Returns 0.0 for empty input. NaN inputs propagate.
pub fn kahan_sum(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut comp = 0.0;
    for &v in values {
        let y = v - comp;
        let t = sum + y;
        comp = (t - sum) - y;
        sum = t;
    }
    sum
}

/// Arithmetic mean with compensated summation.
///
/// Returns NaN for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    kahan_sum(values) / values.len() as f64
}

/// Unbiased sample variance (n-1 denominator).
///
/// Returns 0.0 for slices with fewer than two elements.
pub fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let deviations: Vec<f64> = values.iter().map(|v| (v - m) * (v - m)).collect();
    kahan_sum(&deviations) / (values.len() as f64 - 1.0)
}

/// Sample standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    sample_variance(values).sqrt()
}

/// Mean of `a[i] * b[i]` over paired slices.
///
/// Slices must have equal length; returns NaN when empty.
pub fn mean_product(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    if a.is_empty() {
        return f64::NAN;
    }
    let products: Vec<f64> = a.iter().zip(b.iter()).map(|(x, y)| x * y).collect();
    mean(&products)
}
