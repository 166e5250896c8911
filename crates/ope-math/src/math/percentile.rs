//! Empirical percentiles for bootstrap interval construction.

/// Empirical percentile with linear interpolation between order statistics.
///
/// `p` is in [0, 100]. Non-finite samples are dropped before ranking.
/// Returns None for empty (or all-non-finite) input.
pub fn percentile(samples: &[f64], p: f64) -> Option<f64> {
    let mut values: Vec<f64> = samples.iter().copied().filter(|v| v.is_finite()).collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let p = p.clamp(0.0, 100.0);
    let rank = p / 100.0 * (values.len() as f64 - 1.0);
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return Some(values[lo]);
    }
    let frac = rank - lo as f64;
    Some(values[lo] + frac * (values[hi] - values[lo]))
}

/// Lower and upper percentiles in one sorting pass.
///
/// Used for the 2.5/97.5 bootstrap interval; `lower_p` and `upper_p` are
/// percentages. Returns None for empty input.
pub fn percentile_pair(samples: &[f64], lower_p: f64, upper_p: f64) -> Option<(f64, f64)> {
    let mut values: Vec<f64> = samples.iter().copied().filter(|v| v.is_finite()).collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let pick = |p: f64| {
        let rank = (p.clamp(0.0, 100.0) / 100.0) * (values.len() as f64 - 1.0);
        let lo = rank.floor() as usize;
        let hi = rank.ceil() as usize;
        if lo == hi {
            values[lo]
        } else {
            values[lo] + (rank - lo as f64) * (values[hi] - values[lo])
        }
    };
    Some((pick(lower_p), pick(upper_p)))
}
