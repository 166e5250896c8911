//! Importance-weight diagnostics.
//!
//! Importance-weighted estimators are only as trustworthy as their weight
//! distribution: a few extreme ratios dominate both the point estimate and
//! its variance. The summary here travels with every estimate so callers
//! can see the weight distribution that produced it.

use serde::{Deserialize, Serialize};

use crate::math::summation::{kahan_sum, mean};

/// Distribution summary of a set of importance weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightSummary {
    /// Number of weights summarized.
    pub n: usize,
    /// Smallest weight.
    pub min: f64,
    /// Largest weight.
    pub max: f64,
    /// Arithmetic mean weight.
    pub mean: f64,
}

impl WeightSummary {
    /// Summarize a slice of weights.
    ///
    /// Returns an all-NaN summary (with `n = 0`) for empty input.
    pub fn from_slice(weights: &[f64]) -> Self {
        if weights.is_empty() {
            return Self {
                n: 0,
                min: f64::NAN,
                max: f64::NAN,
                mean: f64::NAN,
            };
        }
        let min = weights.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = weights.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        Self {
            n: weights.len(),
            min,
            max,
            mean: mean(weights),
        }
    }
}

/// Effective sample size of a weight vector: `(Σw)² / Σw²`.
///
/// Equals n when all weights are identical and collapses toward 1 as a
/// single weight dominates. Returns 0.0 when all weights are zero.
pub fn effective_sample_size(weights: &[f64]) -> f64 {
    let sum_w = kahan_sum(weights);
    let squares: Vec<f64> = weights.iter().map(|w| w * w).collect();
    let sum_w2 = kahan_sum(&squares);
    if sum_w2 > 0.0 {
        (sum_w * sum_w) / sum_w2
    } else {
        0.0
    }
}
