//! Recorded-propensity access for importance weighting.
//!
//! The behavior policy is represented strictly as the recorded
//! `propensity_score` column. The true logging policy (Thompson sampling
//! internals, randomization schedule) is not available, so nothing here
//! re-derives or simulates it; the logged score is ground truth. The
//! positivity invariant is re-asserted on every access: it is unreachable
//! after loader validation, but a zero denominator would silently corrupt
//! every downstream estimate, so the accessor stays defensive.

use crate::error::{Error, Result};
use crate::feedback::BanditFeedback;

/// Read-only view of the behavior policy's recorded propensities.
#[derive(Debug, Clone, Copy)]
pub struct PropensityModel<'a> {
    pscores: &'a [f64],
}

impl<'a> PropensityModel<'a> {
    /// Wrap the propensity column of a loaded partition.
    pub fn new(feedback: &'a BanditFeedback) -> Self {
        Self {
            pscores: feedback.propensity_scores(),
        }
    }

    /// Number of logged rounds covered.
    pub fn n_rounds(&self) -> usize {
        self.pscores.len()
    }

    /// The behavior policy's probability of the logged placement at `row`.
    pub fn probability(&self, row: usize) -> Result<f64> {
        let score = self.pscores[row];
        if score <= 0.0 {
            return Err(Error::ZeroPropensity { row, score });
        }
        Ok(score)
    }
}
