//! Importance-weighting estimators: IPS, SNIPS, and Clipped IPS.

use ope_math::WeightSummary;

use crate::error::{Error, Result};
use crate::policy::EvaluationPolicy;

use super::{Estimate, EstimatorEngine};

impl<'a> EstimatorEngine<'a> {
    /// Inverse Propensity Scoring.
    ///
    /// Per row, weight = π_e(a_i | x_i, pos_i) / propensity_i; the
    /// estimate is the mean of weight × reward. Unbiased under the logged
    /// propensities, but numerically unstable when a propensity is small
    /// relative to the evaluation probability; see the raw weight summary
    /// on the returned estimate for how skewed the weights got.
    pub fn ips(&self, policy: &dyn EvaluationPolicy) -> Result<Estimate> {
        let weights = self.importance_weights(policy)?;
        let rewards = self.feedback().rewards();
        let row_values: Vec<f64> = weights.iter().zip(rewards).map(|(w, r)| w * r).collect();
        let raw = WeightSummary::from_slice(&weights);
        Ok(Estimate::from_rows(row_values, weights, false, raw, None))
    }

    /// Self-Normalized IPS: (Σ wᵢrᵢ) / (Σ wᵢ).
    ///
    /// Invariant to uniform rescaling of the weights, removing the scale
    /// bias of weight estimation at the cost of a different bias-variance
    /// tradeoff.
    pub fn snips(&self, policy: &dyn EvaluationPolicy) -> Result<Estimate> {
        let weights = self.importance_weights(policy)?;
        let rewards = self.feedback().rewards();
        let row_values: Vec<f64> = weights.iter().zip(rewards).map(|(w, r)| w * r).collect();
        let raw = WeightSummary::from_slice(&weights);
        Ok(Estimate::from_rows(row_values, weights, true, raw, None))
    }

    /// IPS with weights capped at `clip_threshold`.
    ///
    /// Clipping trades bias for reduced variance; the returned estimate
    /// carries both the threshold and the raw (unclipped) weight
    /// distribution summary so the tradeoff is visible per call.
    pub fn clipped_ips(
        &self,
        policy: &dyn EvaluationPolicy,
        clip_threshold: f64,
    ) -> Result<Estimate> {
        if !clip_threshold.is_finite() || clip_threshold <= 0.0 {
            return Err(Error::InvalidConfig {
                field: "clip_threshold".to_string(),
                message: format!("must be a positive finite number, got {clip_threshold}"),
            });
        }
        let raw_weights = self.importance_weights(policy)?;
        let raw = WeightSummary::from_slice(&raw_weights);
        let weights: Vec<f64> = raw_weights.iter().map(|w| w.min(clip_threshold)).collect();
        let rewards = self.feedback().rewards();
        let row_values: Vec<f64> = weights.iter().zip(rewards).map(|(w, r)| w * r).collect();
        Ok(Estimate::from_rows(
            row_values,
            weights,
            false,
            raw,
            Some(clip_threshold),
        ))
    }
}
