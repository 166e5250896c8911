//! Doubly Robust estimator.

use ope_math::WeightSummary;

use crate::error::Result;
use crate::policy::EvaluationPolicy;

use super::{Estimate, EstimatorEngine};

impl<'a> EstimatorEngine<'a> {
    /// Doubly Robust: DM baseline plus importance-weighted residual.
    ///
    /// Per row:
    /// ```text
    /// v_i = q̂_π(x_i) + w_i · (r_i − q̂(x_i, a_i))
    /// ```
    /// where `q̂_π` is the DM term under the evaluation policy and `w_i`
    /// the raw importance weight. Consistent when *either* the reward
    /// model or the recorded propensities are well-specified: a perfect
    /// model zeroes the correction (DR = DM), a zero model zeroes the
    /// baseline (DR = IPS). Requires both a reward model and valid
    /// propensities.
    pub fn doubly_robust(&self, policy: &dyn EvaluationPolicy) -> Result<Estimate> {
        let model = self.require_reward_model("doubly robust")?;
        let weights = self.importance_weights(policy)?;
        let dm_terms = self.model_values(policy, model);

        let feedback = self.feedback();
        let rewards = feedback.rewards();
        let actions = feedback.actions();
        let row_values: Vec<f64> = (0..feedback.n_rounds())
            .map(|i| {
                let baseline = model.predict(feedback.context(i), actions[i]);
                dm_terms[i] + weights[i] * (rewards[i] - baseline)
            })
            .collect();

        let raw = WeightSummary::from_slice(&weights);
        Ok(Estimate::from_rows(row_values, weights, false, raw, None))
    }
}
