//! Direct Method estimator.

use ope_math::WeightSummary;

use crate::error::Result;
use crate::policy::EvaluationPolicy;

use super::{Estimate, EstimatorEngine, RewardModel};

impl<'a> EstimatorEngine<'a> {
    /// Direct Method: model-based value estimate.
    ///
    /// For each logged round, averages the reward model's predictions
    /// over the full campaign item range, weighted by the evaluation
    /// policy's probabilities at the round's logged position; the
    /// estimate is the mean over rounds. No importance weighting is
    /// involved, so variance is low but any model bias passes straight
    /// through. Fails with `MissingRewardModel` when no model is
    /// attached.
    pub fn direct_method(&self, policy: &dyn EvaluationPolicy) -> Result<Estimate> {
        let model = self.require_reward_model("direct method")?;
        let row_values = self.model_values(policy, model);
        let n = row_values.len();
        let weights = vec![1.0; n];
        let raw = WeightSummary::from_slice(&weights);
        Ok(Estimate::from_rows(row_values, weights, false, raw, None))
    }

    /// Per-row DM term: Σ_a π_e(a | x_i, pos_i) · q̂(x_i, a).
    pub(super) fn model_values(
        &self,
        policy: &dyn EvaluationPolicy,
        model: &dyn RewardModel,
    ) -> Vec<f64> {
        let feedback = self.feedback();
        let n_items = feedback.campaign().n_items();
        let positions = feedback.positions();
        (0..feedback.n_rounds())
            .map(|i| {
                let context = feedback.context(i);
                let mut value = 0.0;
                for item_id in 0..n_items as u16 {
                    let pi_e = policy.probability(context, item_id, positions[i]);
                    if pi_e > 0.0 {
                        value += pi_e * model.predict(context, item_id);
                    }
                }
                value
            })
            .collect()
    }
}
