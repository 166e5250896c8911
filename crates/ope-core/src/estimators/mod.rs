//! Off-policy value estimators.
//!
//! Every estimator consumes an immutable [`BanditFeedback`] partition and
//! a candidate [`EvaluationPolicy`] and produces an [`Estimate`]: the
//! estimated mean reward the candidate would have earned, together with
//! the per-row importance weights used, so callers can compute variance
//! and resample without re-querying the policy.
//!
//! # Estimators
//!
//! 1. **DM (Direct Method)**: averages a supplied reward model's
//!    predictions under the candidate's action distribution. Biased when
//!    the model is misspecified, but low variance.
//! 2. **IPS (Inverse Propensity Scoring)**: unbiased reweighting of
//!    logged rewards by candidate/behavior probability ratios.
//! 3. **SNIPS**: IPS normalized by the weight sum; trades a small bias
//!    for weight-scale robustness.
//! 4. **Clipped IPS**: IPS with weights capped at a threshold; trades
//!    bias for reduced variance.
//! 5. **DR (Doubly Robust)**: DM plus an IPS-style correction on model
//!    residuals; consistent if *either* component is well-specified.

mod dm;
mod dr;
mod ips;

use serde::{Deserialize, Serialize};

use ope_math::{effective_sample_size, kahan_sum, mean, WeightSummary};

use crate::error::{Error, Result};
use crate::feedback::BanditFeedback;
use crate::policy::{validate_policy, EvaluationPolicy};
use crate::propensity::PropensityModel;

// ── Reward model seam ───────────────────────────────────────────────────

/// Predicted expected reward for an action in a context.
///
/// External collaborator: the engine never fits one, it only consumes
/// predictions for DM and DR.
pub trait RewardModel {
    /// Expected reward of showing `item_id` to `context`.
    fn predict(&self, context: &[f64], item_id: u16) -> f64;
}

impl<F> RewardModel for F
where
    F: Fn(&[f64], u16) -> f64,
{
    fn predict(&self, context: &[f64], item_id: u16) -> f64 {
        self(context, item_id)
    }
}

// ── Estimator selection ─────────────────────────────────────────────────

/// Which estimator to run, with per-estimator parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EstimatorKind {
    /// Direct Method; requires a reward model.
    DirectMethod,
    /// Inverse Propensity Scoring.
    Ips,
    /// Self-normalized IPS.
    Snips,
    /// IPS with weights capped at `clip_threshold`.
    ClippedIps { clip_threshold: f64 },
    /// Doubly Robust; requires a reward model.
    DoublyRobust,
}

impl EstimatorKind {
    /// Stable name used as the report key.
    pub fn name(&self) -> &'static str {
        match self {
            EstimatorKind::DirectMethod => "direct_method",
            EstimatorKind::Ips => "ips",
            EstimatorKind::Snips => "snips",
            EstimatorKind::ClippedIps { .. } => "clipped_ips",
            EstimatorKind::DoublyRobust => "doubly_robust",
        }
    }
}

// ── Estimate ────────────────────────────────────────────────────────────

/// Result of one estimator invocation.
#[derive(Debug, Clone)]
pub struct Estimate {
    /// Estimated mean reward under the evaluation policy.
    pub value: f64,
    /// Number of logged rounds consumed.
    pub n_rounds: usize,
    /// Per-row importance weights actually used (after clipping; all 1.0
    /// for DM).
    pub weights: Vec<f64>,
    /// Per-row numerator contributions; see [`Estimate::value_over`].
    pub row_values: Vec<f64>,
    /// Whether the estimate is a ratio of sums (SNIPS) rather than a mean.
    pub self_normalized: bool,
    /// Distribution of the *raw* (unclipped) weights, for diagnosability.
    pub raw_weight_summary: WeightSummary,
    /// Clip threshold applied, when any.
    pub clip_threshold: Option<f64>,
    /// Effective sample size of the weights used.
    pub effective_sample_size: f64,
}

impl Estimate {
    fn from_rows(
        row_values: Vec<f64>,
        weights: Vec<f64>,
        self_normalized: bool,
        raw_weight_summary: WeightSummary,
        clip_threshold: Option<f64>,
    ) -> Self {
        let n_rounds = row_values.len();
        let value = if self_normalized {
            let denom = kahan_sum(&weights);
            if denom > 0.0 {
                kahan_sum(&row_values) / denom
            } else {
                0.0
            }
        } else {
            mean(&row_values)
        };
        let ess = effective_sample_size(&weights);
        Estimate {
            value,
            n_rounds,
            weights,
            row_values,
            self_normalized,
            raw_weight_summary,
            clip_threshold,
            effective_sample_size: ess,
        }
    }

    /// Re-aggregate the estimate over a multiset of row indices.
    ///
    /// This is the bootstrap primitive: resampled estimates are computed
    /// from the stored per-row pieces without touching the policy again.
    pub fn value_over(&self, indices: &[usize]) -> f64 {
        if indices.is_empty() {
            return f64::NAN;
        }
        if self.self_normalized {
            let num: Vec<f64> = indices.iter().map(|&i| self.row_values[i]).collect();
            let den: Vec<f64> = indices.iter().map(|&i| self.weights[i]).collect();
            let denom = kahan_sum(&den);
            if denom > 0.0 {
                kahan_sum(&num) / denom
            } else {
                0.0
            }
        } else {
            let values: Vec<f64> = indices.iter().map(|&i| self.row_values[i]).collect();
            mean(&values)
        }
    }
}

// ── Engine ──────────────────────────────────────────────────────────────

/// Runs estimators over one loaded feedback partition.
///
/// Pure and side-effect free; a single engine can serve any number of
/// concurrent callers over the same shared feedback.
pub struct EstimatorEngine<'a> {
    feedback: &'a BanditFeedback,
    propensity: PropensityModel<'a>,
    reward_model: Option<&'a dyn RewardModel>,
}

impl<'a> EstimatorEngine<'a> {
    /// Engine without a reward model (IPS-family estimators only).
    pub fn new(feedback: &'a BanditFeedback) -> Self {
        Self {
            feedback,
            propensity: PropensityModel::new(feedback),
            reward_model: None,
        }
    }

    /// Attach a reward model, enabling DM and DR.
    pub fn with_reward_model(mut self, model: &'a dyn RewardModel) -> Self {
        self.reward_model = Some(model);
        self
    }

    /// The feedback partition this engine evaluates over.
    pub fn feedback(&self) -> &'a BanditFeedback {
        self.feedback
    }

    /// Run one estimator against a candidate policy.
    pub fn run(&self, kind: EstimatorKind, policy: &dyn EvaluationPolicy) -> Result<Estimate> {
        self.preflight(policy)?;
        match kind {
            EstimatorKind::DirectMethod => self.direct_method(policy),
            EstimatorKind::Ips => self.ips(policy),
            EstimatorKind::Snips => self.snips(policy),
            EstimatorKind::ClippedIps { clip_threshold } => {
                self.clipped_ips(policy, clip_threshold)
            }
            EstimatorKind::DoublyRobust => self.doubly_robust(policy),
        }
    }

    fn preflight(&self, policy: &dyn EvaluationPolicy) -> Result<()> {
        if self.feedback.is_empty() {
            return Err(Error::EmptyFeedback);
        }
        validate_policy(policy, self.feedback)
    }

    fn require_reward_model(&self, estimator: &'static str) -> Result<&'a dyn RewardModel> {
        self.reward_model
            .ok_or(Error::MissingRewardModel { estimator })
    }

    /// Raw importance weights: π_e(a_i | x_i, pos_i) / recorded propensity.
    fn importance_weights(&self, policy: &dyn EvaluationPolicy) -> Result<Vec<f64>> {
        let n = self.feedback.n_rounds();
        let actions = self.feedback.actions();
        let positions = self.feedback.positions();
        let mut weights = Vec::with_capacity(n);
        for i in 0..n {
            let pscore = self.propensity.probability(i)?;
            let pi_e = policy.probability(self.feedback.context(i), actions[i], positions[i]);
            weights.push(pi_e / pscore);
        }
        Ok(weights)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::synthetic_feedback;
    use super::*;
    use crate::policy::UniformPolicy;
    use crate::schema::Campaign;

    #[test]
    fn empty_feedback_rejected() {
        let fb = synthetic_feedback(&[]);
        let engine = EstimatorEngine::new(&fb);
        let policy = UniformPolicy::new(Campaign::Men.n_items());
        let err = engine.run(EstimatorKind::Ips, &policy).unwrap_err();
        assert!(matches!(err, Error::EmptyFeedback));
    }

    #[test]
    fn invalid_policy_rejected_before_estimation() {
        let fb = synthetic_feedback(&[(0, 1, 1, 0.5)]);
        let engine = EstimatorEngine::new(&fb);
        // Sums to 34/50 over the men campaign.
        let policy = UniformPolicy::new(50);
        let err = engine.run(EstimatorKind::Ips, &policy).unwrap_err();
        assert!(matches!(err, Error::InvalidEvaluationPolicy { .. }));
    }

    #[test]
    fn kind_names_are_stable() {
        assert_eq!(EstimatorKind::DirectMethod.name(), "direct_method");
        assert_eq!(
            EstimatorKind::ClippedIps {
                clip_threshold: 5.0
            }
            .name(),
            "clipped_ips"
        );
    }

    #[test]
    fn kind_serde_roundtrip() {
        let kind = EstimatorKind::ClippedIps {
            clip_threshold: 10.0,
        };
        let json = serde_json::to_string(&kind).unwrap();
        let back: EstimatorKind = serde_json::from_str(&json).unwrap();
        assert_eq!(kind, back);
    }

    #[test]
    fn value_over_full_index_set_matches_value() {
        let fb = synthetic_feedback(&[(0, 1, 1, 0.5), (1, 1, 0, 0.5), (2, 2, 1, 0.25)]);
        let engine = EstimatorEngine::new(&fb);
        let policy = UniformPolicy::new(Campaign::Men.n_items());
        for kind in [EstimatorKind::Ips, EstimatorKind::Snips] {
            let est = engine.run(kind, &policy).unwrap();
            let all: Vec<usize> = (0..est.n_rounds).collect();
            assert!((est.value_over(&all) - est.value).abs() < 1e-12);
        }
    }
}
