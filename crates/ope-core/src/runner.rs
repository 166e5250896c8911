//! Evaluation session orchestration.
//!
//! [`EvaluationRunner`] drives one session: run a set of estimator
//! configurations over a loaded partition and produce an
//! [`EvaluationReport`] mapping estimator names to point estimates and
//! optional bootstrap confidence intervals. Uncertainty is quantified
//! nonparametrically: rows are resampled with replacement, the estimate
//! is recomputed per resample from stored per-row pieces, and the
//! empirical 2.5/97.5 percentiles bound the interval. No reward
//! distribution family is assumed.
//!
//! Bootstrap iterations are independent; the cancel flag is polled
//! between resamples so very large resample counts can be abandoned
//! cooperatively.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use ope_math::{percentile_pair, WeightSummary};

use crate::error::{Error, Result};
use crate::estimators::{Estimate, EstimatorEngine, EstimatorKind, RewardModel};
use crate::feedback::BanditFeedback;
use crate::policy::EvaluationPolicy;
use crate::schema::{BehaviorPolicy, Campaign};

/// Bootstrap resampling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Number of resamples drawn with replacement.
    pub n_resamples: usize,
    /// RNG seed; None seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            n_resamples: 1000,
            seed: None,
        }
    }
}

impl BootstrapConfig {
    fn validate(&self) -> Result<()> {
        if self.n_resamples == 0 {
            return Err(Error::InvalidConfig {
                field: "n_resamples".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// One evaluation session's configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Estimators to run, in report order.
    pub estimators: Vec<EstimatorKind>,
    /// Bootstrap settings; None skips interval computation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrap: Option<BootstrapConfig>,
}

/// Empirical bootstrap confidence interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    /// Empirical 2.5th percentile of the resampled estimates.
    pub lower: f64,
    /// Empirical 97.5th percentile of the resampled estimates.
    pub upper: f64,
    /// Resamples used.
    pub n_resamples: usize,
}

impl ConfidenceInterval {
    /// Interval width.
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

/// Per-estimator entry of an evaluation report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorResult {
    /// Point estimate of mean reward under the evaluation policy.
    pub estimate: f64,
    /// Bootstrap interval, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_interval: Option<ConfidenceInterval>,
    /// Raw (unclipped) importance-weight distribution.
    pub weight_summary: WeightSummary,
    /// Clip threshold applied, when any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clip_threshold: Option<f64>,
    /// Effective sample size of the weights used.
    pub effective_sample_size: f64,
}

/// Outcome of one evaluation session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Correlation id for this run.
    pub run_id: Uuid,
    /// When the report was produced.
    pub created_at: DateTime<Utc>,
    /// Behavior policy of the evaluated partition.
    pub behavior_policy: BehaviorPolicy,
    /// Campaign of the evaluated partition.
    pub campaign: Campaign,
    /// Logged rounds consumed.
    pub n_rounds: usize,
    /// Results keyed by estimator name.
    pub results: BTreeMap<String, EstimatorResult>,
}

/// Orchestrates one evaluation session over a loaded partition.
pub struct EvaluationRunner<'a> {
    feedback: &'a BanditFeedback,
    reward_model: Option<&'a dyn RewardModel>,
}

impl<'a> EvaluationRunner<'a> {
    /// Runner without a reward model (IPS-family estimators only).
    pub fn new(feedback: &'a BanditFeedback) -> Self {
        Self {
            feedback,
            reward_model: None,
        }
    }

    /// Attach a reward model, enabling DM and DR configurations.
    pub fn with_reward_model(mut self, model: &'a dyn RewardModel) -> Self {
        self.reward_model = Some(model);
        self
    }

    /// Run every configured estimator and assemble the report.
    ///
    /// Estimator errors are surfaced immediately; a report is only
    /// produced when every configured estimator succeeds.
    pub fn run(
        &self,
        policy: &dyn EvaluationPolicy,
        config: &RunnerConfig,
        cancel: Option<&AtomicBool>,
    ) -> Result<EvaluationReport> {
        if let Some(bootstrap) = &config.bootstrap {
            bootstrap.validate()?;
        }

        let run_id = Uuid::new_v4();
        info!(
            %run_id,
            behavior_policy = self.feedback.behavior_policy().name(),
            campaign = self.feedback.campaign().name(),
            n_rounds = self.feedback.n_rounds(),
            n_estimators = config.estimators.len(),
            "evaluation run started"
        );

        let mut engine = EstimatorEngine::new(self.feedback);
        if let Some(model) = self.reward_model {
            engine = engine.with_reward_model(model);
        }

        let mut results = BTreeMap::new();
        for kind in &config.estimators {
            let estimate = engine.run(*kind, policy)?;
            let confidence_interval = match &config.bootstrap {
                Some(bootstrap) => Some(bootstrap_interval(&estimate, bootstrap, cancel)?),
                None => None,
            };
            debug!(
                estimator = kind.name(),
                value = estimate.value,
                ess = estimate.effective_sample_size,
                "estimator finished"
            );
            results.insert(
                kind.name().to_string(),
                EstimatorResult {
                    estimate: estimate.value,
                    confidence_interval,
                    weight_summary: estimate.raw_weight_summary,
                    clip_threshold: estimate.clip_threshold,
                    effective_sample_size: estimate.effective_sample_size,
                },
            );
        }

        Ok(EvaluationReport {
            run_id,
            created_at: Utc::now(),
            behavior_policy: self.feedback.behavior_policy(),
            campaign: self.feedback.campaign(),
            n_rounds: self.feedback.n_rounds(),
            results,
        })
    }
}

/// Nonparametric bootstrap interval over row resamples.
///
/// Each resample draws `n_rounds` row indices with replacement and
/// re-aggregates the estimate from its stored per-row pieces.
pub fn bootstrap_interval(
    estimate: &Estimate,
    config: &BootstrapConfig,
    cancel: Option<&AtomicBool>,
) -> Result<ConfidenceInterval> {
    config.validate()?;
    let n = estimate.n_rounds;
    if n == 0 {
        return Err(Error::EmptyFeedback);
    }

    let seed = config.seed.unwrap_or_else(rand::random);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut resampled = Vec::with_capacity(config.n_resamples);
    let mut indices = vec![0usize; n];

    for _ in 0..config.n_resamples {
        if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            return Err(Error::Cancelled);
        }
        for slot in indices.iter_mut() {
            *slot = rng.random_range(0..n);
        }
        resampled.push(estimate.value_over(&indices));
    }

    let (lower, upper) =
        percentile_pair(&resampled, 2.5, 97.5).ok_or_else(|| Error::NonFiniteEstimate {
            estimator: "bootstrap".to_string(),
        })?;
    Ok(ConfidenceInterval {
        lower,
        upper,
        n_resamples: config.n_resamples,
    })
}
