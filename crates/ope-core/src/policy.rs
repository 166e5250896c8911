//! Candidate evaluation policies.
//!
//! An [`EvaluationPolicy`] answers one question: with what probability
//! would the candidate policy have placed `item_id` at `position` for
//! this context? For each fixed (context, position) the probabilities
//! must form a distribution over the campaign's items; the engine
//! validates this on a bounded sample of rows before running any
//! estimator, so a malformed policy fails loudly instead of skewing
//! estimates.

use crate::error::{Error, Result};
use crate::feedback::BanditFeedback;
use crate::schema::Position;

/// Tolerance for the sum-to-one check on sampled (context, position) pairs.
pub const POLICY_SUM_TOLERANCE: f64 = 1e-6;

// Distribution validation is O(rows * positions * items); bound the rows
// so load cost stays independent of n_rounds.
const VALIDATION_ROW_CAP: usize = 32;

/// Probability the candidate policy assigns to a placement.
pub trait EvaluationPolicy {
    /// Probability of selecting `item_id` at `position` given `context`.
    fn probability(&self, context: &[f64], item_id: u16, position: Position) -> f64;
}

/// Uniform distribution over the campaign's items, position-independent.
#[derive(Debug, Clone, Copy)]
pub struct UniformPolicy {
    n_items: usize,
}

impl UniformPolicy {
    /// Uniform policy over `n_items` items.
    pub fn new(n_items: usize) -> Self {
        Self { n_items }
    }
}

impl EvaluationPolicy for UniformPolicy {
    fn probability(&self, _context: &[f64], _item_id: u16, _position: Position) -> f64 {
        1.0 / self.n_items as f64
    }
}

/// Deterministic policy: probability 1 on a single item at every position.
#[derive(Debug, Clone, Copy)]
pub struct PointMassPolicy {
    item_id: u16,
}

impl PointMassPolicy {
    /// Policy that always selects `item_id`.
    pub fn new(item_id: u16) -> Self {
        Self { item_id }
    }
}

impl EvaluationPolicy for PointMassPolicy {
    fn probability(&self, _context: &[f64], item_id: u16, _position: Position) -> f64 {
        if item_id == self.item_id {
            1.0
        } else {
            0.0
        }
    }
}

/// Context-independent tabular policy: one probability row per position.
#[derive(Debug, Clone)]
pub struct TabularPolicy {
    /// `probs[position.index()][item_id]`.
    probs: [Vec<f64>; 3],
}

impl TabularPolicy {
    /// Build from per-position probability rows.
    ///
    /// Each row must have one entry per campaign item and sum to 1 within
    /// [`POLICY_SUM_TOLERANCE`].
    pub fn new(probs: [Vec<f64>; 3]) -> Result<Self> {
        let n_items = probs[0].len();
        for (idx, row) in probs.iter().enumerate() {
            if row.len() != n_items {
                return Err(Error::InvalidConfig {
                    field: format!("probs[{idx}]"),
                    message: format!("has {} entries, expected {n_items}", row.len()),
                });
            }
            if let Some(bad) = row.iter().find(|p| !p.is_finite() || **p < 0.0) {
                return Err(Error::InvalidConfig {
                    field: format!("probs[{idx}]"),
                    message: format!("contains invalid probability {bad}"),
                });
            }
            let sum: f64 = row.iter().sum();
            if (sum - 1.0).abs() > POLICY_SUM_TOLERANCE {
                return Err(Error::InvalidConfig {
                    field: format!("probs[{idx}]"),
                    message: format!("probabilities sum to {sum}, expected 1"),
                });
            }
        }
        Ok(Self { probs })
    }

    /// Same distribution at every position.
    pub fn position_independent(row: Vec<f64>) -> Result<Self> {
        Self::new([row.clone(), row.clone(), row])
    }
}

impl EvaluationPolicy for TabularPolicy {
    fn probability(&self, _context: &[f64], item_id: u16, position: Position) -> f64 {
        self.probs[position.index()]
            .get(item_id as usize)
            .copied()
            .unwrap_or(0.0)
    }
}

/// Check that the policy is a distribution over items for sampled rows.
///
/// Validates up to the first [`VALIDATION_ROW_CAP`] rows' contexts at all
/// three positions. Fails with `InvalidEvaluationPolicy` naming the first
/// offending (row, position) pair.
pub fn validate_policy(policy: &dyn EvaluationPolicy, feedback: &BanditFeedback) -> Result<()> {
    let n_items = feedback.campaign().n_items();
    let rows = feedback.n_rounds().min(VALIDATION_ROW_CAP);
    for row in 0..rows {
        let context = feedback.context(row);
        for position in Position::all() {
            let mut sum = 0.0;
            for item_id in 0..n_items as u16 {
                sum += policy.probability(context, item_id, position);
            }
            if (sum - 1.0).abs() > POLICY_SUM_TOLERANCE {
                return Err(Error::InvalidEvaluationPolicy {
                    row,
                    position: position.slot(),
                    sum,
                });
            }
        }
    }
    Ok(())
}
