//! No-mock integration tests for the estimator engine.
//!
//! These tests build real feedback partitions through the public loading
//! path (no mocks) and cover:
//! - Cross-estimator agreement on degenerate data
//! - On-policy recovery of the empirical click rate
//! - SNIPS range and scale invariance
//! - Clipping bias direction and weight diagnostics

use ope_core::policy::{PointMassPolicy, TabularPolicy, UniformPolicy};
use ope_core::schema::{ITEM_FEATURE_DIM, USER_FEATURE_DIM};
use ope_core::{
    BehaviorPolicy, Campaign, EstimatorEngine, EstimatorKind, FeedbackLoader, ItemContext,
    LoggedRecord, Position,
};

// ============================================================================
// Fixture Helpers
// ============================================================================

/// Build a feedback partition from (item_id, position, click, pscore)
/// tuples on `campaign`, with complete item context.
fn build_feedback(
    campaign: Campaign,
    rows: &[(u16, u8, u8, f64)],
) -> ope_core::BanditFeedback {
    let context_rows: Vec<(u16, Vec<f64>)> = (0..=campaign.max_item_id())
        .map(|id| (id, vec![f64::from(id); ITEM_FEATURE_DIM]))
        .collect();
    let ctx = ItemContext::from_rows(campaign, &context_rows).expect("item context");
    let records: Vec<LoggedRecord> = rows
        .iter()
        .enumerate()
        .map(|(i, &(item_id, position, click, pscore))| LoggedRecord {
            timestamp: 1_570_000_000 + i as i64,
            item_id,
            position: Position::new(position).expect("valid position"),
            click,
            propensity_score: pscore,
            user_features: vec![0.5; USER_FEATURE_DIM],
            user_item_affinity: vec![0.0; campaign.n_items()],
        })
        .collect();
    FeedbackLoader::new(BehaviorPolicy::Random, campaign)
        .from_records(&records, &ctx)
        .expect("load records")
}

/// Uniform logged rows with a deterministic click pattern.
fn uniform_rows(campaign: Campaign, n: usize, click_every: usize) -> Vec<(u16, u8, u8, f64)> {
    let n_items = campaign.n_items();
    let pscore = 1.0 / n_items as f64;
    (0..n)
        .map(|i| {
            (
                (i % n_items) as u16,
                1 + (i % 3) as u8,
                u8::from(i % click_every == 0),
                pscore,
            )
        })
        .collect()
}

// ============================================================================
// Cross-Estimator Agreement
// ============================================================================

#[test]
fn all_estimators_agree_on_degenerate_data() {
    // Every impression clicked, behavior uniform, candidate identical to
    // behavior: each estimator must report exactly 1.0.
    let campaign = Campaign::Men;
    let rows: Vec<(u16, u8, u8, f64)> = uniform_rows(campaign, 102, 1);
    let fb = build_feedback(campaign, &rows);
    let model = |_ctx: &[f64], _item: u16| 1.0;
    let engine = EstimatorEngine::new(&fb).with_reward_model(&model);
    let policy = UniformPolicy::new(campaign.n_items());

    for kind in [
        EstimatorKind::DirectMethod,
        EstimatorKind::Ips,
        EstimatorKind::Snips,
        EstimatorKind::ClippedIps {
            clip_threshold: 10.0,
        },
        EstimatorKind::DoublyRobust,
    ] {
        let est = engine.run(kind, &policy).expect("estimator run");
        assert!(
            (est.value - 1.0).abs() < 1e-9,
            "{} reported {}",
            kind.name(),
            est.value
        );
    }
}

#[test]
fn on_policy_evaluation_recovers_click_rate() {
    let campaign = Campaign::Women;
    let rows = uniform_rows(campaign, 470, 10);
    let fb = build_feedback(campaign, &rows);
    let engine = EstimatorEngine::new(&fb);
    let policy = UniformPolicy::new(campaign.n_items());

    let empirical = fb.rewards().iter().sum::<f64>() / fb.n_rounds() as f64;
    let ips = engine.run(EstimatorKind::Ips, &policy).expect("ips");
    let snips = engine.run(EstimatorKind::Snips, &policy).expect("snips");
    assert!((ips.value - empirical).abs() < 1e-12);
    assert!((snips.value - empirical).abs() < 1e-12);
    // On-policy weights are all 1, so no effective-sample-size loss.
    assert!((ips.effective_sample_size - 470.0).abs() < 1e-6);
}

// ============================================================================
// SNIPS Properties
// ============================================================================

#[test]
fn snips_stays_within_reward_range() {
    // The self-normalized estimate is a convex combination of rewards, so
    // it lies in [0, 1] even with wildly uneven propensities.
    let campaign = Campaign::Men;
    let fb = build_feedback(
        campaign,
        &[
            (0, 1, 1, 0.001),
            (1, 1, 0, 0.9),
            (0, 2, 0, 0.002),
            (2, 3, 1, 0.8),
        ],
    );
    let engine = EstimatorEngine::new(&fb);
    for item in [0u16, 1, 2] {
        let est = engine
            .run(EstimatorKind::Snips, &PointMassPolicy::new(item))
            .expect("snips");
        assert!((0.0..=1.0).contains(&est.value), "got {}", est.value);
    }
}

// ============================================================================
// Clipping
// ============================================================================

#[test]
fn clipping_never_raises_the_estimate() {
    // Weights are capped and rewards are non-negative, so the clipped
    // estimate cannot exceed plain IPS on the same data.
    let campaign = Campaign::Men;
    let fb = build_feedback(
        campaign,
        &[(0, 1, 1, 0.01), (1, 1, 1, 0.5), (0, 2, 1, 0.04)],
    );
    let engine = EstimatorEngine::new(&fb);
    let policy = PointMassPolicy::new(0);

    let ips = engine.run(EstimatorKind::Ips, &policy).expect("ips");
    let mut last = ips.value;
    for clip in [50.0, 20.0, 5.0, 1.0] {
        let clipped = engine
            .run(EstimatorKind::ClippedIps { clip_threshold: clip }, &policy)
            .expect("clipped ips");
        assert!(clipped.value <= last + 1e-12);
        assert_eq!(clipped.raw_weight_summary.max, 100.0);
        last = clipped.value;
    }
}

// ============================================================================
// Position-Aware Policies
// ============================================================================

#[test]
fn tabular_policy_distinguishes_slots() {
    let campaign = Campaign::Men;
    let n = campaign.n_items();
    // Candidate plays item 0 in slot 1 and item 1 in slots 2 and 3.
    let mut slot1 = vec![0.0; n];
    slot1[0] = 1.0;
    let mut rest = vec![0.0; n];
    rest[1] = 1.0;
    let policy = TabularPolicy::new([slot1, rest.clone(), rest]).expect("tabular policy");

    let fb = build_feedback(
        campaign,
        &[(0, 1, 1, 0.5), (0, 2, 1, 0.5), (1, 2, 1, 0.25), (1, 3, 0, 0.25)],
    );
    let engine = EstimatorEngine::new(&fb);
    let est = engine.run(EstimatorKind::Ips, &policy).expect("ips");
    // Row weights: 2 (match slot 1), 0 (item 0 not played in slot 2),
    // 4 (match), 4 (match, but no click).
    assert_eq!(est.weights, vec![2.0, 0.0, 4.0, 4.0]);
    assert!((est.value - 1.5).abs() < 1e-12);
}
