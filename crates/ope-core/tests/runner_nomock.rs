//! No-mock integration tests for full evaluation sessions.
//!
//! These tests run the whole pipeline (CSV on disk, loader, estimator
//! engine, bootstrap, report) and cover:
//! - Report shape and JSON serialization
//! - Seeded bootstrap determinism across sessions
//! - Interval sanity on real resampled data
//! - Cooperative cancellation mid-session

use std::fs;
use std::sync::atomic::AtomicBool;

use tempfile::tempdir;

use ope_core::policy::{PointMassPolicy, UniformPolicy};
use ope_core::schema::{ITEM_FEATURE_DIM, USER_FEATURE_DIM};
use ope_core::{
    BanditFeedback, BehaviorPolicy, BootstrapConfig, Campaign, Error, EstimatorKind,
    EvaluationRunner, FeedbackLoader, RunnerConfig,
};

// ============================================================================
// Fixture Helpers
// ============================================================================

fn write_partition(root: &std::path::Path, campaign: Campaign, n_rows: usize) {
    let n_items = campaign.n_items();
    let pscore = 1.0 / n_items as f64;

    let mut csv = String::from("timestamp,item_id,position,click,propensity_score");
    for i in 0..USER_FEATURE_DIM {
        csv.push_str(&format!(",user_feature_{i}"));
    }
    for i in 0..n_items {
        csv.push_str(&format!(",user_item_affinity_{i}"));
    }
    csv.push('\n');
    for i in 0..n_rows {
        let item = i % n_items;
        let position = 1 + (i % 3);
        let click = u8::from(i % 7 == 0);
        csv.push_str(&format!(
            "{},{item},{position},{click},{pscore}",
            1_570_000_000 + i
        ));
        for _ in 0..USER_FEATURE_DIM {
            csv.push_str(",0.5");
        }
        for _ in 0..n_items {
            csv.push_str(",0.0");
        }
        csv.push('\n');
    }
    let dir = root.join("random");
    fs::create_dir_all(&dir).expect("policy dir");
    fs::write(dir.join(format!("{}.csv", campaign.name())), csv).expect("feedback csv");

    let mut ctx = String::from("item_id");
    for i in 0..ITEM_FEATURE_DIM {
        ctx.push_str(&format!(",item_feature_{i}"));
    }
    ctx.push('\n');
    for id in 0..=campaign.max_item_id() {
        ctx.push_str(&format!("{id},0.1,0.2,0.3,0.4\n"));
    }
    let ctx_dir = root.join("item_context");
    fs::create_dir_all(&ctx_dir).expect("item_context dir");
    fs::write(ctx_dir.join(format!("{}.csv", campaign.name())), ctx).expect("item context csv");
}

fn load_fixture(campaign: Campaign, n_rows: usize) -> BanditFeedback {
    let dir = tempdir().expect("tempdir");
    write_partition(dir.path(), campaign, n_rows);
    FeedbackLoader::new(BehaviorPolicy::Random, campaign)
        .load_csv(dir.path(), None)
        .expect("load partition")
}

fn full_config(seed: u64) -> RunnerConfig {
    RunnerConfig {
        estimators: vec![
            EstimatorKind::DirectMethod,
            EstimatorKind::Ips,
            EstimatorKind::Snips,
            EstimatorKind::ClippedIps {
                clip_threshold: 20.0,
            },
            EstimatorKind::DoublyRobust,
        ],
        bootstrap: Some(BootstrapConfig {
            n_resamples: 300,
            seed: Some(seed),
        }),
    }
}

// ============================================================================
// Full Sessions
// ============================================================================

#[test]
fn full_session_produces_complete_report() {
    ope_core::logging::init_default_logging();
    let fb = load_fixture(Campaign::Men, 340);
    let model = |_ctx: &[f64], _item: u16| 1.0 / 7.0;
    let runner = EvaluationRunner::new(&fb).with_reward_model(&model);
    let policy = UniformPolicy::new(Campaign::Men.n_items());

    let report = runner.run(&policy, &full_config(17), None).expect("run session");

    assert_eq!(report.behavior_policy, BehaviorPolicy::Random);
    assert_eq!(report.campaign, Campaign::Men);
    assert_eq!(report.n_rounds, 340);
    assert_eq!(report.results.len(), 5);
    for name in ["direct_method", "ips", "snips", "clipped_ips", "doubly_robust"] {
        let result = &report.results[name];
        let ci = result.confidence_interval.expect("interval requested");
        assert!(ci.lower <= ci.upper, "{name}: {ci:?}");
        assert_eq!(ci.n_resamples, 300);
        assert!(result.effective_sample_size > 0.0);
        assert!(result.estimate.is_finite());
    }
    assert_eq!(report.results["clipped_ips"].clip_threshold, Some(20.0));
    assert_eq!(report.results["ips"].clip_threshold, None);
}

#[test]
fn on_policy_interval_brackets_click_rate() {
    // On-policy, the IPS estimate is the empirical click rate and every
    // resampled estimate is a resampled mean of the same rewards; the
    // interval must contain the point estimate.
    let fb = load_fixture(Campaign::Men, 700);
    let runner = EvaluationRunner::new(&fb);
    let policy = UniformPolicy::new(Campaign::Men.n_items());
    let config = RunnerConfig {
        estimators: vec![EstimatorKind::Ips],
        bootstrap: Some(BootstrapConfig {
            n_resamples: 1000,
            seed: Some(5),
        }),
    };

    let report = runner.run(&policy, &config, None).expect("run session");
    let result = &report.results["ips"];
    let ci = result.confidence_interval.expect("interval");
    assert!(ci.lower <= result.estimate && result.estimate <= ci.upper);
    assert!(ci.width() > 0.0);
}

#[test]
fn seeded_sessions_reproduce_intervals() {
    let fb = load_fixture(Campaign::Women, 188);
    let runner = EvaluationRunner::new(&fb);
    let policy = PointMassPolicy::new(3);
    let config = RunnerConfig {
        estimators: vec![EstimatorKind::Snips],
        bootstrap: Some(BootstrapConfig {
            n_resamples: 500,
            seed: Some(99),
        }),
    };

    let a = runner.run(&policy, &config, None).expect("first session");
    let b = runner.run(&policy, &config, None).expect("second session");
    assert_eq!(
        a.results["snips"].confidence_interval,
        b.results["snips"].confidence_interval
    );
    assert_eq!(a.results["snips"].estimate, b.results["snips"].estimate);
    // Run ids stay distinct per session.
    assert_ne!(a.run_id, b.run_id);
}

#[test]
fn report_round_trips_through_json() {
    let fb = load_fixture(Campaign::Men, 68);
    let runner = EvaluationRunner::new(&fb);
    let policy = UniformPolicy::new(Campaign::Men.n_items());
    let report = runner
        .run(&policy, &full_config_ips_only(), None)
        .expect("run session");

    let json = serde_json::to_value(&report).expect("serialize report");
    assert_eq!(json["campaign"], "men");
    assert_eq!(json["behavior_policy"], "random");
    assert!(json["results"]["ips"]["weight_summary"]["max"].is_number());

    let back: ope_core::EvaluationReport =
        serde_json::from_value(json).expect("deserialize report");
    assert_eq!(back.run_id, report.run_id);
    assert_eq!(back.n_rounds, 68);
}

fn full_config_ips_only() -> RunnerConfig {
    RunnerConfig {
        estimators: vec![EstimatorKind::Ips],
        bootstrap: Some(BootstrapConfig {
            n_resamples: 100,
            seed: Some(1),
        }),
    }
}

// ============================================================================
// Failure Modes
// ============================================================================

#[test]
fn model_estimators_fail_without_model() {
    let fb = load_fixture(Campaign::Men, 34);
    let runner = EvaluationRunner::new(&fb);
    let policy = UniformPolicy::new(Campaign::Men.n_items());
    let config = RunnerConfig {
        estimators: vec![EstimatorKind::Ips, EstimatorKind::DoublyRobust],
        bootstrap: None,
    };
    let err = runner.run(&policy, &config, None).unwrap_err();
    assert!(matches!(err, Error::MissingRewardModel { .. }));
}

#[test]
fn cancelled_session_aborts() {
    let fb = load_fixture(Campaign::Men, 34);
    let runner = EvaluationRunner::new(&fb);
    let policy = UniformPolicy::new(Campaign::Men.n_items());
    let cancel = AtomicBool::new(true);
    let err = runner
        .run(&policy, &full_config_ips_only(), Some(&cancel))
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
}
