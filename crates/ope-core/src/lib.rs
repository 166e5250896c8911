//! Open Bandit Replay core library.
//!
//! This library provides the core functionality for replaying logged
//! bandit feedback against candidate policies:
//! - Schema taxonomies and record validation for the logged dataset
//! - Feedback loading into immutable column-oriented storage
//! - Recorded-propensity access for importance weighting
//! - Off-policy value estimators (DM, IPS, SNIPS, Clipped IPS, DR)
//! - An evaluation runner with bootstrap confidence intervals
//!
//! There is no CLI surface here; callers drive evaluation sessions through
//! [`runner::EvaluationRunner`].

pub mod error;
pub mod estimators;
pub mod feedback;
pub mod logging;
pub mod policy;
pub mod propensity;
pub mod runner;
pub mod schema;

pub use error::{Error, Result};
pub use estimators::{Estimate, EstimatorEngine, EstimatorKind, RewardModel};
pub use feedback::{BanditFeedback, FeedbackLoader};
pub use policy::EvaluationPolicy;
pub use propensity::PropensityModel;
pub use runner::{BootstrapConfig, EvaluationReport, EvaluationRunner, RunnerConfig};
pub use schema::{BehaviorPolicy, Campaign, ItemContext, LoggedRecord, Position};
