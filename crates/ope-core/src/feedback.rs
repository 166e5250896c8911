//! Feedback loading: raw logged records into immutable column storage.
//!
//! [`FeedbackLoader`] is the single validation boundary of the library.
//! Every invariant of the schema is checked eagerly here, so everything
//! downstream (propensity access, estimators, bootstrap) can assume clean
//! data and stay pure. Validation is fail-fast: the first bad row aborts
//! the load with its row (or CSV line) identifier.
//!
//! [`BanditFeedback`] is column-oriented: parallel arrays of equal length
//! where row i across arrays describes the same impression. Context,
//! affinity, and item-feature matrices are flat row-major buffers sized
//! once per campaign. The struct is immutable after construction and safe
//! to share across concurrent estimator calls without locking.
//!
//! # Data Sources
//! - `{behavior_policy}/{campaign}.csv`: logged impressions
//! - `item_context/{campaign}.csv`: per-campaign item features

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

use crate::error::{Error, Result};
use crate::schema::{
    BehaviorPolicy, Campaign, ItemContext, LoggedRecord, Position, ITEM_FEATURE_DIM,
    USER_FEATURE_DIM,
};

// How often the CSV reader polls the cancel flag.
const CANCEL_CHECK_INTERVAL: usize = 1024;

/// Immutable column-oriented logged feedback for one
/// (behavior_policy, campaign) partition.
#[derive(Debug, Clone)]
pub struct BanditFeedback {
    behavior_policy: BehaviorPolicy,
    campaign: Campaign,
    timestamps: Vec<i64>,
    actions: Vec<u16>,
    positions: Vec<Position>,
    rewards: Vec<f64>,
    pscores: Vec<f64>,
    /// Flat row-major, `n_rounds * USER_FEATURE_DIM`.
    contexts: Vec<f64>,
    /// Flat row-major, `n_rounds * campaign.n_items()`.
    affinities: Vec<f64>,
    /// Flat row-major, `campaign.n_items() * ITEM_FEATURE_DIM`.
    item_features: Vec<f64>,
}

impl BanditFeedback {
    /// Number of logged rounds.
    pub fn n_rounds(&self) -> usize {
        self.actions.len()
    }

    /// Whether the partition contains no rounds.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// The behavior policy this partition was logged under.
    pub fn behavior_policy(&self) -> BehaviorPolicy {
        self.behavior_policy
    }

    /// The campaign this partition belongs to.
    pub fn campaign(&self) -> Campaign {
        self.campaign
    }

    /// Impression timestamps, in input row order.
    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    /// Logged actions (item ids).
    pub fn actions(&self) -> &[u16] {
        &self.actions
    }

    /// Display positions.
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// Click outcomes as rewards in {0.0, 1.0}.
    pub fn rewards(&self) -> &[f64] {
        &self.rewards
    }

    /// Recorded behavior-policy propensities.
    pub fn propensity_scores(&self) -> &[f64] {
        &self.pscores
    }

    /// User context vector for row `i`.
    pub fn context(&self, i: usize) -> &[f64] {
        let offset = i * USER_FEATURE_DIM;
        &self.contexts[offset..offset + USER_FEATURE_DIM]
    }

    /// User-item affinity vector for row `i`.
    pub fn affinity(&self, i: usize) -> &[f64] {
        let n_items = self.campaign.n_items();
        let offset = i * n_items;
        &self.affinities[offset..offset + n_items]
    }

    /// Item feature vector for `item_id`.
    pub fn item_features(&self, item_id: u16) -> &[f64] {
        let offset = item_id as usize * ITEM_FEATURE_DIM;
        &self.item_features[offset..offset + ITEM_FEATURE_DIM]
    }
}

/// Loads and validates logged feedback for one (behavior_policy, campaign)
/// partition.
#[derive(Debug, Clone, Copy)]
pub struct FeedbackLoader {
    behavior_policy: BehaviorPolicy,
    campaign: Campaign,
}

impl FeedbackLoader {
    /// Create a loader for one dataset partition.
    pub fn new(behavior_policy: BehaviorPolicy, campaign: Campaign) -> Self {
        Self {
            behavior_policy,
            campaign,
        }
    }

    /// Validate records and item context into column storage.
    ///
    /// Row order is preserved from input. Duplicate (timestamp, item_id)
    /// pairs are accepted as independent impressions; only the schema
    /// invariants are enforced.
    pub fn from_records(
        &self,
        records: &[LoggedRecord],
        item_context: &ItemContext,
    ) -> Result<BanditFeedback> {
        if item_context.campaign() != self.campaign {
            return Err(Error::InvalidConfig {
                field: "item_context".to_string(),
                message: format!(
                    "item context is for campaign {}, loader is for {}",
                    item_context.campaign().name(),
                    self.campaign.name()
                ),
            });
        }

        let n = records.len();
        let n_items = self.campaign.n_items();
        let mut timestamps = Vec::with_capacity(n);
        let mut actions = Vec::with_capacity(n);
        let mut positions = Vec::with_capacity(n);
        let mut rewards = Vec::with_capacity(n);
        let mut pscores = Vec::with_capacity(n);
        let mut contexts = Vec::with_capacity(n * USER_FEATURE_DIM);
        let mut affinities = Vec::with_capacity(n * n_items);

        for (row, record) in records.iter().enumerate() {
            record.validate(self.campaign, row)?;
            // Validated item ids are within range, so the join can only
            // fail if the context itself was built for another campaign.
            if item_context.get(record.item_id).is_none() {
                return Err(Error::IncompleteItemContext {
                    item_id: record.item_id,
                });
            }
            timestamps.push(record.timestamp);
            actions.push(record.item_id);
            positions.push(record.position);
            rewards.push(f64::from(record.click));
            pscores.push(record.propensity_score);
            contexts.extend_from_slice(&record.user_features);
            affinities.extend_from_slice(&record.user_item_affinity);
        }

        info!(
            behavior_policy = self.behavior_policy.name(),
            campaign = self.campaign.name(),
            n_rounds = n,
            "feedback loaded"
        );

        Ok(BanditFeedback {
            behavior_policy: self.behavior_policy,
            campaign: self.campaign,
            timestamps,
            actions,
            positions,
            rewards,
            pscores,
            contexts,
            affinities,
            item_features: item_context.as_flat().to_vec(),
        })
    }

    /// Load the partition from the documented CSV layout under `root`.
    ///
    /// Reads `{root}/{behavior_policy}/{campaign}.csv` and
    /// `{root}/item_context/{campaign}.csv`. This is the only I/O boundary
    /// of the library; `cancel` is polled while reading and validating so
    /// large files can be abandoned cooperatively.
    pub fn load_csv(&self, root: &Path, cancel: Option<&AtomicBool>) -> Result<BanditFeedback> {
        let feedback_path = root
            .join(self.behavior_policy.name())
            .join(format!("{}.csv", self.campaign.name()));
        let context_path = root
            .join("item_context")
            .join(format!("{}.csv", self.campaign.name()));

        let context_text = fs::read_to_string(&context_path)?;
        let item_context = parse_item_context_csv(self.campaign, &context_text)?;

        let feedback_text = fs::read_to_string(&feedback_path)?;
        let records = parse_feedback_csv(self.campaign, &feedback_text, cancel)?;

        self.from_records(&records, &item_context)
    }
}

fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
}

fn parse_field<T: std::str::FromStr>(raw: &str, line: usize, column: &str) -> Result<T> {
    raw.trim().parse::<T>().map_err(|_| Error::Parse {
        line,
        message: format!("invalid {column}: {raw:?}"),
    })
}

/// Parse the logged-impression CSV for one partition.
///
/// Expected columns: `timestamp, item_id, position, click,
/// propensity_score, user_feature_0..4, user_item_affinity_0..K` where
/// K + 1 is the campaign's item count. Line numbers are 1-based and
/// include the header.
pub fn parse_feedback_csv(
    campaign: Campaign,
    text: &str,
    cancel: Option<&AtomicBool>,
) -> Result<Vec<LoggedRecord>> {
    let expected_columns = 5 + USER_FEATURE_DIM + campaign.n_items();
    let mut lines = text.lines().enumerate();

    let (_, header) = lines.next().ok_or(Error::Parse {
        line: 1,
        message: "missing header line".to_string(),
    })?;
    let header_fields: Vec<&str> = header.split(',').map(str::trim).collect();
    if header_fields.len() != expected_columns {
        return Err(Error::Parse {
            line: 1,
            message: format!(
                "header has {} columns, expected {} for campaign {}",
                header_fields.len(),
                expected_columns,
                campaign.name()
            ),
        });
    }
    let prefix = ["timestamp", "item_id", "position", "click", "propensity_score"];
    for (i, name) in prefix.iter().enumerate() {
        if header_fields[i] != *name {
            return Err(Error::Parse {
                line: 1,
                message: format!("column {i} is {:?}, expected {name:?}", header_fields[i]),
            });
        }
    }

    let mut records = Vec::new();
    for (idx, raw_line) in lines {
        let line = idx + 1; // 1-based, idx already counts the header
        if raw_line.trim().is_empty() {
            continue;
        }
        if records.len() % CANCEL_CHECK_INTERVAL == 0 && is_cancelled(cancel) {
            return Err(Error::Cancelled);
        }

        let fields: Vec<&str> = raw_line.split(',').collect();
        if fields.len() != expected_columns {
            return Err(Error::Parse {
                line,
                message: format!(
                    "row has {} columns, expected {}",
                    fields.len(),
                    expected_columns
                ),
            });
        }

        let position_raw: u8 = parse_field(fields[2], line, "position")?;
        let position = Position::new(position_raw).ok_or_else(|| Error::Parse {
            line,
            message: format!("position {position_raw} outside {{1, 2, 3}}"),
        })?;

        let user_features = fields[5..5 + USER_FEATURE_DIM]
            .iter()
            .map(|f| parse_field::<f64>(f, line, "user_feature"))
            .collect::<Result<Vec<f64>>>()?;
        let user_item_affinity = fields[5 + USER_FEATURE_DIM..]
            .iter()
            .map(|f| parse_field::<f64>(f, line, "user_item_affinity"))
            .collect::<Result<Vec<f64>>>()?;

        records.push(LoggedRecord {
            timestamp: parse_field(fields[0], line, "timestamp")?,
            item_id: parse_field(fields[1], line, "item_id")?,
            position,
            click: parse_field(fields[3], line, "click")?,
            propensity_score: parse_field(fields[4], line, "propensity_score")?,
            user_features,
            user_item_affinity,
        });
    }

    Ok(records)
}

/// Parse the per-campaign item-context CSV.
///
/// Expected columns: `item_id, item_feature_0..3`.
pub fn parse_item_context_csv(campaign: Campaign, text: &str) -> Result<ItemContext> {
    let expected_columns = 1 + ITEM_FEATURE_DIM;
    let mut lines = text.lines().enumerate();

    let (_, header) = lines.next().ok_or(Error::Parse {
        line: 1,
        message: "missing header line".to_string(),
    })?;
    let header_fields: Vec<&str> = header.split(',').map(str::trim).collect();
    if header_fields.len() != expected_columns || header_fields[0] != "item_id" {
        return Err(Error::Parse {
            line: 1,
            message: format!(
                "expected header item_id,item_feature_0..{}",
                ITEM_FEATURE_DIM - 1
            ),
        });
    }

    let mut rows = Vec::with_capacity(campaign.n_items());
    for (idx, raw_line) in lines {
        let line = idx + 1;
        if raw_line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = raw_line.split(',').collect();
        if fields.len() != expected_columns {
            return Err(Error::Parse {
                line,
                message: format!(
                    "row has {} columns, expected {}",
                    fields.len(),
                    expected_columns
                ),
            });
        }
        let item_id: u16 = parse_field(fields[0], line, "item_id")?;
        let features = fields[1..]
            .iter()
            .map(|f| parse_field::<f64>(f, line, "item_feature"))
            .collect::<Result<Vec<f64>>>()?;
        rows.push((item_id, features));
    }

    ItemContext::from_rows(campaign, &rows)
}
