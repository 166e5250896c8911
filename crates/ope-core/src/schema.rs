//! Dataset schema: behavior-policy and campaign taxonomies, logged
//! records, and item context.
//!
//! The dataset is partitioned by (behavior_policy, campaign). Each
//! campaign has a hard item-id range that is an external contract of the
//! files; the loader enforces it and rejects anything outside. Feature
//! vectors are anonymized upstream and treated here as opaque fixed-length
//! numeric payloads, never interpreted semantically.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Schema version for the logged-feedback layout.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Dimension of the anonymized user feature vector (`user_feature_0..4`).
pub const USER_FEATURE_DIM: usize = 5;

/// Dimension of the item feature vector (`item_feature_0..3`).
pub const ITEM_FEATURE_DIM: usize = 4;

/// Behavior policies the logs were collected under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorPolicy {
    /// Bernoulli Thompson sampling arm of the A/B test.
    Bts,
    /// Uniform-random arm of the A/B test.
    Random,
}

impl BehaviorPolicy {
    /// All policy variants in order.
    pub fn all() -> &'static [BehaviorPolicy] {
        &[BehaviorPolicy::Bts, BehaviorPolicy::Random]
    }

    /// Directory name in the dataset layout.
    pub fn name(&self) -> &'static str {
        match self {
            BehaviorPolicy::Bts => "bts",
            BehaviorPolicy::Random => "random",
        }
    }
}

/// Campaigns the recommendation surface was split into.
///
/// Each campaign carries its own item-id range, which the loader enforces
/// as a hard contract of the source files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Campaign {
    /// Full catalog, item ids in [0, 80].
    All,
    /// Men's campaign, item ids in [0, 33].
    Men,
    /// Women's campaign, item ids in [0, 46].
    Women,
}

impl Campaign {
    /// All campaign variants in order.
    pub fn all() -> &'static [Campaign] {
        &[Campaign::All, Campaign::Men, Campaign::Women]
    }

    /// File name in the dataset layout.
    pub fn name(&self) -> &'static str {
        match self {
            Campaign::All => "all",
            Campaign::Men => "men",
            Campaign::Women => "women",
        }
    }

    /// Largest valid item id for this campaign.
    pub fn max_item_id(&self) -> u16 {
        match self {
            Campaign::All => 80,
            Campaign::Men => 33,
            Campaign::Women => 46,
        }
    }

    /// Number of items in this campaign's range.
    pub fn n_items(&self) -> usize {
        self.max_item_id() as usize + 1
    }

    /// Whether `item_id` lies within this campaign's documented range.
    pub fn contains(&self, item_id: u16) -> bool {
        item_id <= self.max_item_id()
    }
}

/// Display slot an item was shown in. Valid values are 1, 2, and 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Position(u8);

impl Position {
    /// Construct a position, rejecting anything outside {1, 2, 3}.
    pub fn new(slot: u8) -> Option<Position> {
        if (1..=3).contains(&slot) {
            Some(Position(slot))
        } else {
            None
        }
    }

    /// All valid positions in slot order.
    pub fn all() -> [Position; 3] {
        [Position(1), Position(2), Position(3)]
    }

    /// The raw slot number (1-based).
    pub fn slot(&self) -> u8 {
        self.0
    }

    /// Zero-based index for array addressing.
    pub fn index(&self) -> usize {
        (self.0 - 1) as usize
    }
}

impl TryFrom<u8> for Position {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        Position::new(value).ok_or_else(|| format!("position {value} outside {{1, 2, 3}}"))
    }
}

impl From<Position> for u8 {
    fn from(p: Position) -> u8 {
        p.0
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One logged impression from a (behavior_policy, campaign) stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggedRecord {
    /// Impression time; monotone per stream, duplicates allowed.
    pub timestamp: i64,
    /// Item the behavior policy placed at `position`.
    pub item_id: u16,
    /// Display slot the item occupied.
    pub position: Position,
    /// Binary click outcome.
    pub click: u8,
    /// Behavior policy's recorded probability of this placement, in (0, 1].
    pub propensity_score: f64,
    /// Anonymized user context, length [`USER_FEATURE_DIM`].
    pub user_features: Vec<f64>,
    /// Historical user-item affinity counts, one slot per campaign item.
    pub user_item_affinity: Vec<f64>,
}

impl LoggedRecord {
    /// Validate this record against the campaign's schema contract.
    ///
    /// `row` is the zero-based row index, reported on failure.
    pub fn validate(&self, campaign: Campaign, row: usize) -> Result<()> {
        if !campaign.contains(self.item_id) {
            return Err(Error::SchemaViolation {
                row,
                message: format!(
                    "item_id {} outside campaign range [0, {}]",
                    self.item_id,
                    campaign.max_item_id()
                ),
            });
        }
        if self.click > 1 {
            return Err(Error::SchemaViolation {
                row,
                message: format!("click must be binary, got {}", self.click),
            });
        }
        if !self.propensity_score.is_finite()
            || self.propensity_score <= 0.0
            || self.propensity_score > 1.0
        {
            return Err(Error::SchemaViolation {
                row,
                message: format!(
                    "propensity_score must be in (0, 1], got {}",
                    self.propensity_score
                ),
            });
        }
        if self.user_features.len() != USER_FEATURE_DIM {
            return Err(Error::SchemaViolation {
                row,
                message: format!(
                    "user_features has {} dimensions, expected {}",
                    self.user_features.len(),
                    USER_FEATURE_DIM
                ),
            });
        }
        if self.user_item_affinity.len() != campaign.n_items() {
            return Err(Error::SchemaViolation {
                row,
                message: format!(
                    "user_item_affinity has {} dimensions, expected {} for campaign {}",
                    self.user_item_affinity.len(),
                    campaign.n_items(),
                    campaign.name()
                ),
            });
        }
        if let Some(bad) = self.user_item_affinity.iter().find(|v| **v < 0.0) {
            return Err(Error::SchemaViolation {
                row,
                message: format!("user_item_affinity contains negative value {bad}"),
            });
        }
        Ok(())
    }
}

/// Per-campaign item features, one fixed-length vector per valid item id.
///
/// Completeness is an invariant: construction fails unless every item id
/// in the campaign's range has exactly one entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemContext {
    campaign: Campaign,
    /// Flat row-major buffer, `n_items * ITEM_FEATURE_DIM`.
    features: Vec<f64>,
}

impl ItemContext {
    /// Build item context from `(item_id, features)` rows.
    ///
    /// Rejects out-of-range ids, wrong-length feature vectors, duplicate
    /// entries, and missing ids.
    pub fn from_rows(campaign: Campaign, rows: &[(u16, Vec<f64>)]) -> Result<ItemContext> {
        let n_items = campaign.n_items();
        let mut features = vec![f64::NAN; n_items * ITEM_FEATURE_DIM];
        let mut seen = vec![false; n_items];

        for (row, (item_id, vector)) in rows.iter().enumerate() {
            if !campaign.contains(*item_id) {
                return Err(Error::SchemaViolation {
                    row,
                    message: format!(
                        "item_id {} outside campaign range [0, {}]",
                        item_id,
                        campaign.max_item_id()
                    ),
                });
            }
            if vector.len() != ITEM_FEATURE_DIM {
                return Err(Error::SchemaViolation {
                    row,
                    message: format!(
                        "item_feature vector has {} dimensions, expected {}",
                        vector.len(),
                        ITEM_FEATURE_DIM
                    ),
                });
            }
            let idx = *item_id as usize;
            if seen[idx] {
                return Err(Error::SchemaViolation {
                    row,
                    message: format!("duplicate item_context entry for item_id {item_id}"),
                });
            }
            seen[idx] = true;
            let offset = idx * ITEM_FEATURE_DIM;
            features[offset..offset + ITEM_FEATURE_DIM].copy_from_slice(vector);
        }

        if let Some(missing) = seen.iter().position(|s| !s) {
            return Err(Error::IncompleteItemContext {
                item_id: missing as u16,
            });
        }

        Ok(ItemContext { campaign, features })
    }

    /// The campaign this context belongs to.
    pub fn campaign(&self) -> Campaign {
        self.campaign
    }

    /// Feature vector for `item_id`, or None when out of range.
    pub fn get(&self, item_id: u16) -> Option<&[f64]> {
        if !self.campaign.contains(item_id) {
            return None;
        }
        let offset = item_id as usize * ITEM_FEATURE_DIM;
        Some(&self.features[offset..offset + ITEM_FEATURE_DIM])
    }

    /// The flat feature buffer, `n_items * ITEM_FEATURE_DIM` row-major.
    pub fn as_flat(&self) -> &[f64] {
        &self.features
    }
}
