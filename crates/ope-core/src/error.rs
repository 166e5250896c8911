//! Error types for Open Bandit Replay.
//!
//! Validation failures are detected eagerly at load time and surfaced
//! immediately; a dataset intended for scientific estimation must not
//! admit partially-corrupt data, so there is no silent coercion of
//! invalid rows and no retry path. Every error carries enough context
//! (row or line identifier where applicable) to locate the offending
//! source data or configuration.
//!
//! Errors serialize to structured JSON for machine consumers:
//! ```json
//! {
//!   "code": 10,
//!   "category": "schema",
//!   "message": "schema violation at row 41: item_id 99 outside campaign range [0, 80]",
//!   "context": { "row": 41 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for Open Bandit Replay operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Record/schema validation and item-context join errors.
    Schema,
    /// Estimator invocation errors (missing model, bad policy, empty data).
    Estimation,
    /// Configuration errors (estimator/bootstrap parameters).
    Config,
    /// File I/O and parse errors on the CSV boundary.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Schema => write!(f, "schema"),
            ErrorCategory::Estimation => write!(f, "estimation"),
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for Open Bandit Replay.
#[derive(Error, Debug)]
pub enum Error {
    // Schema errors (10-19)
    #[error("schema violation at row {row}: {message}")]
    SchemaViolation { row: usize, message: String },

    #[error("item context incomplete: no entry for item_id {item_id}")]
    IncompleteItemContext { item_id: u16 },

    // Estimation errors (20-29)
    #[error("empty feedback: estimator requires at least one logged round")]
    EmptyFeedback,

    #[error("{estimator} requires a reward model and none was supplied")]
    MissingRewardModel { estimator: &'static str },

    #[error(
        "evaluation policy is not a distribution at (row {row}, position {position}): \
         probabilities sum to {sum}"
    )]
    InvalidEvaluationPolicy { row: usize, position: u8, sum: f64 },

    #[error("propensity at row {row} is {score}, expected strictly positive")]
    ZeroPropensity { row: usize, score: f64 },

    #[error("{estimator} produced a non-finite estimate")]
    NonFiniteEstimate { estimator: String },

    // Configuration errors (30-39)
    #[error("invalid value for {field}: {message}")]
    InvalidConfig { field: String, message: String },

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Returns the stable error code for this error type.
    ///
    /// Error codes are grouped by category:
    /// - 10-19: Schema errors
    /// - 20-29: Estimation errors
    /// - 30-39: Configuration errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::SchemaViolation { .. } => 10,
            Error::IncompleteItemContext { .. } => 11,
            Error::EmptyFeedback => 20,
            Error::MissingRewardModel { .. } => 21,
            Error::InvalidEvaluationPolicy { .. } => 22,
            Error::ZeroPropensity { .. } => 23,
            Error::NonFiniteEstimate { .. } => 24,
            Error::InvalidConfig { .. } => 30,
            Error::Io(_) => 60,
            Error::Parse { .. } => 61,
            Error::Cancelled => 62,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::SchemaViolation { .. } | Error::IncompleteItemContext { .. } => {
                ErrorCategory::Schema
            }

            Error::EmptyFeedback
            | Error::MissingRewardModel { .. }
            | Error::InvalidEvaluationPolicy { .. }
            | Error::ZeroPropensity { .. }
            | Error::NonFiniteEstimate { .. } => ErrorCategory::Estimation,

            Error::InvalidConfig { .. } => ErrorCategory::Config,

            Error::Io(_) | Error::Parse { .. } | Error::Cancelled => ErrorCategory::Io,
        }
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Additional structured context (row index, line number, field name).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::SchemaViolation { row, .. } => {
                context.insert("row".to_string(), serde_json::json!(row));
            }
            Error::IncompleteItemContext { item_id } => {
                context.insert("item_id".to_string(), serde_json::json!(item_id));
            }
            Error::InvalidEvaluationPolicy { row, position, sum } => {
                context.insert("row".to_string(), serde_json::json!(row));
                context.insert("position".to_string(), serde_json::json!(position));
                context.insert("sum".to_string(), serde_json::json!(sum));
            }
            Error::ZeroPropensity { row, score } => {
                context.insert("row".to_string(), serde_json::json!(row));
                context.insert("score".to_string(), serde_json::json!(score));
            }
            Error::InvalidConfig { field, .. } => {
                context.insert("field".to_string(), serde_json::json!(field));
            }
            Error::Parse { line, .. } => {
                context.insert("line".to_string(), serde_json::json!(line));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            context,
        }
    }
}

impl StructuredError {
    /// Serialize to a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }
}
