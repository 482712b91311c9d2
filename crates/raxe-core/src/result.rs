//! Scan result types
//!
//! Results are immutable once constructed and safe to serialize: they
//! carry the input's SHA-256 fingerprint and detection metadata, never
//! the raw text itself.

use crate::detection::Detection;
use crate::severity::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Result of the L1 rule layer for a single scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Detections, sorted severity-descending, rule-id-ascending
    pub detections: Vec<Detection>,

    /// Length of the scanned input in bytes
    pub input_len: usize,

    /// Number of rules evaluated
    pub rules_evaluated: usize,

    /// Wall-clock duration of the rule pass in milliseconds
    pub duration_ms: u64,

    /// When the scan ran
    pub scanned_at: DateTime<Utc>,

    /// Ids of rules skipped due to compile errors or timeouts
    #[serde(default)]
    pub failed_rules: Vec<String>,
}

impl ScanResult {
    /// An empty result for the given input length
    pub fn empty(input_len: usize) -> Self {
        Self {
            detections: Vec::new(),
            input_len,
            rules_evaluated: 0,
            duration_ms: 0,
            scanned_at: Utc::now(),
            failed_rules: Vec::new(),
        }
    }

    /// Whether any rule fired
    pub fn has_detections(&self) -> bool {
        !self.detections.is_empty()
    }

    /// Maximum severity over all detections, if any
    pub fn highest_severity(&self) -> Option<Severity> {
        self.detections.iter().map(|d| d.severity).max()
    }
}

/// One L2 classifier prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct L2Prediction {
    /// Threat label decoded from the classifier output
    pub label: String,

    /// Confidence in [0.0, 1.0]
    pub confidence: f64,

    /// Family decoded by the family head
    pub family: crate::severity::RuleFamily,

    /// Subfamily decoded by the subfamily head, if available
    #[serde(default)]
    pub subfamily: Option<String>,

    /// Per-head confidences keyed by head name
    #[serde(default)]
    pub head_confidences: HashMap<String, f64>,
}

impl L2Prediction {
    /// Severity derived from this prediction's confidence
    pub fn derived_severity(&self) -> Severity {
        Severity::from_confidence(self.confidence)
    }
}

/// How a single voting head voted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadVote {
    /// Head name: `binary`, `family`, `severity`, `technique`, `harm`
    pub head: String,

    /// Raw label the head produced
    pub label: String,

    /// Head confidence
    pub confidence: f64,

    /// Vote weight after preset lookup
    pub weight: f64,

    /// The mapped vote: `safe`, `threat`, `review`, or `abstain`
    pub vote: String,
}

/// Trace of a voting-engine decision, exposed for testability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VotingTrace {
    /// Per-head votes in evaluation order
    pub votes: Vec<HeadVote>,

    /// Total weighted threat votes
    pub threat_votes: f64,

    /// Total weighted safe votes
    pub safe_votes: f64,

    /// The rule that decided the outcome, e.g. `severity_veto`,
    /// `ratio_threshold`, `default_review`
    pub decided_by: String,
}

/// Result of the L2 layer for a single scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct L2Result {
    /// Predictions; empty when the binary head says safe or on error
    pub predictions: Vec<L2Prediction>,

    /// Inference duration in milliseconds
    pub duration_ms: u64,

    /// Id of the model that produced the result
    pub model_id: String,

    /// Voting trace when multiple heads participated
    #[serde(default)]
    pub voting: Option<VotingTrace>,

    /// Error annotation when the call degraded to empty
    #[serde(default)]
    pub error: Option<String>,
}

impl L2Result {
    /// An empty result for the given model
    pub fn empty<S: Into<String>>(model_id: S) -> Self {
        Self {
            predictions: Vec::new(),
            duration_ms: 0,
            model_id: model_id.into(),
            voting: None,
            error: None,
        }
    }

    /// An empty result annotated with a degradation reason
    pub fn degraded<S: Into<String>, E: Into<String>>(model_id: S, error: E) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::empty(model_id)
        }
    }

    /// Whether any prediction crossed into threat territory
    pub fn has_predictions(&self) -> bool {
        !self.predictions.is_empty()
    }

    /// The prediction with the highest confidence, if any
    pub fn top_prediction(&self) -> Option<&L2Prediction> {
        self.predictions
            .iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
    }

    /// Severity derived from the top prediction per the confidence table
    pub fn derived_severity(&self) -> Option<Severity> {
        self.top_prediction().map(|p| p.derived_severity())
    }
}

/// Fused L1 + L2 + plugin result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedScanResult {
    /// Union of detections from all layers, deduplicated
    pub detections: Vec<Detection>,

    /// max(L1 highest, derived L2, plugin highest); `None` when clean
    pub severity: Option<Severity>,

    /// True iff severity >= low and a non-suppressed detection exists
    pub has_threats: bool,

    /// The L1 result the fusion was built from
    pub l1: ScanResult,

    /// The L2 result, when the layer ran
    #[serde(default)]
    pub l2: Option<L2Result>,
}

impl CombinedScanResult {
    /// Highest severity over the merged detection list
    pub fn highest_detection_severity(&self) -> Option<Severity> {
        self.detections.iter().map(|d| d.severity).max()
    }
}
