//! Voting engine
//!
//! Combines per-head classifier outputs into one decision. Heads carry
//! preset weights; a head that is absent from a shipped model simply
//! never votes, so weights renormalize by construction (only cast votes
//! are summed). The full trace is exposed on the result for testability.

use crate::heads::HeadPrediction;
use raxe_core::{HeadVote, VotingTrace};
use std::collections::HashMap;

/// Labels that count as a non-threat vote
const SAFE_LABELS: &[&str] = &["safe", "none", "benign"];

const EPSILON: f64 = 1e-4;

/// The unified decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteDecision {
    Safe,
    Threat,
    Review,
}

/// Voting parameters; defaults follow the balanced preset
#[derive(Debug, Clone)]
pub struct VotingConfig {
    /// Per-head vote weights
    pub weights: HashMap<String, f64>,

    /// Per-head confidence threshold for casting a vote
    pub confidence_threshold: f64,

    /// Half-width of the REVIEW band around the threshold (binary head)
    pub review_band: f64,

    /// Threat wins when `threat / safe` reaches this ratio
    pub ratio_threshold: f64,

    /// Minimum weighted threat votes for a THREAT decision
    pub min_threat_votes: f64,

    /// Severity-head confidence required to veto
    pub severity_veto_confidence: f64,

    /// Threat-voting heads needed to override a severity veto
    pub veto_override_count: usize,
}

impl Default for VotingConfig {
    fn default() -> Self {
        let weights = [
            ("binary", 2.0),
            ("family", 1.5),
            ("severity", 1.5),
            ("technique", 1.0),
            ("harm", 0.8),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            weights,
            confidence_threshold: 0.5,
            review_band: 0.05,
            ratio_threshold: 1.5,
            min_threat_votes: 2.0,
            severity_veto_confidence: 0.8,
            veto_override_count: 3,
        }
    }
}

impl VotingConfig {
    /// Weight for a head; heads absent from the table carry no vote
    fn weight(&self, head: &str) -> f64 {
        self.weights.get(head).copied().unwrap_or(0.0)
    }
}

/// Outcome of a voting pass
#[derive(Debug, Clone, PartialEq)]
pub struct VotingOutcome {
    /// The unified decision
    pub decision: VoteDecision,

    /// Weighted mean confidence of the votes agreeing with the decision
    pub confidence: f64,

    /// Full per-head trace
    pub trace: VotingTrace,
}

/// Weighted multi-head voting
#[derive(Debug)]
pub struct VotingEngine {
    config: VotingConfig,
}

impl VotingEngine {
    /// Engine with default weights
    pub fn new() -> Self {
        Self::with_config(VotingConfig::default())
    }

    /// Engine with explicit parameters
    pub fn with_config(config: VotingConfig) -> Self {
        Self { config }
    }

    /// Combine head predictions into one decision
    pub fn decide(&self, predictions: &[HeadPrediction]) -> VotingOutcome {
        let votes: Vec<HeadVote> = predictions
            .iter()
            .map(|p| self.cast_vote(p))
            .collect();

        let threat_votes: f64 = votes
            .iter()
            .filter(|v| v.vote == "threat")
            .map(|v| v.weight)
            .sum();
        let safe_votes: f64 = votes
            .iter()
            .filter(|v| v.vote == "safe")
            .map(|v| v.weight)
            .sum();

        // Severity veto: a confident `none` from the severity head decides
        // SAFE unless enough other heads insist on THREAT.
        let veto = votes.iter().any(|v| {
            v.head == "severity"
                && is_safe_label(&v.label)
                && v.confidence >= self.config.severity_veto_confidence
        });
        if veto {
            let overriding = votes
                .iter()
                .filter(|v| v.head != "severity" && v.vote == "threat")
                .count();
            if overriding < self.config.veto_override_count {
                let confidence = agreeing_confidence(&votes, "safe");
                return VotingOutcome {
                    decision: VoteDecision::Safe,
                    confidence,
                    trace: trace(votes, threat_votes, safe_votes, "severity_veto"),
                };
            }
        }

        let ratio = threat_votes / safe_votes.max(EPSILON);
        if ratio >= self.config.ratio_threshold && threat_votes >= self.config.min_threat_votes {
            let confidence = agreeing_confidence(&votes, "threat");
            return VotingOutcome {
                decision: VoteDecision::Threat,
                confidence,
                trace: trace(votes, threat_votes, safe_votes, "ratio_threshold"),
            };
        }

        if threat_votes < EPSILON {
            let confidence = agreeing_confidence(&votes, "safe");
            return VotingOutcome {
                decision: VoteDecision::Safe,
                confidence,
                trace: trace(votes, threat_votes, safe_votes, "no_threat_votes"),
            };
        }

        let safe_ratio = safe_votes / threat_votes.max(EPSILON);
        if safe_ratio >= self.config.ratio_threshold {
            let confidence = agreeing_confidence(&votes, "safe");
            return VotingOutcome {
                decision: VoteDecision::Safe,
                confidence,
                trace: trace(votes, threat_votes, safe_votes, "safe_majority"),
            };
        }

        let confidence = {
            let review = agreeing_confidence(&votes, "review");
            if review > 0.0 {
                review
            } else {
                votes
                    .iter()
                    .filter(|v| v.vote != "abstain")
                    .map(|v| v.confidence)
                    .fold(0.0, f64::max)
            }
        };
        VotingOutcome {
            decision: VoteDecision::Review,
            confidence,
            trace: trace(votes, threat_votes, safe_votes, "default_review"),
        }
    }

    fn cast_vote(&self, prediction: &HeadPrediction) -> HeadVote {
        let weight = self.config.weight(&prediction.head);
        let threshold = self.config.confidence_threshold;

        // A head with no configured weight cannot tilt the tally
        let vote = if weight == 0.0 {
            "abstain"
        } else if prediction.head == "binary"
            && (prediction.confidence - threshold).abs() <= self.config.review_band
        {
            "review"
        } else if prediction.confidence < threshold {
            "abstain"
        } else if is_safe_label(&prediction.label) {
            "safe"
        } else {
            "threat"
        };

        HeadVote {
            head: prediction.head.clone(),
            label: prediction.label.clone(),
            confidence: prediction.confidence,
            weight,
            vote: vote.to_string(),
        }
    }
}

impl Default for VotingEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn is_safe_label(label: &str) -> bool {
    SAFE_LABELS.iter().any(|s| label.eq_ignore_ascii_case(s))
}

fn agreeing_confidence(votes: &[HeadVote], decision: &str) -> f64 {
    let agreeing: Vec<&HeadVote> = votes.iter().filter(|v| v.vote == decision).collect();
    let total_weight: f64 = agreeing.iter().map(|v| v.weight).sum();
    if total_weight < EPSILON {
        return 0.0;
    }
    agreeing
        .iter()
        .map(|v| v.confidence * v.weight)
        .sum::<f64>()
        / total_weight
}

fn trace(votes: Vec<HeadVote>, threat_votes: f64, safe_votes: f64, decided_by: &str) -> VotingTrace {
    VotingTrace {
        votes,
        threat_votes,
        safe_votes,
        decided_by: decided_by.to_string(),
    }
}
