//! Match and detection value objects
//!
//! A `Detection` is one firing of one rule against one input, possibly
//! with several `Match` spans. Detections store the rule id by value
//! (never a live rule reference) so they serialize cleanly.

use crate::severity::{RuleFamily, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The layer that produced a detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionLayer {
    /// Rule-based regex layer
    L1,
    /// ML classifier layer
    L2,
    /// External detector plugin
    Plugin,
}

/// A single pattern match span within the scanned text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    /// Byte offset of the match start (inclusive)
    pub start: usize,

    /// Byte offset of the match end (exclusive)
    pub end: usize,

    /// The matched substring
    pub text: String,

    /// Named capture groups, if any
    #[serde(default)]
    pub captures: HashMap<String, String>,

    /// Up to 40 characters immediately preceding the match
    #[serde(default)]
    pub context_before: Option<String>,

    /// Up to 40 characters immediately following the match
    #[serde(default)]
    pub context_after: Option<String>,
}

impl Match {
    /// Create a match without captures or context
    pub fn new<S: Into<String>>(start: usize, end: usize, text: S) -> Self {
        Self {
            start,
            end,
            text: text.into(),
            captures: HashMap::new(),
            context_before: None,
            context_after: None,
        }
    }

    /// Attach surrounding context
    pub fn with_context(mut self, before: Option<String>, after: Option<String>) -> Self {
        self.context_before = before;
        self.context_after = after;
        self
    }

    /// The `[start, end)` span of this match
    pub fn span(&self) -> (usize, usize) {
        (self.start, self.end)
    }

    /// Length of the matched substring in bytes
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Whether the match is empty
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// One rule firing against one input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Id of the rule that fired (by value, serializable)
    pub rule_id: String,

    /// Threat family
    pub family: RuleFamily,

    /// Severity of this detection
    pub severity: Severity,

    /// Confidence in [0.0, 1.0]
    pub confidence: f64,

    /// Match spans supporting this detection
    pub matches: Vec<Match>,

    /// Which layer produced it
    pub layer: DetectionLayer,

    /// When it was produced
    pub detected_at: DateTime<Utc>,

    /// Human-readable message (never the raw input)
    pub message: String,

    /// Optional longer explanation
    #[serde(default)]
    pub explanation: Option<String>,
}

impl Detection {
    /// Create a detection
    pub fn new<I, M>(
        rule_id: I,
        family: RuleFamily,
        severity: Severity,
        confidence: f64,
        layer: DetectionLayer,
        message: M,
    ) -> Self
    where
        I: Into<String>,
        M: Into<String>,
    {
        Self {
            rule_id: rule_id.into(),
            family,
            severity,
            confidence,
            matches: Vec::new(),
            layer,
            detected_at: Utc::now(),
            message: message.into(),
            explanation: None,
        }
    }

    /// Attach match spans
    pub fn with_matches(mut self, matches: Vec<Match>) -> Self {
        self.matches = matches;
        self
    }

    /// Attach an explanation
    pub fn with_explanation<S: Into<String>>(mut self, explanation: S) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    /// Dedup key: `(rule_id, first span)`
    ///
    /// Detections without spans (L2 predictions, some plugins) key on the
    /// rule id alone.
    pub fn dedup_key(&self) -> (String, Option<(usize, usize)>) {
        (
            self.rule_id.clone(),
            self.matches.first().map(|m| m.span()),
        )
    }

    /// Start of the first match span, for deterministic ordering
    pub fn first_span_start(&self) -> usize {
        self.matches.first().map(|m| m.start).unwrap_or(usize::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_span() {
        let m = Match::new(5, 12, "ignore previous".get(..7).unwrap());
        assert_eq!(m.span(), (5, 12));
        assert_eq!(m.len(), 7);
        assert!(!m.is_empty());
    }

    #[test]
    fn test_detection_dedup_key() {
        let a = Detection::new(
            "pi-001",
            RuleFamily::Pi,
            Severity::Critical,
            0.9,
            DetectionLayer::L1,
            "instruction override detected",
        )
        .with_matches(vec![Match::new(0, 6, "ignore")]);

        let b = a.clone();
        assert_eq!(a.dedup_key(), b.dedup_key());

        let c = a.clone().with_matches(vec![Match::new(10, 16, "ignore")]);
        assert_ne!(a.dedup_key(), c.dedup_key());
    }

    #[test]
    fn test_spanless_detection_orders_last() {
        let l2 = Detection::new(
            "l2-jailbreak",
            RuleFamily::Jb,
            Severity::High,
            0.9,
            DetectionLayer::L2,
            "classifier hit",
        );
        assert_eq!(l2.first_span_start(), usize::MAX);
    }

    #[test]
    fn test_detection_serializes_without_rule_reference() {
        let d = Detection::new(
            "cmd-002",
            RuleFamily::Cmd,
            Severity::High,
            0.8,
            DetectionLayer::L1,
            "shell metacharacters in prompt",
        );
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["rule_id"], "cmd-002");
        assert_eq!(json["layer"], "l1");
    }
}
