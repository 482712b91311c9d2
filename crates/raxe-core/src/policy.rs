//! Policy types and the pipeline result
//!
//! A `ScanPolicy` is a declarative mapping from detection characteristics
//! to an action. Evaluation lives in the engine crate; the types live here
//! so they can travel through configuration files and results.

use crate::result::CombinedScanResult;
use crate::severity::Severity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Action a policy decides for a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyAction {
    /// Let the text through
    Allow,
    /// Let it through, flagged
    Warn,
    /// Stop it
    Block,
    /// Defer to an out-of-band challenge flow
    Challenge,
}

impl Default for PolicyAction {
    fn default() -> Self {
        PolicyAction::Allow
    }
}

/// One declarative policy rule
///
/// A rule matches a detection when every present criterion matches; absent
/// criteria match everything. The first matching rule in priority order
/// decides the action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Severities this rule applies to; `None` matches any
    #[serde(default)]
    pub severities: Option<Vec<Severity>>,

    /// Rule-id globs (`*` wildcard); `None` matches any
    #[serde(default)]
    pub rule_globs: Option<Vec<String>>,

    /// Minimum detection confidence; `None` matches any
    #[serde(default)]
    pub min_confidence: Option<f64>,

    /// The action to take when this rule matches
    pub action: PolicyAction,

    /// Higher priorities are evaluated first
    #[serde(default)]
    pub priority: i32,
}

/// A declarative scan policy with global blocking defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanPolicy {
    /// Declarative rules, evaluated priority-descending
    #[serde(default)]
    pub rules: Vec<PolicyRule>,

    /// Block whenever combined or L2-derived severity is critical
    #[serde(default = "default_true")]
    pub block_on_critical: bool,

    /// Block whenever combined or L2-derived severity is high
    #[serde(default)]
    pub block_on_high: bool,

    /// Minimum confidence for a detection to count as a threat
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
}

fn default_true() -> bool {
    true
}

fn default_confidence_threshold() -> f64 {
    0.7
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            block_on_critical: true,
            block_on_high: false,
            confidence_threshold: 0.7,
        }
    }
}

impl ScanPolicy {
    /// The standard policy the pipeline uses when none is supplied
    ///
    /// Critical detections block, high and medium warn, everything else
    /// falls through to the implied ALLOW. The global blocking flags stay
    /// at their defaults.
    pub fn standard() -> Self {
        Self::default()
            .with_rule(PolicyRule {
                severities: Some(vec![Severity::Critical]),
                rule_globs: None,
                min_confidence: None,
                action: PolicyAction::Block,
                priority: 100,
            })
            .with_rule(PolicyRule {
                severities: Some(vec![Severity::Medium, Severity::High]),
                rule_globs: None,
                min_confidence: None,
                action: PolicyAction::Warn,
                priority: 50,
            })
    }

    /// Add a rule
    pub fn with_rule(mut self, rule: PolicyRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Set the high-severity blocking default
    pub fn with_block_on_high(mut self, block: bool) -> Self {
        self.block_on_high = block;
        self
    }

    /// Set the global confidence threshold
    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }
}

/// The output of a full pipeline scan
///
/// Contains only privacy-safe fields: the raw input appears nowhere, only
/// its SHA-256 fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanPipelineResult {
    /// Fused L1 + L2 + plugin result after suppressions
    pub combined: CombinedScanResult,

    /// The action the policy resolved
    pub action: PolicyAction,

    /// Whether the caller should block the interaction
    pub should_block: bool,

    /// Total scan duration in milliseconds (initialization excluded)
    pub duration_ms: u64,

    /// L1 portion of the duration
    pub l1_duration_ms: u64,

    /// L2 portion of the duration, when L2 ran
    #[serde(default)]
    pub l2_duration_ms: Option<u64>,

    /// SHA-256 hex fingerprint of the scanned text
    pub text_fingerprint: String,

    /// Per-scan metadata, including an `errors` map for captured failures
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ScanPipelineResult {
    /// Record a captured per-scan error under `metadata.errors`
    pub fn record_error<K: Into<String>, V: Into<String>>(&mut self, key: K, message: V) {
        let errors = self
            .metadata
            .entry("errors".to_string())
            .or_insert_with(|| serde_json::Value::Object(Default::default()));
        if let serde_json::Value::Object(map) = errors {
            map.insert(key.into(), serde_json::Value::String(message.into()));
        }
    }

    /// The captured error map, if any errors were recorded
    pub fn errors(&self) -> Option<&serde_json::Map<String, serde_json::Value>> {
        self.metadata.get("errors").and_then(|v| v.as_object())
    }
}

/// Out-of-band signal carrying a BLOCK decision to wrapper layers
///
/// This is deliberately not a variant of [`crate::Error`]: a block is a
/// policy outcome, not a failure. It propagates only when the caller opts
/// in to block-on-threat enforcement.
#[derive(Debug, Clone)]
pub struct PolicyBlockSignal {
    /// The full result that led to the block
    pub result: ScanPipelineResult,
}

impl std::fmt::Display for PolicyBlockSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "scan blocked by policy (severity: {}, detections: {})",
            self.result
                .combined
                .severity
                .map(|s| s.to_string())
                .unwrap_or_else(|| "none".to_string()),
            self.result.combined.detections.len()
        )
    }
}

impl std::error::Error for PolicyBlockSignal {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::ScanResult;

    fn pipeline_result() -> ScanPipelineResult {
        ScanPipelineResult {
            combined: CombinedScanResult {
                detections: Vec::new(),
                severity: None,
                has_threats: false,
                l1: ScanResult::empty(0),
                l2: None,
            },
            action: PolicyAction::Allow,
            should_block: false,
            duration_ms: 1,
            l1_duration_ms: 1,
            l2_duration_ms: None,
            text_fingerprint: "00".repeat(32),
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn test_policy_defaults() {
        let policy = ScanPolicy::default();
        assert!(policy.block_on_critical);
        assert!(!policy.block_on_high);
        assert!((policy.confidence_threshold - 0.7).abs() < f64::EPSILON);
        assert!(policy.rules.is_empty());
    }

    #[test]
    fn test_error_recording() {
        let mut result = pipeline_result();
        assert!(result.errors().is_none());

        result.record_error("l2", "deadline exceeded");
        result.record_error("plugin:webhook", "connection refused");

        let errors = result.errors().unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors["l2"], "deadline exceeded");
    }

    #[test]
    fn test_block_signal_display() {
        let signal = PolicyBlockSignal {
            result: pipeline_result(),
        };
        let msg = signal.to_string();
        assert!(msg.contains("blocked by policy"));
        assert!(msg.contains("none"));
    }

    #[test]
    fn test_policy_serde() {
        let policy = ScanPolicy::default().with_rule(PolicyRule {
            severities: Some(vec![Severity::High, Severity::Critical]),
            rule_globs: Some(vec!["pi-*".to_string()]),
            min_confidence: Some(0.8),
            action: PolicyAction::Block,
            priority: 100,
        });
        let json = serde_json::to_string(&policy).unwrap();
        let back: ScanPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, policy);
    }
}
