//! Policy evaluation
//!
//! Translates a `CombinedScanResult` into an action plus a `should_block`
//! flag. Rules evaluate priority-descending (declaration order breaks
//! ties); the first rule matching any detection decides the action, and
//! an implied ALLOW catches everything else.
//!
//! Blocking is L2-aware by invariant: the global `block_on_critical` /
//! `block_on_high` flags are checked against the combined severity and,
//! separately, against the severity derived from the strongest L2
//! prediction. A policy that ignored L2-only detections would let a
//! critical classifier hit through; `should_block` is the OR of both
//! checks so that cannot happen.

use crate::glob::any_glob_match;
use raxe_core::{
    CombinedScanResult, Detection, DetectionLayer, PolicyAction, PolicyRule, ScanPolicy, Severity,
};

/// The evaluator's verdict
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyDecision {
    /// Action from the first matching rule, or ALLOW
    pub action: PolicyAction,

    /// Whether the caller should block
    pub should_block: bool,

    /// Index of the rule that decided the action, if any
    pub matched_rule: Option<usize>,
}

/// Evaluates a declarative policy against fused results
pub struct PolicyEvaluator {
    policy: ScanPolicy,
    // Indices into `policy.rules`, priority-descending, stable on ties
    order: Vec<usize>,
}

impl PolicyEvaluator {
    /// Build an evaluator; rule order is resolved once
    pub fn new(policy: ScanPolicy) -> Self {
        let mut order: Vec<usize> = (0..policy.rules.len()).collect();
        order.sort_by(|&a, &b| {
            policy.rules[b]
                .priority
                .cmp(&policy.rules[a].priority)
                .then_with(|| a.cmp(&b))
        });
        Self { policy, order }
    }

    /// The policy being evaluated
    pub fn policy(&self) -> &ScanPolicy {
        &self.policy
    }

    /// Evaluate the fused result
    pub fn evaluate(&self, result: &CombinedScanResult) -> PolicyDecision {
        let mut action = PolicyAction::Allow;
        let mut matched_rule = None;

        'rules: for &index in &self.order {
            let rule = &self.policy.rules[index];
            for detection in &result.detections {
                if rule_matches(rule, detection) {
                    action = rule.action;
                    matched_rule = Some(index);
                    break 'rules;
                }
            }
        }

        let should_block_combined = self.severity_blocks(result.severity);
        // The L2-derived check only counts while an L2 detection survived
        // suppression; otherwise a suppressed prediction could still block
        let l2_alive = result
            .detections
            .iter()
            .any(|d| d.layer == DetectionLayer::L2);
        let should_block_l2 = l2_alive
            && self.severity_blocks(result.l2.as_ref().and_then(|l2| l2.derived_severity()));
        let should_block = should_block_combined
            || should_block_l2
            || action == PolicyAction::Block;

        // Suppressions may have emptied the detection list; an empty list
        // never blocks regardless of residual severities.
        let should_block = should_block && !result.detections.is_empty();

        PolicyDecision {
            action,
            should_block,
            matched_rule,
        }
    }

    fn severity_blocks(&self, severity: Option<Severity>) -> bool {
        match severity {
            Some(Severity::Critical) => self.policy.block_on_critical,
            Some(Severity::High) => self.policy.block_on_high,
            _ => false,
        }
    }
}

fn rule_matches(rule: &PolicyRule, detection: &Detection) -> bool {
    if let Some(severities) = &rule.severities {
        if !severities.contains(&detection.severity) {
            return false;
        }
    }
    if let Some(globs) = &rule.rule_globs {
        if !any_glob_match(globs.iter().map(|g| g.as_str()), &detection.rule_id) {
            return false;
        }
    }
    if let Some(min_confidence) = rule.min_confidence {
        if detection.confidence < min_confidence {
            return false;
        }
    }
    true
}
