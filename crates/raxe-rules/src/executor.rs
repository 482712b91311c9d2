//! Rule execution over input text
//!
//! Evaluates a rule set against one input, producing an L1 [`ScanResult`].
//! Rules are independent: a compile failure or timeout skips that rule and
//! records its id in `failed_rules`, never failing the scan. The returned
//! detection list is sorted (severity descending, rule id ascending, span
//! start ascending) so callers see a stable view regardless of evaluation
//! order.

use crate::cache::CompiledPatternCache;
use crate::matcher::MatchOutcome;
use chrono::Utc;
use raxe_core::{Detection, DetectionLayer, Match, Rule, ScanResult};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Evaluates rule sets against text
pub struct RuleExecutor {
    cache: Arc<CompiledPatternCache>,
}

impl RuleExecutor {
    /// Create an executor sharing the given compiled-pattern cache
    pub fn new(cache: Arc<CompiledPatternCache>) -> Self {
        Self { cache }
    }

    /// Evaluate `rules` against `text` with each pattern's own budget
    pub fn execute(&self, text: &str, rules: &[Arc<Rule>]) -> ScanResult {
        self.execute_with_budget(text, rules, None)
    }

    /// Evaluate with an explicit per-pattern budget override
    pub fn execute_with_budget(
        &self,
        text: &str,
        rules: &[Arc<Rule>],
        budget: Option<Duration>,
    ) -> ScanResult {
        let started = Instant::now();
        let mut detections = Vec::new();
        let mut failed_rules = Vec::new();

        if !text.is_empty() {
            for rule in rules {
                match self.evaluate_rule(text, rule, budget) {
                    RuleOutcome::Fired(detection) => detections.push(detection),
                    RuleOutcome::Clean => {}
                    RuleOutcome::Failed => failed_rules.push(rule.id.clone()),
                }
            }
        }

        sort_detections(&mut detections);

        ScanResult {
            detections,
            input_len: text.len(),
            rules_evaluated: rules.len(),
            duration_ms: started.elapsed().as_millis() as u64,
            scanned_at: Utc::now(),
            failed_rules,
        }
    }

    fn evaluate_rule(&self, text: &str, rule: &Rule, budget: Option<Duration>) -> RuleOutcome {
        let mut matches: Vec<Match> = Vec::new();
        let mut usable_patterns = 0usize;

        for pattern in &rule.patterns {
            let compiled = match self.cache.get_or_compile(pattern, &rule.id) {
                Ok(compiled) => compiled,
                Err(_) => continue,
            };
            usable_patterns += 1;

            let outcome = match budget {
                Some(limit) => compiled.find_all_within(text, limit),
                None => compiled.find_all(text),
            };

            match outcome {
                MatchOutcome::Matches(found) => matches.extend(found),
                MatchOutcome::TimedOut => {
                    tracing::warn!(rule_id = %rule.id, "pattern match budget exceeded");
                    return RuleOutcome::Failed;
                }
            }
        }

        if usable_patterns == 0 {
            return RuleOutcome::Failed;
        }
        if matches.is_empty() {
            return RuleOutcome::Clean;
        }

        matches.sort_by_key(|m| (m.start, m.end));
        let confidence = observed_confidence(rule.confidence, &matches, text.len());

        let mut detection = Detection::new(
            rule.id.clone(),
            rule.family,
            rule.severity,
            confidence,
            DetectionLayer::L1,
            rule.name.clone(),
        )
        .with_matches(matches);
        if let Some(risk) = &rule.risk {
            detection = detection.with_explanation(risk.clone());
        }

        RuleOutcome::Fired(detection)
    }
}

enum RuleOutcome {
    Fired(Detection),
    Clean,
    Failed,
}

/// Blend a rule's default confidence with the observed match signal
///
/// Hit-count factor saturates at three hits; the coverage factor compares
/// total matched length against the input (floored at 20 to keep tiny
/// inputs from inflating coverage). The observed factor is then
/// `0.4 * hits + 0.4 * coverage + 0.2`, and the final confidence blends
/// 70% default with 30% observed, clamped to [0, 1].
pub fn observed_confidence(default_confidence: f64, matches: &[Match], input_len: usize) -> f64 {
    let hit_factor = (matches.len() as f64 / 3.0).min(1.0);

    let covered: usize = matches.iter().map(|m| m.len()).sum();
    let coverage_factor = (covered as f64 / (input_len as f64).max(20.0)).min(1.0);

    let observed = 0.4 * hit_factor + 0.4 * coverage_factor + 0.2;
    (0.7 * default_confidence + 0.3 * observed).clamp(0.0, 1.0)
}

/// Sort detections severity-descending, then rule id, then span start
pub fn sort_detections(detections: &mut [Detection]) {
    detections.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.rule_id.cmp(&b.rule_id))
            .then_with(|| a.first_span_start().cmp(&b.first_span_start()))
    });
}
