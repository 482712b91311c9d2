//! Suppression manager
//!
//! User-configured directives to ignore detections by rule-id pattern
//! (exact or `*` wildcard), each with an optional expiration. Applied
//! after the merge and before policy evaluation; suppressions only
//! partition the detection list, never mutate detection contents. Every
//! application is recorded in an audit log.
//!
//! Reads (during scans) vastly outnumber writes (administration), so the
//! state sits behind a reader-writer lock.

use crate::glob::glob_match;
use chrono::{DateTime, Utc};
use raxe_core::{Detection, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::RwLock;

/// One suppression directive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suppression {
    /// Rule-id pattern, exact or with `*` wildcards
    pub pattern: String,

    /// Why this suppression exists
    pub reason: String,

    /// When it stops applying; `None` means never
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Suppression {
    /// Whether the suppression has expired as of `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |at| at <= now)
    }
}

/// Audit entry recorded for every applied suppression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuppressionAuditEntry {
    /// When the suppression was applied
    pub timestamp: DateTime<Utc>,

    /// The suppressed detection's rule id
    pub rule_id: String,

    /// The pattern that matched
    pub pattern: String,

    /// The reason attached to the suppression
    pub reason: String,
}

/// Thread-safe suppression set with audit log
#[derive(Default)]
pub struct SuppressionManager {
    state: RwLock<State>,
}

#[derive(Default)]
struct State {
    suppressions: Vec<Suppression>,
    audit_log: Vec<SuppressionAuditEntry>,
}

impl SuppressionManager {
    /// An empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Load suppressions from a JSON file
    ///
    /// The file holds an array of suppression objects. A missing file is
    /// an empty set, not an error.
    pub fn load_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::suppression_persist(format!("read failed: {}", e)))?;
        let suppressions: Vec<Suppression> = serde_json::from_str(&raw)
            .map_err(|e| Error::suppression_persist(format!("invalid file: {}", e)))?;

        let manager = Self::new();
        manager.state.write().unwrap().suppressions = suppressions;
        Ok(manager)
    }

    /// Persist the current suppression set to a JSON file
    ///
    /// On failure the in-memory set keeps applying; the caller may retry.
    pub fn save_file(&self, path: &Path) -> Result<()> {
        let suppressions = self.state.read().unwrap().suppressions.clone();
        let raw = serde_json::to_string_pretty(&suppressions)
            .map_err(|e| Error::suppression_persist(e.to_string()))?;
        std::fs::write(path, raw)
            .map_err(|e| Error::suppression_persist(format!("write failed: {}", e)))
    }

    /// Add a suppression
    pub fn add<P: Into<String>, R: Into<String>>(
        &self,
        pattern: P,
        reason: R,
        expires_at: Option<DateTime<Utc>>,
    ) {
        let suppression = Suppression {
            pattern: pattern.into(),
            reason: reason.into(),
            expires_at,
        };
        tracing::info!(pattern = %suppression.pattern, "suppression added");
        self.state.write().unwrap().suppressions.push(suppression);
    }

    /// Remove every suppression with the given pattern
    pub fn remove(&self, pattern: &str) {
        let mut state = self.state.write().unwrap();
        let before = state.suppressions.len();
        state.suppressions.retain(|s| s.pattern != pattern);
        if state.suppressions.len() != before {
            tracing::info!(pattern = %pattern, "suppression removed");
        }
    }

    /// Whether a rule id is currently suppressed
    pub fn is_suppressed(&self, rule_id: &str) -> bool {
        let now = Utc::now();
        self.state
            .read()
            .unwrap()
            .suppressions
            .iter()
            .any(|s| !s.is_expired(now) && glob_match(&s.pattern, rule_id))
    }

    /// Partition detections into `(kept, suppressed)`, recording each
    /// application in the audit log
    pub fn apply(&self, detections: Vec<Detection>) -> (Vec<Detection>, Vec<Detection>) {
        let now = Utc::now();
        let mut kept = Vec::new();
        let mut suppressed = Vec::new();
        let mut state = self.state.write().unwrap();

        for detection in detections {
            let matched = state
                .suppressions
                .iter()
                .find(|s| !s.is_expired(now) && glob_match(&s.pattern, &detection.rule_id))
                .cloned();

            match matched {
                Some(suppression) => {
                    state.audit_log.push(SuppressionAuditEntry {
                        timestamp: now,
                        rule_id: detection.rule_id.clone(),
                        pattern: suppression.pattern,
                        reason: suppression.reason,
                    });
                    suppressed.push(detection);
                }
                None => kept.push(detection),
            }
        }

        if !suppressed.is_empty() {
            tracing::debug!(count = suppressed.len(), "detections suppressed");
        }
        (kept, suppressed)
    }

    /// Current suppression list
    pub fn list(&self) -> Vec<Suppression> {
        self.state.read().unwrap().suppressions.clone()
    }

    /// Snapshot of the audit log
    pub fn audit_log(&self) -> Vec<SuppressionAuditEntry> {
        self.state.read().unwrap().audit_log.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use raxe_core::{DetectionLayer, RuleFamily, Severity};

    fn detection(rule_id: &str) -> Detection {
        Detection::new(
            rule_id,
            RuleFamily::from_rule_id(rule_id),
            Severity::High,
            0.8,
            DetectionLayer::L1,
            "hit",
        )
    }

    #[test]
    fn test_exact_and_wildcard_matching() {
        let manager = SuppressionManager::new();
        manager.add("pi-001", "known false positive", None);
        manager.add("enc-*", "encoding rules too noisy", None);

        assert!(manager.is_suppressed("pi-001"));
        assert!(!manager.is_suppressed("pi-002"));
        assert!(manager.is_suppressed("enc-004"));
        assert!(!manager.is_suppressed("jb-001"));
    }

    #[test]
    fn test_expired_suppression_skipped() {
        let manager = SuppressionManager::new();
        manager.add("pi-*", "expired", Some(Utc::now() - Duration::hours(1)));
        manager.add("jb-*", "live", Some(Utc::now() + Duration::hours(1)));

        assert!(!manager.is_suppressed("pi-001"));
        assert!(manager.is_suppressed("jb-001"));
    }

    #[test]
    fn test_apply_partitions_without_mutation() {
        let manager = SuppressionManager::new();
        manager.add("pi-*", "tuning", None);

        let original = vec![detection("pi-001"), detection("cmd-001")];
        let (kept, suppressed) = manager.apply(original.clone());

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].rule_id, "cmd-001");
        assert_eq!(suppressed.len(), 1);
        // Contents untouched, only partitioned
        assert_eq!(suppressed[0], original[0]);
    }

    #[test]
    fn test_audit_log_records_applications() {
        let manager = SuppressionManager::new();
        manager.add("pi-*", "tuning window", None);

        manager.apply(vec![detection("pi-001"), detection("pi-002")]);

        let log = manager.audit_log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].rule_id, "pi-001");
        assert_eq!(log[0].pattern, "pi-*");
        assert_eq!(log[0].reason, "tuning window");
    }

    #[test]
    fn test_remove() {
        let manager = SuppressionManager::new();
        manager.add("pi-*", "a", None);
        manager.add("jb-*", "b", None);
        manager.remove("pi-*");

        assert!(!manager.is_suppressed("pi-001"));
        assert!(manager.is_suppressed("jb-001"));
        assert_eq!(manager.list().len(), 1);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suppressions.json");

        let manager = SuppressionManager::new();
        manager.add("enc-*", "noisy", None);
        manager.add("pi-004", "accepted risk", Some(Utc::now() + Duration::days(30)));
        manager.save_file(&path).unwrap();

        let loaded = SuppressionManager::load_file(&path).unwrap();
        assert_eq!(loaded.list().len(), 2);
        assert!(loaded.is_suppressed("enc-001"));
        assert!(loaded.is_suppressed("pi-004"));
    }

    #[test]
    fn test_missing_file_is_empty_set() {
        let manager =
            SuppressionManager::load_file(Path::new("/nonexistent/suppressions.json")).unwrap();
        assert!(manager.list().is_empty());
    }

    #[test]
    fn test_unwritable_path_is_persist_error() {
        let manager = SuppressionManager::new();
        manager.add("pi-*", "x", None);
        let err = manager
            .save_file(Path::new("/nonexistent/dir/suppressions.json"))
            .unwrap_err();
        assert!(matches!(err, Error::SuppressionPersist { .. }));
        // In-memory state still applies
        assert!(manager.is_suppressed("pi-001"));
    }
}
