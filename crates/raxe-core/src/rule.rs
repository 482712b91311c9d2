//! Rule and pattern value objects
//!
//! Rules are immutable after load. A rule carries at least one regex
//! pattern; patterns compare equal on `(source, flags)` so compiled
//! matchers can be shared across rules and packs.

use crate::severity::{RuleFamily, Severity};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::time::Duration;

/// Default per-match wall-clock budget in milliseconds
pub const DEFAULT_PATTERN_TIMEOUT_MS: u64 = 5_000;

/// Regex flag set for a pattern
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternFlags {
    /// `(?i)` - case-insensitive matching
    pub case_insensitive: bool,
    /// `(?m)` - `^`/`$` match line boundaries
    pub multiline: bool,
    /// `(?s)` - `.` matches newline
    pub dot_all: bool,
    /// `(?x)` - ignore whitespace, allow comments
    pub verbose: bool,
}

impl PatternFlags {
    /// Flags with case-insensitive matching enabled
    pub fn insensitive() -> Self {
        Self {
            case_insensitive: true,
            ..Self::default()
        }
    }
}

/// A regex pattern with its flag set and match budget
///
/// Two patterns are equal iff their source and flags are equal; the
/// timeout does not participate in equality so budget tweaks never
/// invalidate a compiled-pattern cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    /// Regex source string
    pub source: String,

    /// Flag set applied at compile time
    #[serde(default)]
    pub flags: PatternFlags,

    /// Per-match wall-clock budget in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_PATTERN_TIMEOUT_MS
}

impl Pattern {
    /// Create a pattern with default flags and budget
    pub fn new<S: Into<String>>(source: S) -> Self {
        Self {
            source: source.into(),
            flags: PatternFlags::default(),
            timeout_ms: DEFAULT_PATTERN_TIMEOUT_MS,
        }
    }

    /// Create a case-insensitive pattern
    pub fn insensitive<S: Into<String>>(source: S) -> Self {
        Self {
            source: source.into(),
            flags: PatternFlags::insensitive(),
            timeout_ms: DEFAULT_PATTERN_TIMEOUT_MS,
        }
    }

    /// Set the flag set
    pub fn with_flags(mut self, flags: PatternFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the match budget
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Match budget as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Cache key for compiled-pattern sharing
    pub fn cache_key(&self) -> PatternKey {
        PatternKey {
            source: self.source.clone(),
            flags: self.flags,
        }
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.flags == other.flags
    }
}

impl Eq for Pattern {}

impl Hash for Pattern {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.hash(state);
        self.flags.hash(state);
    }
}

/// Owned key identifying a compiled pattern: `(source, flags)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatternKey {
    pub source: String,
    pub flags: PatternFlags,
}

/// An immutable detection rule
///
/// Invariants enforced by [`Rule::validate`]:
/// - `confidence` lies in `[0.0, 1.0]`
/// - at least one pattern is present
/// - the id is non-empty
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Unique id within a pack's effective rule set, e.g. `pi-001`
    pub id: String,

    /// Semantic version of the rule definition
    pub version: semver::Version,

    /// Threat family
    pub family: RuleFamily,

    /// Optional sub-family tag, e.g. `instruction_override`
    #[serde(default)]
    pub subfamily: Option<String>,

    /// Human-readable name
    pub name: String,

    /// What this rule detects
    #[serde(default)]
    pub description: String,

    /// Severity assigned to detections from this rule
    pub severity: Severity,

    /// Default confidence in [0.0, 1.0], blended with observed match signal
    pub confidence: f64,

    /// Regex patterns; at least one
    pub patterns: Vec<Pattern>,

    /// Freeform metadata
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,

    /// Why matches of this rule are risky
    #[serde(default)]
    pub risk: Option<String>,

    /// What the caller should do about it
    #[serde(default)]
    pub remediation: Option<String>,

    /// MITRE ATT&CK technique ids, e.g. `T1059`
    #[serde(default)]
    pub attack_ids: Vec<String>,
}

impl Rule {
    /// Create a rule with the minimum required fields
    pub fn new<I, N>(
        id: I,
        name: N,
        family: RuleFamily,
        severity: Severity,
        confidence: f64,
        patterns: Vec<Pattern>,
    ) -> Self
    where
        I: Into<String>,
        N: Into<String>,
    {
        Self {
            id: id.into(),
            version: semver::Version::new(1, 0, 0),
            family,
            subfamily: None,
            name: name.into(),
            description: String::new(),
            severity,
            confidence,
            patterns,
            metadata: HashMap::new(),
            risk: None,
            remediation: None,
            attack_ids: Vec::new(),
        }
    }

    /// Set the semantic version
    pub fn with_version(mut self, version: semver::Version) -> Self {
        self.version = version;
        self
    }

    /// Set the sub-family tag
    pub fn with_subfamily<S: Into<String>>(mut self, subfamily: S) -> Self {
        self.subfamily = Some(subfamily.into());
        self
    }

    /// Set the description
    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    /// Set the risk explanation
    pub fn with_risk<S: Into<String>>(mut self, risk: S) -> Self {
        self.risk = Some(risk.into());
        self
    }

    /// Set the remediation advice
    pub fn with_remediation<S: Into<String>>(mut self, remediation: S) -> Self {
        self.remediation = Some(remediation.into());
        self
    }

    /// Set the MITRE ATT&CK technique ids
    pub fn with_attack_ids(mut self, ids: Vec<String>) -> Self {
        self.attack_ids = ids;
        self
    }

    /// Check the rule invariants, naming the offending field on failure
    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("id: must not be empty".to_string());
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!(
                "confidence: {} is outside [0.0, 1.0]",
                self.confidence
            ));
        }
        if self.patterns.is_empty() {
            return Err("patterns: at least one pattern is required".to_string());
        }
        for (i, pattern) in self.patterns.iter().enumerate() {
            if pattern.source.is_empty() {
                return Err(format!("patterns[{}].source: must not be empty", i));
            }
        }
        Ok(())
    }
}
