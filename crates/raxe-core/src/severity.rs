//! Severity levels and threat families
//!
//! Severities form a total order (`Info < Low < Medium < High < Critical`)
//! so detection lists can be sorted and the combined severity of a scan is
//! a plain `max`. Families are the coarse threat taxonomy used by rule ids
//! (`pi-001`, `enc-007`, ...) and by the L2 family head.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordinal threat level of a detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational finding, no direct threat
    Info,
    /// Low severity
    Low,
    /// Medium severity
    Medium,
    /// High severity
    High,
    /// Critical severity
    Critical,
}

impl Severity {
    /// Stable string code, matching the serialized form
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// Derive a severity from an L2 prediction confidence
    ///
    /// | confidence | severity |
    /// |---|---|
    /// | >= 0.95 | critical |
    /// | >= 0.85 | high |
    /// | >= 0.70 | medium |
    /// | < 0.70 | low |
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.95 {
            Severity::Critical
        } else if confidence >= 0.85 {
            Severity::High
        } else if confidence >= 0.70 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

/// Coarse grouping of threats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleFamily {
    /// Prompt injection
    Pi,
    /// Jailbreak
    Jb,
    /// Data extraction / PII disclosure
    Pii,
    /// Command or code injection
    Cmd,
    /// Encoding / obfuscation
    Enc,
    /// Retrieval-augmented attack
    Rag,
    /// Harmful content
    Hc,
    /// Toxic content
    Tox,
    /// Other / miscellaneous
    Xx,
    /// User-defined
    Custom,
}

impl RuleFamily {
    /// Stable string code, matching rule id prefixes
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleFamily::Pi => "pi",
            RuleFamily::Jb => "jb",
            RuleFamily::Pii => "pii",
            RuleFamily::Cmd => "cmd",
            RuleFamily::Enc => "enc",
            RuleFamily::Rag => "rag",
            RuleFamily::Hc => "hc",
            RuleFamily::Tox => "tox",
            RuleFamily::Xx => "xx",
            RuleFamily::Custom => "custom",
        }
    }

    /// Infer the family from a rule id prefix (`pi-001` -> `Pi`)
    ///
    /// Ids without a known prefix fall back to `Custom`.
    pub fn from_rule_id(rule_id: &str) -> Self {
        let prefix = rule_id.split('-').next().unwrap_or("");
        prefix.parse().unwrap_or(RuleFamily::Custom)
    }

    /// All families, in taxonomy order
    pub fn all() -> &'static [RuleFamily] {
        &[
            RuleFamily::Pi,
            RuleFamily::Jb,
            RuleFamily::Pii,
            RuleFamily::Cmd,
            RuleFamily::Enc,
            RuleFamily::Rag,
            RuleFamily::Hc,
            RuleFamily::Tox,
            RuleFamily::Xx,
            RuleFamily::Custom,
        ]
    }
}

impl fmt::Display for RuleFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pi" => Ok(RuleFamily::Pi),
            "jb" => Ok(RuleFamily::Jb),
            "pii" => Ok(RuleFamily::Pii),
            "cmd" => Ok(RuleFamily::Cmd),
            "enc" => Ok(RuleFamily::Enc),
            "rag" => Ok(RuleFamily::Rag),
            "hc" => Ok(RuleFamily::Hc),
            "tox" => Ok(RuleFamily::Tox),
            "xx" => Ok(RuleFamily::Xx),
            "custom" => Ok(RuleFamily::Custom),
            other => Err(format!("unknown rule family '{}'", other)),
        }
    }
}
