//! Error types for the RAXE engine
//!
//! ## Design Principles
//!
//! 1. **Specific Variants**: each failure mode has its own variant
//! 2. **Context**: errors carry the identifiers needed to act on them
//! 3. **Privacy**: error messages never embed scanned text
//! 4. **Display**: human-readable messages via `thiserror`
//!
//! Initialization-time errors (`Config`, `ModelLoad`) propagate to the
//! caller. Per-scan errors (`PatternTimeout`, `ModelInference`, `Plugin`)
//! are captured into result metadata and never cross the pipeline boundary.

use thiserror::Error;

/// Result type alias for RAXE operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for RAXE operations
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration value; fatal at construction
    #[error("Configuration error in '{field}': {reason}")]
    Config { field: String, reason: String },

    /// A rule document failed to load; the rule is excluded
    #[error("Failed to load rule '{rule_id}' from pack '{pack}': {reason}")]
    RuleLoad {
        pack: String,
        rule_id: String,
        reason: String,
    },

    /// A rule pattern failed to compile; the rule is disabled
    #[error("Pattern in rule '{rule_id}' failed to compile: {reason}")]
    PatternCompile { rule_id: String, reason: String },

    /// A pattern exceeded its match budget; the rule is skipped this scan
    #[error("Pattern in rule '{rule_id}' exceeded its match budget")]
    PatternTimeout { rule_id: String },

    /// A model package failed to load; fatal at initialization
    #[error("Failed to load model '{model_id}': {reason}")]
    ModelLoad { model_id: String, reason: String },

    /// Inference failed mid-call; that L2 call returns empty
    #[error("Inference failed at stage '{stage}': {reason}")]
    ModelInference { stage: String, reason: String },

    /// A plugin call failed; the plugin is skipped
    #[error("Plugin '{plugin}' failed: {reason}")]
    Plugin { plugin: String, reason: String },

    /// Suppression file persistence failed; in-memory state still applies
    #[error("Failed to persist suppressions: {reason}")]
    SuppressionPersist { reason: String },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Operation exceeded its deadline
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// Internal errors (should not happen in production)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a configuration error
    pub fn config<F: Into<String>, R: Into<String>>(field: F, reason: R) -> Self {
        Self::Config {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a rule load error
    pub fn rule_load<P: Into<String>, I: Into<String>, R: Into<String>>(
        pack: P,
        rule_id: I,
        reason: R,
    ) -> Self {
        Self::RuleLoad {
            pack: pack.into(),
            rule_id: rule_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a pattern compile error
    pub fn pattern_compile<I: Into<String>, R: Into<String>>(rule_id: I, reason: R) -> Self {
        Self::PatternCompile {
            rule_id: rule_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a pattern timeout error
    pub fn pattern_timeout<I: Into<String>>(rule_id: I) -> Self {
        Self::PatternTimeout {
            rule_id: rule_id.into(),
        }
    }

    /// Create a model load error
    pub fn model_load<I: Into<String>, R: Into<String>>(model_id: I, reason: R) -> Self {
        Self::ModelLoad {
            model_id: model_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a model inference error
    pub fn model_inference<S: Into<String>, R: Into<String>>(stage: S, reason: R) -> Self {
        Self::ModelInference {
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    /// Create a plugin error
    pub fn plugin<P: Into<String>, R: Into<String>>(plugin: P, reason: R) -> Self {
        Self::Plugin {
            plugin: plugin.into(),
            reason: reason.into(),
        }
    }

    /// Create a suppression persistence error
    pub fn suppression_persist<R: Into<String>>(reason: R) -> Self {
        Self::SuppressionPersist {
            reason: reason.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout(duration_ms)
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Whether this error is fatal at construction time
    ///
    /// Fatal errors propagate to the caller; everything else is captured
    /// into per-scan result metadata.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config { .. } | Error::ModelLoad { .. })
    }

    /// Get error category for metrics
    pub fn category(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config",
            Error::RuleLoad { .. } => "rule_load",
            Error::PatternCompile { .. } => "pattern_compile",
            Error::PatternTimeout { .. } => "pattern_timeout",
            Error::ModelLoad { .. } => "model_load",
            Error::ModelInference { .. } => "model_inference",
            Error::Plugin { .. } => "plugin",
            Error::SuppressionPersist { .. } => "suppression_persist",
            Error::Io(_) => "io",
            Error::Serialization(_) => "serialization",
            Error::Timeout(_) => "timeout",
            Error::Internal(_) => "internal",
        }
    }
}
