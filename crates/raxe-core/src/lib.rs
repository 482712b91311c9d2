//! # RAXE Core
//!
//! Domain types and traits for the RAXE threat detection engine: the
//! rule/detection value objects, scan results, policy types, configuration
//! surface, error enum, and the `L2Detector` / `RuleRepository` seams the
//! engine is built against.
//!
//! This crate is dependency-light and pure: no regex compilation, no model
//! I/O, no orchestration. Those live in `raxe-rules`, `raxe-models`, and
//! `raxe-engine` respectively.

pub mod config;
pub mod detection;
pub mod detector;
pub mod error;
pub mod fingerprint;
pub mod policy;
pub mod result;
pub mod rule;
pub mod severity;
pub mod telemetry;

pub use config::{EngineConfig, EngineConfigOverrides, ScanMode, ENV_PREFIX};
pub use detection::{Detection, DetectionLayer, Match};
pub use detector::{DetectorInitStats, L2Detector, RuleRepository, ScanContext};
pub use error::{Error, Result};
pub use fingerprint::{fingerprint, short_fingerprint};
pub use policy::{PolicyAction, PolicyBlockSignal, PolicyRule, ScanPipelineResult, ScanPolicy};
pub use result::{CombinedScanResult, HeadVote, L2Prediction, L2Result, ScanResult, VotingTrace};
pub use rule::{Pattern, PatternFlags, PatternKey, Rule, DEFAULT_PATTERN_TIMEOUT_MS};
pub use severity::{RuleFamily, Severity};
pub use telemetry::{
    HistorySink, NoopSink, ScanHistoryRecord, ScanTelemetryEvent, TelemetrySink,
};

/// Re-export for trait implementors
pub use async_trait::async_trait;
