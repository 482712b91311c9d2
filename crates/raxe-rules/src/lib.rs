//! # RAXE Rules
//!
//! The L1 layer: rule packs, pattern compilation, and budgeted regex
//! execution. Rules load from precedence-ranked pack roots (with a
//! compiled-in bundled pack underneath), patterns compile once into a
//! shared cache, and the executor evaluates a rule set against text to
//! produce an L1 `ScanResult`.

pub mod builtin;
pub mod cache;
pub mod executor;
pub mod matcher;
pub mod pack;
pub mod registry;

pub use builtin::{BUNDLED_PACK_NAME, BUNDLED_RULES};
pub use cache::{CompiledPatternCache, PatternCacheStats};
pub use executor::{observed_confidence, sort_detections, RuleExecutor};
pub use matcher::{CompiledPattern, MatchOutcome};
pub use pack::{load_rule_file, PackManifest, RulePack};
pub use registry::{PackRegistry, PackRoot, RANK_BUNDLED, RANK_COMMUNITY, RANK_CUSTOM};
