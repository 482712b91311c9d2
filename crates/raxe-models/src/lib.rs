//! # RAXE Models
//!
//! The L2 layer: manifest-driven model discovery, an eagerly loaded
//! cascade detector (tokenizer + embedding model + classifier heads), a
//! bounded embedding cache, and the weighted voting engine that fuses
//! multi-head outputs into one decision.
//!
//! This crate implements the `L2Detector` trait from `raxe-core`; it
//! never depends on the scan pipeline.

pub mod cache;
pub mod detector;
pub mod embedding;
pub mod heads;
pub mod labels;
pub mod manifest;
pub mod registry;
pub mod tokenizer;
pub mod voting;

pub use cache::{CacheKey, EmbeddingCache, EmbeddingCacheStats, DEFAULT_CACHE_CAPACITY};
pub use detector::{map_family_label, CascadeDetector, DetectorConfig, CASCADE_MODEL_TYPE};
pub use embedding::EmbeddingModel;
pub use heads::{ClassifierHead, HeadPrediction};
pub use labels::LabelEncoders;
pub use manifest::{
    ClassifierSpec, EmbeddingSpec, ModelManifest, ModelStatus, PerformanceClaims, TokenizerSpec,
    MANIFEST_FILE,
};
pub use registry::{ModelDescriptor, ModelRegistry, SelectionCriterion};
pub use tokenizer::{EncodedInput, TokenizerWrapper};
pub use voting::{VoteDecision, VotingConfig, VotingEngine, VotingOutcome};
