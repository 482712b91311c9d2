//! Domain traits at the layer seams
//!
//! The pipeline consumes these traits rather than concrete model or
//! registry types, which keeps the dependency graph acyclic (the model
//! crate implements `L2Detector` without ever importing the engine) and
//! makes every seam mockable in tests.

use crate::result::{L2Result, ScanResult};
use crate::rule::Rule;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Freeform per-scan context handed to detectors and plugins
pub type ScanContext = HashMap<String, serde_json::Value>;

/// Statistics reported by an eager detector after initialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorInitStats {
    /// Time spent loading artifacts into memory
    pub init_time_ms: u64,

    /// Model type identifier, e.g. `cascade-classifier`
    pub model_type: String,

    /// Embedding dimensionality
    pub embedding_dim: usize,
}

/// ML-based detection layer
///
/// Implementations load all artifacts eagerly at construction; `analyze`
/// performs inference only, never model I/O. Any internal failure degrades
/// to an empty [`L2Result`] with an error annotation instead of an `Err`.
#[async_trait]
pub trait L2Detector: Send + Sync {
    /// Id of the model backing this detector
    fn model_id(&self) -> &str;

    /// Analyze text, optionally informed by the L1 result and context
    async fn analyze(
        &self,
        text: &str,
        l1_result: Option<&ScanResult>,
        context: Option<&ScanContext>,
    ) -> L2Result;

    /// Initialization cost and shape, for preload accounting
    fn initialization_stats(&self) -> DetectorInitStats;

    /// Release model sessions; called once on pipeline teardown
    async fn shutdown(&self) {}
}

/// Read-only source of the effective rule set
///
/// Implementations pre-materialize the list so repeated reads are cheap
/// and stable for the repository's lifetime.
pub trait RuleRepository: Send + Sync {
    /// The deduplicated, precedence-resolved rule list
    fn all_rules(&self) -> Vec<Arc<Rule>>;

    /// Number of effective rules
    fn rule_count(&self) -> usize {
        self.all_rules().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::L2Result;

    struct StubDetector;

    #[async_trait]
    impl L2Detector for StubDetector {
        fn model_id(&self) -> &str {
            "stub"
        }

        async fn analyze(
            &self,
            _text: &str,
            _l1_result: Option<&ScanResult>,
            _context: Option<&ScanContext>,
        ) -> L2Result {
            L2Result::empty("stub")
        }

        fn initialization_stats(&self) -> DetectorInitStats {
            DetectorInitStats {
                init_time_ms: 0,
                model_type: "stub".to_string(),
                embedding_dim: 0,
            }
        }
    }

    #[tokio::test]
    async fn test_detector_trait_is_object_safe() {
        let detector: Arc<dyn L2Detector> = Arc::new(StubDetector);
        let result = detector.analyze("hello", None, None).await;
        assert!(!result.has_predictions());
        assert_eq!(detector.model_id(), "stub");
        detector.shutdown().await;
    }
}
