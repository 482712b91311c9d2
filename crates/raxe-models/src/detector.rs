//! Cascade detector
//!
//! The L2 implementation: tokenizer, embedding model, and classifier
//! heads loaded eagerly at construction, then a cascade per analyze call:
//! binary (early exit on safe) -> family -> subfamily -> optional heads ->
//! voting. Inference runs on a blocking worker under the per-call
//! deadline; any failure degrades to an empty result with an error
//! annotation rather than propagating.

use crate::cache::{CacheKey, EmbeddingCache, DEFAULT_CACHE_CAPACITY};
use crate::embedding::EmbeddingModel;
use crate::heads::{ClassifierHead, HeadPrediction};
use crate::labels::LabelEncoders;
use crate::manifest::ModelManifest;
use crate::tokenizer::TokenizerWrapper;
use crate::voting::{VoteDecision, VotingConfig, VotingEngine};
use raxe_core::{
    async_trait, DetectorInitStats, L2Detector, L2Prediction, L2Result, Result, RuleFamily,
    ScanContext, ScanResult,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Model type reported in initialization stats and telemetry
pub const CASCADE_MODEL_TYPE: &str = "cascade-classifier";

/// Detector construction parameters
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Per-call inference deadline in milliseconds
    pub timeout_ms: u64,

    /// Minimum confidence to report a prediction
    pub min_confidence: f64,

    /// Embedding cache capacity
    pub cache_capacity: usize,

    /// Voting parameters
    pub voting: VotingConfig,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 150,
            min_confidence: 0.7,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            voting: VotingConfig::default(),
        }
    }
}

#[derive(Debug)]
struct DetectorInner {
    model_id: String,
    tokenizer: TokenizerWrapper,
    embedding: EmbeddingModel,
    binary: ClassifierHead,
    family: ClassifierHead,
    subfamily: ClassifierHead,
    optional_heads: Vec<ClassifierHead>,
    encoders: LabelEncoders,
    cache: EmbeddingCache,
    voting: VotingEngine,
    min_confidence: f64,
}

/// Eagerly loaded cascade detector
#[derive(Debug)]
pub struct CascadeDetector {
    inner: Arc<DetectorInner>,
    timeout: Duration,
    init_stats: DetectorInitStats,
}

impl CascadeDetector {
    /// Load every artifact named by the manifest into memory
    ///
    /// This is the expensive initialization step; `analyze` never touches
    /// disk afterwards.
    pub fn load(dir: &Path, manifest: &ModelManifest, config: DetectorConfig) -> Result<Self> {
        let started = Instant::now();
        let model_id = manifest.model_id.clone();

        let tokenizer = TokenizerWrapper::load(
            &dir.join(&manifest.tokenizer.file),
            manifest.tokenizer.max_length,
            &model_id,
        )?;
        let embedding = EmbeddingModel::load(
            &dir.join(&manifest.embedding.model),
            manifest.embedding.dim,
            &model_id,
        )?;
        let binary = ClassifierHead::load("binary", &dir.join(&manifest.classifiers.binary), &model_id)?;
        let family = ClassifierHead::load("family", &dir.join(&manifest.classifiers.family), &model_id)?;
        let subfamily = ClassifierHead::load(
            "subfamily",
            &dir.join(&manifest.classifiers.subfamily),
            &model_id,
        )?;

        let mut optional_heads = Vec::new();
        for (name, path) in [
            ("severity", &manifest.classifiers.severity),
            ("technique", &manifest.classifiers.technique),
            ("harm", &manifest.classifiers.harm),
        ] {
            if let Some(path) = path {
                optional_heads.push(ClassifierHead::load(name, &dir.join(path), &model_id)?);
            }
        }

        let encoders = LabelEncoders::load(&dir.join(&manifest.label_encoders), &model_id)?;

        let init_stats = DetectorInitStats {
            init_time_ms: started.elapsed().as_millis() as u64,
            model_type: CASCADE_MODEL_TYPE.to_string(),
            embedding_dim: manifest.embedding.dim,
        };
        tracing::info!(
            model_id = %model_id,
            init_ms = init_stats.init_time_ms,
            optional_heads = optional_heads.len(),
            "cascade detector loaded"
        );

        Ok(Self {
            inner: Arc::new(DetectorInner {
                model_id,
                tokenizer,
                embedding,
                binary,
                family,
                subfamily,
                optional_heads,
                encoders,
                cache: EmbeddingCache::new(config.cache_capacity),
                voting: VotingEngine::with_config(config.voting),
                min_confidence: config.min_confidence,
            }),
            timeout: Duration::from_millis(config.timeout_ms),
            init_stats,
        })
    }

    /// Embedding-cache counters, for observability
    pub fn cache_stats(&self) -> crate::cache::EmbeddingCacheStats {
        self.inner.cache.stats()
    }
}

#[async_trait]
impl L2Detector for CascadeDetector {
    fn model_id(&self) -> &str {
        &self.inner.model_id
    }

    async fn analyze(
        &self,
        text: &str,
        _l1_result: Option<&ScanResult>,
        _context: Option<&ScanContext>,
    ) -> L2Result {
        if text.is_empty() {
            return L2Result::empty(&self.inner.model_id);
        }

        let inner = Arc::clone(&self.inner);
        let owned = text.to_string();
        let started = Instant::now();

        let task = tokio::task::spawn_blocking(move || inner.infer(&owned));
        let mut result = match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(Ok(result))) => result,
            Ok(Ok(Err(err))) => {
                tracing::warn!(model_id = %self.inner.model_id, error = %err, "inference degraded");
                L2Result::degraded(&self.inner.model_id, err.to_string())
            }
            Ok(Err(join_err)) => {
                tracing::error!(model_id = %self.inner.model_id, error = %join_err, "inference worker died");
                L2Result::degraded(&self.inner.model_id, "inference worker failed")
            }
            Err(_) => {
                tracing::warn!(
                    model_id = %self.inner.model_id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "inference deadline exceeded"
                );
                L2Result::degraded(&self.inner.model_id, "deadline exceeded")
            }
        };
        result.duration_ms = started.elapsed().as_millis() as u64;
        result
    }

    fn initialization_stats(&self) -> DetectorInitStats {
        self.init_stats.clone()
    }

    async fn shutdown(&self) {
        self.inner.cache.clear();
        tracing::debug!(model_id = %self.inner.model_id, "detector shut down");
    }
}

impl DetectorInner {
    fn infer(&self, text: &str) -> Result<L2Result> {
        let key = CacheKey::for_text(&self.model_id, text);
        let embedding = self.cache.get_or_compute(key, || {
            let encoded = self.tokenizer.encode(text)?;
            self.embedding.embed(&encoded)
        })?;

        let binary = self.binary.predict(&embedding, &self.encoders)?;
        if binary.label.eq_ignore_ascii_case("safe") {
            return Ok(L2Result::empty(&self.model_id));
        }

        let family = self.family.predict(&embedding, &self.encoders)?;
        let subfamily = self.subfamily.predict(&embedding, &self.encoders)?;

        // The subfamily head refines the label but carries no vote weight;
        // only the weighted heads enter the tally.
        let mut voting_predictions = vec![binary.clone(), family.clone()];
        for head in &self.optional_heads {
            voting_predictions.push(head.predict(&embedding, &self.encoders)?);
        }

        let mut result = L2Result::empty(&self.model_id);
        let confidence;

        if self.optional_heads.is_empty() {
            confidence = binary.confidence;
        } else {
            let outcome = self.voting.decide(&voting_predictions);
            result.voting = Some(outcome.trace);
            if outcome.decision == VoteDecision::Safe {
                return Ok(result);
            }
            confidence = outcome.confidence;
        }

        if confidence < self.min_confidence {
            tracing::debug!(
                model_id = %self.model_id,
                confidence,
                "prediction below reporting threshold"
            );
            return Ok(result);
        }

        let head_confidences: HashMap<String, f64> = voting_predictions
            .iter()
            .chain(std::iter::once(&subfamily))
            .map(|p| (p.head.clone(), p.confidence))
            .collect();

        result.predictions.push(L2Prediction {
            label: family.label.clone(),
            confidence,
            family: map_family_label(&family.label),
            subfamily: Some(subfamily.label),
            head_confidences,
        });
        Ok(result)
    }
}

/// Map a family-head label onto the rule taxonomy
pub fn map_family_label(label: &str) -> RuleFamily {
    match label.to_ascii_lowercase().as_str() {
        "prompt_injection" | "injection" => RuleFamily::Pi,
        "jailbreak" => RuleFamily::Jb,
        "data_extraction" | "pii" | "privacy" => RuleFamily::Pii,
        "command_injection" | "code_injection" => RuleFamily::Cmd,
        "encoding" | "obfuscation" => RuleFamily::Enc,
        "rag" | "retrieval" => RuleFamily::Rag,
        "harmful_content" | "harmful" => RuleFamily::Hc,
        "toxic" | "toxicity" => RuleFamily::Tox,
        _ => RuleFamily::Xx,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_label_mapping() {
        assert_eq!(map_family_label("prompt_injection"), RuleFamily::Pi);
        assert_eq!(map_family_label("Jailbreak"), RuleFamily::Jb);
        assert_eq!(map_family_label("harmful_content"), RuleFamily::Hc);
        assert_eq!(map_family_label("unheard_of"), RuleFamily::Xx);
    }

    #[test]
    fn test_detector_config_defaults() {
        let config = DetectorConfig::default();
        assert_eq!(config.timeout_ms, 150);
        assert!((config.min_confidence - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.cache_capacity, DEFAULT_CACHE_CAPACITY);
    }
}
