//! Model registry
//!
//! Discovers model packages by scanning a models root for manifest files,
//! validates each package, and instantiates detectors on demand. The
//! registry is immutable after discovery; descriptors are cheap to list
//! and the best-model choice is a pure function of the manifests'
//! performance claims.

use crate::detector::{CascadeDetector, DetectorConfig};
use crate::manifest::{ModelManifest, ModelStatus, PerformanceClaims, MANIFEST_FILE};
use raxe_core::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What to optimize when picking a model automatically
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionCriterion {
    /// Lowest claimed latency
    Latency,
    /// Highest claimed accuracy
    Accuracy,
    /// Accuracy discounted by latency
    Balanced,
}

/// A discovered, validated model package
#[derive(Debug, Clone)]
pub struct ModelDescriptor {
    /// Unique model id
    pub model_id: String,

    /// Lifecycle status
    pub status: ModelStatus,

    /// Package directory
    pub dir: PathBuf,

    /// Performance claims from the manifest
    pub performance: PerformanceClaims,

    /// Embedding dimensionality
    pub embedding_dim: usize,
}

/// Registry of model packages under a models root
pub struct ModelRegistry {
    models: HashMap<String, (ModelDescriptor, ModelManifest)>,
}

impl ModelRegistry {
    /// Discover packages under `models_root`
    ///
    /// A missing root yields an empty registry; packages failing
    /// validation are logged and excluded.
    pub fn discover(models_root: &Path) -> Result<Self> {
        let mut models = HashMap::new();

        if !models_root.is_dir() {
            tracing::warn!(root = %models_root.display(), "models root does not exist");
            return Ok(Self { models });
        }

        for entry in std::fs::read_dir(models_root)? {
            let entry = entry?;
            let dir = entry.path();
            if !dir.is_dir() || !dir.join(MANIFEST_FILE).is_file() {
                continue;
            }

            match ModelManifest::load(&dir) {
                Ok(manifest) => {
                    let descriptor = ModelDescriptor {
                        model_id: manifest.model_id.clone(),
                        status: manifest.status,
                        dir: dir.clone(),
                        performance: manifest.performance,
                        embedding_dim: manifest.embedding.dim,
                    };
                    tracing::info!(
                        model_id = %descriptor.model_id,
                        status = ?descriptor.status,
                        "model package discovered"
                    );
                    models.insert(manifest.model_id.clone(), (descriptor, manifest));
                }
                Err(err) => {
                    tracing::warn!(dir = %dir.display(), error = %err, "model package excluded");
                }
            }
        }

        tracing::info!(count = models.len(), "model registry ready");
        Ok(Self { models })
    }

    /// All validated model descriptors, sorted by id
    pub fn list_models(&self) -> Vec<ModelDescriptor> {
        let mut list: Vec<ModelDescriptor> =
            self.models.values().map(|(d, _)| d.clone()).collect();
        list.sort_by(|a, b| a.model_id.cmp(&b.model_id));
        list
    }

    /// Number of validated packages
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether discovery found nothing usable
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Pick the best model for a criterion
    ///
    /// Deprecated models are never chosen; experimental models are
    /// considered only when no active model exists.
    pub fn get_best_model(&self, criterion: SelectionCriterion) -> Result<String> {
        let candidates: Vec<&ModelDescriptor> = {
            let active: Vec<&ModelDescriptor> = self
                .models
                .values()
                .map(|(d, _)| d)
                .filter(|d| d.status == ModelStatus::Active)
                .collect();
            if active.is_empty() {
                self.models
                    .values()
                    .map(|(d, _)| d)
                    .filter(|d| d.status == ModelStatus::Experimental)
                    .collect()
            } else {
                active
            }
        };

        candidates
            .into_iter()
            .max_by(|a, b| {
                score(a, criterion)
                    .total_cmp(&score(b, criterion))
                    .then_with(|| b.model_id.cmp(&a.model_id))
            })
            .map(|d| d.model_id.clone())
            .ok_or_else(|| Error::model_load("<registry>", "no usable model packages found"))
    }

    /// Instantiate a detector, eagerly loading all artifacts
    pub fn create_detector(
        &self,
        model_id: &str,
        config: DetectorConfig,
    ) -> Result<Arc<CascadeDetector>> {
        let (descriptor, manifest) = self.models.get(model_id).ok_or_else(|| {
            Error::model_load(model_id, "model not found in registry")
        })?;
        let detector = CascadeDetector::load(&descriptor.dir, manifest, config)?;
        Ok(Arc::new(detector))
    }
}

fn score(descriptor: &ModelDescriptor, criterion: SelectionCriterion) -> f64 {
    let perf = descriptor.performance;
    match criterion {
        SelectionCriterion::Latency => -perf.latency_ms,
        SelectionCriterion::Accuracy => perf.accuracy,
        SelectionCriterion::Balanced => perf.accuracy - perf.latency_ms / 1_000.0,
    }
}
