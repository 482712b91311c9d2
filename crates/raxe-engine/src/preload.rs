//! Preloader
//!
//! One-time initialization that front-loads every expensive step: rule
//! packs load, patterns compile, and the L2 model warms. After `preload`
//! returns, no scan pays model-loading or compile cost; the first scan
//! costs the same as every later one.

use crate::pipeline::{ScanPipeline, ScanPipelineBuilder};
use raxe_core::{EngineConfig, L2Detector, Result};
use raxe_models::{DetectorConfig, ModelRegistry, SelectionCriterion};
use raxe_rules::PackRegistry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Timing and inventory of a preload pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreloadStats {
    /// End-to-end initialization time
    pub total_init_ms: u64,

    /// Rule-pack loading time
    pub rules_load_ms: u64,

    /// Pattern compilation time
    pub patterns_compile_ms: u64,

    /// L2 model loading time, when L2 initialized
    pub l2_init_ms: u64,

    /// Model type identifier, when L2 initialized
    pub l2_model_type: Option<String>,

    /// Effective rule count
    pub rules_loaded: usize,

    /// Packs that contributed rules
    pub packs_loaded: usize,
}

/// One-time pipeline initialization
pub struct Preloader;

impl Preloader {
    /// Build a ready pipeline: packs loaded, patterns compiled, L2 warm
    pub async fn preload(config: EngineConfig) -> Result<(ScanPipeline, PreloadStats)> {
        Self::preload_with(config, None).await
    }

    /// Preload with an injected detector (used by tests and embedders
    /// supplying their own L2 implementation)
    pub async fn preload_with(
        config: EngineConfig,
        detector: Option<Arc<dyn L2Detector>>,
    ) -> Result<(ScanPipeline, PreloadStats)> {
        config.validate()?;
        let total_started = Instant::now();
        let mut stats = PreloadStats::default();

        // Rule packs
        let rules_started = Instant::now();
        let registry = Arc::new(PackRegistry::from_packs_root(config.packs_root.as_deref())?);
        stats.rules_load_ms = rules_started.elapsed().as_millis() as u64;
        stats.rules_loaded = registry.len();
        stats.packs_loaded = registry.packs_loaded();

        // Pattern compilation
        let compile_started = Instant::now();
        let (cache_stats, disabled) = registry.precompile_patterns();
        stats.patterns_compile_ms = compile_started.elapsed().as_millis() as u64;
        tracing::info!(
            compiled = cache_stats.compiled,
            failed = cache_stats.failed,
            disabled_rules = disabled.len(),
            "patterns precompiled"
        );

        // L2 warm-up
        let detector = match detector {
            Some(injected) => {
                let init = injected.initialization_stats();
                stats.l2_init_ms = init.init_time_ms;
                stats.l2_model_type = Some(init.model_type);
                Some(injected)
            }
            None if config.l2_enabled => {
                let l2_started = Instant::now();
                match Self::load_detector(&config)? {
                    Some(loaded) => {
                        stats.l2_init_ms = l2_started.elapsed().as_millis() as u64;
                        stats.l2_model_type =
                            Some(loaded.initialization_stats().model_type);
                        Some(loaded)
                    }
                    None => None,
                }
            }
            None => None,
        };

        let mut builder = ScanPipelineBuilder::new()
            .with_config(config)
            .with_registry(registry);
        if let Some(detector) = detector {
            builder = builder.with_detector(detector);
        }
        let pipeline = builder.build().await?;

        stats.total_init_ms = total_started.elapsed().as_millis() as u64;
        tracing::info!(
            total_ms = stats.total_init_ms,
            rules = stats.rules_loaded,
            l2 = stats.l2_model_type.as_deref().unwrap_or("disabled"),
            "preload complete"
        );
        Ok((pipeline, stats))
    }

    /// Discover and eagerly load the configured (or best) model
    ///
    /// A missing models root degrades to L1-only rather than failing:
    /// the engine is useful without a model package installed.
    fn load_detector(config: &EngineConfig) -> Result<Option<Arc<dyn L2Detector>>> {
        let models_root = config.resolved_models_root();
        let registry = ModelRegistry::discover(&models_root)?;
        if registry.is_empty() {
            tracing::warn!(
                root = %models_root.display(),
                "no model packages found; running L1-only"
            );
            return Ok(None);
        }

        let model_id = match &config.l2_model_id {
            Some(explicit) => explicit.clone(),
            None => registry.get_best_model(SelectionCriterion::Balanced)?,
        };

        let detector_config = DetectorConfig {
            timeout_ms: config.l2_timeout_ms,
            min_confidence: config.l2_confidence_threshold,
            cache_capacity: config.embedding_cache_size,
            ..DetectorConfig::default()
        };
        let detector: Arc<dyn L2Detector> = registry.create_detector(&model_id, detector_config)?;
        Ok(Some(detector))
    }
}
