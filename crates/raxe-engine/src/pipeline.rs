//! Scan pipeline
//!
//! Drives a single scan end-to-end: input transforms, L1 and L2 launched
//! in parallel (with detector plugins in thorough mode), fail-fast
//! cancellation on an L1 critical hit, merge, suppressions, output
//! transforms, policy evaluation with L2-aware blocking, action plugins,
//! and telemetry. Per-scan failures land in the result's `errors`
//! metadata; the pipeline itself never throws past initialization.
//!
//! One pipeline instance serves concurrent callers; all shared state
//! (rules, compiled patterns, model weights) is read-only after preload.

use crate::glob::any_glob_match;
use crate::merger::{merge, recompute_threat_flag};
use crate::plugin::{Plugin, PluginManager};
use crate::policy::PolicyEvaluator;
use crate::suppression::SuppressionManager;
use chrono::Utc;
use raxe_core::{
    fingerprint, EngineConfig, L2Detector, L2Result, PolicyBlockSignal, Rule, ScanContext,
    ScanMode, ScanPipelineResult, ScanPolicy, ScanResult, ScanTelemetryEvent, TelemetrySink,
};
use raxe_core::{DetectionLayer, NoopSink};
use raxe_rules::{CompiledPatternCache, PackRegistry, RuleExecutor};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-scan options; unset fields fall back to the pipeline config
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Mode override
    pub mode: Option<ScanMode>,

    /// Disable the rule layer for this scan
    pub l1_disabled: bool,

    /// Disable the ML layer for this scan
    pub l2_disabled: bool,

    /// Confidence-threshold override
    pub confidence_threshold: Option<f64>,

    /// Only evaluate rules whose id matches one of these globs
    pub rule_filter: Option<Vec<String>>,

    /// Freeform context passed to detectors and plugins
    pub context: Option<ScanContext>,

    /// Propagate a `PolicyBlockSignal` from [`ScanPipeline::scan_enforced`]
    pub block_on_threat: bool,
}

impl ScanOptions {
    /// Options for one mode
    pub fn with_mode(mode: ScanMode) -> Self {
        Self {
            mode: Some(mode),
            ..Self::default()
        }
    }
}

/// The top-level scan orchestrator
pub struct ScanPipeline {
    config: EngineConfig,
    rules: Arc<Vec<Arc<Rule>>>,
    pattern_cache: Arc<CompiledPatternCache>,
    detector: Option<Arc<dyn L2Detector>>,
    policy: PolicyEvaluator,
    suppressions: Arc<SuppressionManager>,
    plugins: Arc<tokio::sync::RwLock<PluginManager>>,
    telemetry: Arc<dyn TelemetrySink>,
    model_type: Option<String>,
}

impl ScanPipeline {
    /// Start building a pipeline
    pub fn builder() -> ScanPipelineBuilder {
        ScanPipelineBuilder::new()
    }

    /// Scan text, always returning a result
    pub async fn scan(&self, text: &str, options: &ScanOptions) -> ScanPipelineResult {
        let started = Instant::now();
        let mode = options.mode.unwrap_or(self.config.mode);
        let confidence_threshold = options
            .confidence_threshold
            .unwrap_or(self.config.confidence_threshold);

        let l1_enabled = !options.l1_disabled;
        let l2_enabled = !options.l2_disabled
            && self.config.l2_enabled
            && self.detector.is_some()
            && mode != ScanMode::Fast;
        let detector_plugins_enabled = mode == ScanMode::Thorough;

        let mut errors: Vec<(String, String)> = Vec::new();

        // Input transforms
        let plugins = self.plugins.read().await;
        let (scan_text, transform_errors) = plugins
            .transform_input(text.to_string(), options.context.as_ref())
            .await;
        errors.extend(transform_errors);

        // Launch L1, L2, and detector plugins in parallel
        let l1_handle = l1_enabled.then(|| {
            let rules = self.effective_rules(options.rule_filter.as_deref());
            let cache = Arc::clone(&self.pattern_cache);
            let text = scan_text.clone();
            tokio::task::spawn_blocking(move || {
                RuleExecutor::new(cache).execute(&text, &rules)
            })
        });

        let l2_handle = (l2_enabled && !scan_text.is_empty()).then(|| {
            let detector = Arc::clone(self.detector.as_ref().expect("l2_enabled checked"));
            let text = scan_text.clone();
            let context = options.context.clone();
            tokio::spawn(async move { detector.analyze(&text, None, context.as_ref()).await })
        });

        let plugin_handle = detector_plugins_enabled.then(|| {
            let plugins = Arc::clone(&self.plugins);
            let text = scan_text.clone();
            let context = options.context.clone();
            tokio::spawn(async move {
                plugins
                    .read()
                    .await
                    .run_detectors(&text, context.as_ref())
                    .await
            })
        });

        // L1 lands first
        let l1 = match l1_handle {
            Some(handle) => match handle.await {
                Ok(result) => result,
                Err(join_err) => {
                    errors.push(("l1".to_string(), join_err.to_string()));
                    ScanResult::empty(scan_text.len())
                }
            },
            None => ScanResult::empty(scan_text.len()),
        };
        let l1_duration_ms = l1.duration_ms;
        for rule_id in &l1.failed_rules {
            errors.push((format!("rule:{}", rule_id), "compile or timeout".to_string()));
        }

        // Fail-fast: a confident critical L1 hit cancels pending work
        let fail_fast = self.config.fail_fast_on_critical
            && l1.detections.iter().any(|d| {
                d.severity == raxe_core::Severity::Critical && d.confidence >= confidence_threshold
            });

        let l2: Option<L2Result> = match (l2_handle, fail_fast) {
            (Some(handle), true) => {
                handle.abort();
                tracing::debug!("l2 cancelled by l1 critical fail-fast");
                None
            }
            (Some(handle), false) => match handle.await {
                Ok(result) => {
                    if let Some(error) = &result.error {
                        errors.push(("l2".to_string(), error.clone()));
                    }
                    Some(result)
                }
                Err(join_err) => {
                    if !join_err.is_cancelled() {
                        errors.push(("l2".to_string(), join_err.to_string()));
                    }
                    None
                }
            },
            (None, _) => None,
        };
        let l2_duration_ms = l2.as_ref().map(|r| r.duration_ms);

        let plugin_detections = match (plugin_handle, fail_fast) {
            (Some(handle), true) => {
                handle.abort();
                Vec::new()
            }
            (Some(handle), false) => match handle.await {
                Ok((detections, plugin_errors)) => {
                    for (plugin, error) in plugin_errors {
                        errors.push((format!("plugin:{}", plugin), error));
                    }
                    detections
                }
                Err(join_err) => {
                    if !join_err.is_cancelled() {
                        errors.push(("plugins".to_string(), join_err.to_string()));
                    }
                    Vec::new()
                }
            },
            (None, _) => Vec::new(),
        };

        // Merge, suppress, transform out
        let mut combined = merge(l1, l2, plugin_detections, confidence_threshold);

        let (kept, suppressed) = self.suppressions.apply(std::mem::take(&mut combined.detections));
        let suppressed_count = suppressed.len();
        combined.detections = kept;
        recompute_threat_flag(&mut combined, confidence_threshold);

        let (combined, output_errors) = plugins.transform_output(combined).await;
        errors.extend(output_errors);
        drop(plugins);

        // Policy, with L2-aware blocking
        let decision = self.policy.evaluate(&combined);

        let mut result = ScanPipelineResult {
            combined,
            action: decision.action,
            should_block: decision.should_block,
            duration_ms: started.elapsed().as_millis() as u64,
            l1_duration_ms,
            l2_duration_ms,
            text_fingerprint: fingerprint(text),
            metadata: HashMap::new(),
        };
        result
            .metadata
            .insert("mode".to_string(), serde_json::json!(mode));
        if suppressed_count > 0 {
            result.metadata.insert(
                "suppressed_count".to_string(),
                serde_json::json!(suppressed_count),
            );
        }
        for (key, message) in errors {
            result.record_error(key, message);
        }

        // Post-decision side effects
        let action_errors = self.plugins.read().await.run_actions(&result).await;
        for (plugin, error) in action_errors {
            result.record_error(format!("action:{}", plugin), error);
        }

        if self.config.telemetry_enabled {
            self.telemetry.emit(self.telemetry_event(&result)).await;
        }

        result
    }

    /// Scan and propagate a block signal when the caller opted in
    pub async fn scan_enforced(
        &self,
        text: &str,
        options: &ScanOptions,
    ) -> Result<ScanPipelineResult, PolicyBlockSignal> {
        let result = self.scan(text, options).await;
        if options.block_on_threat && result.should_block {
            return Err(PolicyBlockSignal { result });
        }
        Ok(result)
    }

    /// The suppression manager, for administration
    pub fn suppressions(&self) -> &SuppressionManager {
        &self.suppressions
    }

    /// Number of effective rules
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Model type identifier when L2 is attached
    pub fn model_type(&self) -> Option<&str> {
        self.model_type.as_deref()
    }

    /// Release resources in reverse-initialization order: plugins first,
    /// then the model sessions (compiled patterns fall with the pipeline)
    pub async fn shutdown(&self) {
        self.plugins.write().await.shutdown_all().await;
        if let Some(detector) = &self.detector {
            detector.shutdown().await;
        }
        tracing::info!("pipeline shut down");
    }

    fn effective_rules(&self, filter: Option<&[String]>) -> Vec<Arc<Rule>> {
        match filter {
            None => self.rules.as_ref().clone(),
            Some(globs) => self
                .rules
                .iter()
                .filter(|r| any_glob_match(globs.iter().map(|g| g.as_str()), &r.id))
                .cloned()
                .collect(),
        }
    }

    fn telemetry_event(&self, result: &ScanPipelineResult) -> ScanTelemetryEvent {
        let detections = &result.combined.detections;
        ScanTelemetryEvent {
            timestamp: Utc::now(),
            prompt_hash: result.text_fingerprint.clone(),
            l1_hit: detections.iter().any(|d| d.layer == DetectionLayer::L1),
            l2_hit: detections.iter().any(|d| d.layer == DetectionLayer::L2),
            detection_count: detections.len(),
            highest_severity: result.combined.severity,
            scan_duration_ms: result.duration_ms,
            l1_duration_ms: result.l1_duration_ms,
            l2_duration_ms: result.l2_duration_ms,
            model_type: self.model_type.clone(),
            rule_ids_fired: detections.iter().map(|d| d.rule_id.clone()).collect(),
        }
    }
}

/// Builder for [`ScanPipeline`]
///
/// Collaborators default sensibly: bundled rules, no detector, standard
/// policy, empty suppressions, no plugins, no-op telemetry.
pub struct ScanPipelineBuilder {
    config: EngineConfig,
    registry: Option<Arc<PackRegistry>>,
    detector: Option<Arc<dyn L2Detector>>,
    policy: Option<ScanPolicy>,
    suppressions: Option<Arc<SuppressionManager>>,
    plugins: Vec<Arc<dyn Plugin>>,
    plugin_configs: HashMap<String, HashMap<String, serde_json::Value>>,
    telemetry: Option<Arc<dyn TelemetrySink>>,
}

impl ScanPipelineBuilder {
    /// Builder with defaults
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            registry: None,
            detector: None,
            policy: None,
            suppressions: None,
            plugins: Vec::new(),
            plugin_configs: HashMap::new(),
            telemetry: None,
        }
    }

    /// Use this configuration
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Use an already-loaded rule registry
    pub fn with_registry(mut self, registry: Arc<PackRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Attach an L2 detector
    pub fn with_detector(mut self, detector: Arc<dyn L2Detector>) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Use this policy instead of the standard one
    pub fn with_policy(mut self, policy: ScanPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Use this suppression manager
    pub fn with_suppressions(mut self, suppressions: Arc<SuppressionManager>) -> Self {
        self.suppressions = Some(suppressions);
        self
    }

    /// Register a plugin, optionally with a config map
    pub fn with_plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Config map for a plugin by name
    pub fn with_plugin_config(
        mut self,
        name: &str,
        config: HashMap<String, serde_json::Value>,
    ) -> Self {
        self.plugin_configs.insert(name.to_string(), config);
        self
    }

    /// Inject a telemetry sink
    pub fn with_telemetry(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = Some(sink);
        self
    }

    /// Assemble the pipeline
    ///
    /// Loads the rule registry if none was supplied, builds the policy
    /// evaluator, loads suppressions from the configured file, and
    /// initializes plugins. Pattern compilation is left to the preloader
    /// (or first use).
    pub async fn build(self) -> raxe_core::Result<ScanPipeline> {
        self.config.validate()?;

        let registry = match self.registry {
            Some(registry) => registry,
            None => Arc::new(PackRegistry::from_packs_root(
                self.config.packs_root.as_deref(),
            )?),
        };

        let mut policy = self.policy.unwrap_or_else(ScanPolicy::standard);
        policy.block_on_critical = self.config.block_on_critical;
        policy.block_on_high = self.config.block_on_high;
        policy.confidence_threshold = self.config.confidence_threshold;

        let suppressions = match self.suppressions {
            Some(suppressions) => suppressions,
            None => match &self.config.suppression_file {
                Some(path) => Arc::new(SuppressionManager::load_file(path)?),
                None => Arc::new(SuppressionManager::new()),
            },
        };

        let mut plugin_manager =
            PluginManager::new(Duration::from_millis(self.config.plugin_timeout_ms));
        for plugin in self.plugins {
            plugin_manager.register(plugin);
        }
        plugin_manager.initialize_all(&self.plugin_configs).await;

        let model_type = self
            .detector
            .as_ref()
            .map(|d| d.initialization_stats().model_type);

        Ok(ScanPipeline {
            rules: Arc::new(registry.get_all_rules()),
            pattern_cache: registry.pattern_cache(),
            detector: self.detector,
            policy: PolicyEvaluator::new(policy),
            suppressions,
            plugins: Arc::new(tokio::sync::RwLock::new(plugin_manager)),
            telemetry: self.telemetry.unwrap_or_else(|| Arc::new(NoopSink)),
            model_type,
            config: self.config,
        })
    }
}

impl Default for ScanPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
