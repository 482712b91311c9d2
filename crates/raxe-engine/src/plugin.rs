//! Plugin manager
//!
//! Plugins extend the pipeline in three roles: detectors contribute
//! detections to the merge, transforms rewrite the input before scanning
//! and the result after, and actions run side effects post-decision. One
//! plugin instance may expose several capabilities.
//!
//! Every call crosses an isolation boundary: a per-plugin lock (the
//! manager does not assume plugin internals are thread-safe), a per-call
//! deadline, and an error boundary that logs, counts, and moves on to the
//! remaining plugins. Plugins shut down in reverse-initialization order.

use chrono::Utc;
use raxe_core::{
    async_trait, CombinedScanResult, Detection, Error, Result, ScanContext, ScanPipelineResult,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What a plugin can do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginCapability {
    /// Contributes detections to the merger
    Detector,
    /// Rewrites input before scanning and results after
    Transform,
    /// Runs side effects after the policy decision
    Action,
}

/// Identity and capability record carried by every plugin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginMetadata {
    /// Plugin name, unique within a manager
    pub name: String,

    /// Plugin version string
    pub version: String,

    /// Transforms chain in priority-descending order
    pub priority: i32,

    /// Capability set
    pub capabilities: Vec<PluginCapability>,
}

/// The plugin contract; default bodies make every role optional
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Identity and capabilities
    fn metadata(&self) -> PluginMetadata;

    /// One-time initialization with the plugin's config map
    async fn initialize(&self, _config: &HashMap<String, serde_json::Value>) -> Result<()> {
        Ok(())
    }

    /// Release resources; called in reverse-initialization order
    async fn shutdown(&self) {}

    /// Detector role: contribute detections
    async fn detect(
        &self,
        _text: &str,
        _context: Option<&ScanContext>,
    ) -> Result<Vec<Detection>> {
        Ok(Vec::new())
    }

    /// Transform role: rewrite input before scanning
    async fn transform_input(
        &self,
        text: String,
        _context: Option<&ScanContext>,
    ) -> Result<String> {
        Ok(text)
    }

    /// Transform role: rewrite the fused result after scanning
    async fn transform_output(&self, result: CombinedScanResult) -> Result<CombinedScanResult> {
        Ok(result)
    }

    /// Action role: gate for `execute`
    async fn should_execute(&self, _result: &ScanPipelineResult) -> bool {
        false
    }

    /// Action role: the side effect
    async fn execute(&self, _result: &ScanPipelineResult) -> Result<()> {
        Ok(())
    }
}

/// Per-plugin call counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginMetrics {
    /// Calls that returned within the deadline
    pub successes: u64,

    /// Calls that errored or timed out
    pub failures: u64,

    /// Total time spent in this plugin across all calls
    pub total_duration_ms: u64,
}

struct PluginEntry {
    plugin: Arc<dyn Plugin>,
    metadata: PluginMetadata,
    // Serializes calls into one plugin; the manager assumes nothing about
    // plugin-internal thread safety
    call_lock: tokio::sync::Mutex<()>,
    metrics: std::sync::Mutex<PluginMetrics>,
}

/// Owns plugin lifecycle and executes calls with error isolation
pub struct PluginManager {
    entries: Vec<PluginEntry>,
    timeout: Duration,
    initialized: bool,
}

impl PluginManager {
    /// Manager with the given per-call deadline
    pub fn new(timeout: Duration) -> Self {
        Self {
            entries: Vec::new(),
            timeout,
            initialized: false,
        }
    }

    /// Register a plugin; call before `initialize_all`
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        let metadata = plugin.metadata();
        tracing::info!(plugin = %metadata.name, capabilities = ?metadata.capabilities, "plugin registered");
        self.entries.push(PluginEntry {
            plugin,
            metadata,
            call_lock: tokio::sync::Mutex::new(()),
            metrics: std::sync::Mutex::new(PluginMetrics::default()),
        });
        // Transforms chain in priority order; keep the whole list sorted
        self.entries
            .sort_by(|a, b| b.metadata.priority.cmp(&a.metadata.priority));
    }

    /// Initialize every plugin with its config map
    ///
    /// A plugin failing initialization is dropped from the manager.
    pub async fn initialize_all(
        &mut self,
        configs: &HashMap<String, HashMap<String, serde_json::Value>>,
    ) {
        let empty = HashMap::new();
        let mut keep = Vec::new();
        for entry in self.entries.drain(..) {
            let config = configs.get(&entry.metadata.name).unwrap_or(&empty);
            match entry.plugin.initialize(config).await {
                Ok(()) => keep.push(entry),
                Err(err) => {
                    tracing::error!(
                        plugin = %entry.metadata.name,
                        error = %err,
                        "plugin failed to initialize; dropped"
                    );
                }
            }
        }
        self.entries = keep;
        self.initialized = true;
    }

    /// Number of live plugins
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no plugins are registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run every detector plugin; failures are isolated per plugin
    ///
    /// Returns the union of detections plus `(plugin, error)` pairs for
    /// the failures.
    pub async fn run_detectors(
        &self,
        text: &str,
        context: Option<&ScanContext>,
    ) -> (Vec<Detection>, Vec<(String, String)>) {
        let mut detections = Vec::new();
        let mut errors = Vec::new();

        let futures: Vec<_> = self
            .entries
            .iter()
            .filter(|e| e.metadata.capabilities.contains(&PluginCapability::Detector))
            .map(|entry| async move {
                let outcome = self
                    .guarded(entry, entry.plugin.detect(text, context))
                    .await;
                (entry.metadata.name.clone(), outcome)
            })
            .collect();

        for (name, outcome) in futures::future::join_all(futures).await {
            match outcome {
                Ok(mut found) => {
                    // Detections report a consistent timestamp and layer
                    for detection in &mut found {
                        detection.detected_at = Utc::now();
                    }
                    detections.extend(found);
                }
                Err(err) => errors.push((name, err.to_string())),
            }
        }
        (detections, errors)
    }

    /// Chain input transforms in priority order
    pub async fn transform_input(
        &self,
        mut text: String,
        context: Option<&ScanContext>,
    ) -> (String, Vec<(String, String)>) {
        let mut errors = Vec::new();
        for entry in self
            .entries
            .iter()
            .filter(|e| e.metadata.capabilities.contains(&PluginCapability::Transform))
        {
            match self
                .guarded(entry, entry.plugin.transform_input(text.clone(), context))
                .await
            {
                Ok(transformed) => text = transformed,
                Err(err) => errors.push((entry.metadata.name.clone(), err.to_string())),
            }
        }
        (text, errors)
    }

    /// Chain output transforms in priority order
    pub async fn transform_output(
        &self,
        mut result: CombinedScanResult,
    ) -> (CombinedScanResult, Vec<(String, String)>) {
        let mut errors = Vec::new();
        for entry in self
            .entries
            .iter()
            .filter(|e| e.metadata.capabilities.contains(&PluginCapability::Transform))
        {
            match self
                .guarded(entry, entry.plugin.transform_output(result.clone()))
                .await
            {
                Ok(transformed) => result = transformed,
                Err(err) => errors.push((entry.metadata.name.clone(), err.to_string())),
            }
        }
        (result, errors)
    }

    /// Run action plugins whose `should_execute` gate opens
    pub async fn run_actions(&self, result: &ScanPipelineResult) -> Vec<(String, String)> {
        let mut errors = Vec::new();
        for entry in self
            .entries
            .iter()
            .filter(|e| e.metadata.capabilities.contains(&PluginCapability::Action))
        {
            let wants = {
                let _guard = entry.call_lock.lock().await;
                entry.plugin.should_execute(result).await
            };
            if !wants {
                continue;
            }
            if let Err(err) = self.guarded(entry, entry.plugin.execute(result)).await {
                errors.push((entry.metadata.name.clone(), err.to_string()));
            }
        }
        errors
    }

    /// Shut down all plugins in reverse-initialization order
    pub async fn shutdown_all(&mut self) {
        for entry in self.entries.iter().rev() {
            entry.plugin.shutdown().await;
            tracing::debug!(plugin = %entry.metadata.name, "plugin shut down");
        }
        self.entries.clear();
        self.initialized = false;
    }

    /// Per-plugin call counters
    pub fn metrics(&self) -> HashMap<String, PluginMetrics> {
        self.entries
            .iter()
            .map(|e| (e.metadata.name.clone(), e.metrics.lock().unwrap().clone()))
            .collect()
    }

    /// Run one plugin call under the lock, the deadline, and the error
    /// boundary, updating metrics either way
    async fn guarded<T>(
        &self,
        entry: &PluginEntry,
        call: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        let _guard = entry.call_lock.lock().await;
        let started = Instant::now();

        let outcome = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(Error::plugin(
                entry.metadata.name.clone(),
                format!("call exceeded {}ms deadline", self.timeout.as_millis()),
            )),
        };

        let elapsed = started.elapsed().as_millis() as u64;
        let mut metrics = entry.metrics.lock().unwrap();
        metrics.total_duration_ms += elapsed;
        match &outcome {
            Ok(_) => metrics.successes += 1,
            Err(err) => {
                metrics.failures += 1;
                tracing::warn!(plugin = %entry.metadata.name, error = %err, "plugin call failed");
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raxe_core::{DetectionLayer, RuleFamily, Severity};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TestDetector {
        name: String,
        fail: bool,
        delay_ms: u64,
    }

    #[async_trait]
    impl Plugin for TestDetector {
        fn metadata(&self) -> PluginMetadata {
            PluginMetadata {
                name: self.name.clone(),
                version: "1.0.0".to_string(),
                priority: 0,
                capabilities: vec![PluginCapability::Detector],
            }
        }

        async fn detect(
            &self,
            _text: &str,
            _context: Option<&ScanContext>,
        ) -> Result<Vec<Detection>> {
            if self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }
            if self.fail {
                return Err(Error::plugin(self.name.clone(), "intentional failure"));
            }
            Ok(vec![Detection::new(
                format!("plugin-{}-01", self.name),
                RuleFamily::Custom,
                Severity::Medium,
                0.75,
                DetectionLayer::Plugin,
                "plugin detection",
            )])
        }
    }

    struct Uppercaser {
        priority: i32,
    }

    #[async_trait]
    impl Plugin for Uppercaser {
        fn metadata(&self) -> PluginMetadata {
            PluginMetadata {
                name: format!("upper-{}", self.priority),
                version: "1.0.0".to_string(),
                priority: self.priority,
                capabilities: vec![PluginCapability::Transform],
            }
        }

        async fn transform_input(
            &self,
            text: String,
            _context: Option<&ScanContext>,
        ) -> Result<String> {
            Ok(format!("{}|{}", text, self.priority))
        }
    }

    struct CountingAction {
        executions: Arc<AtomicUsize>,
        gate_open: bool,
    }

    #[async_trait]
    impl Plugin for CountingAction {
        fn metadata(&self) -> PluginMetadata {
            PluginMetadata {
                name: "counter".to_string(),
                version: "1.0.0".to_string(),
                priority: 0,
                capabilities: vec![PluginCapability::Action],
            }
        }

        async fn should_execute(&self, _result: &ScanPipelineResult) -> bool {
            self.gate_open
        }

        async fn execute(&self, _result: &ScanPipelineResult) -> Result<()> {
            self.executions.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn pipeline_result() -> ScanPipelineResult {
        ScanPipelineResult {
            combined: CombinedScanResult {
                detections: Vec::new(),
                severity: None,
                has_threats: false,
                l1: raxe_core::ScanResult::empty(0),
                l2: None,
            },
            action: raxe_core::PolicyAction::Allow,
            should_block: false,
            duration_ms: 0,
            l1_duration_ms: 0,
            l2_duration_ms: None,
            text_fingerprint: String::new(),
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_detector_failure_is_isolated() {
        let mut manager = PluginManager::new(Duration::from_secs(5));
        manager.register(Arc::new(TestDetector {
            name: "good".to_string(),
            fail: false,
            delay_ms: 0,
        }));
        manager.register(Arc::new(TestDetector {
            name: "bad".to_string(),
            fail: true,
            delay_ms: 0,
        }));
        manager.initialize_all(&HashMap::new()).await;

        let (detections, errors) = manager.run_detectors("text", None).await;
        assert_eq!(detections.len(), 1);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, "bad");

        let metrics = manager.metrics();
        assert_eq!(metrics["good"].successes, 1);
        assert_eq!(metrics["bad"].failures, 1);
    }

    #[tokio::test]
    async fn test_detector_timeout() {
        let mut manager = PluginManager::new(Duration::from_millis(20));
        manager.register(Arc::new(TestDetector {
            name: "slow".to_string(),
            fail: false,
            delay_ms: 200,
        }));
        manager.initialize_all(&HashMap::new()).await;

        let (detections, errors) = manager.run_detectors("text", None).await;
        assert!(detections.is_empty());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].1.contains("deadline"));
        assert_eq!(manager.metrics()["slow"].failures, 1);
    }

    #[tokio::test]
    async fn test_transforms_chain_in_priority_order() {
        let mut manager = PluginManager::new(Duration::from_secs(5));
        manager.register(Arc::new(Uppercaser { priority: 10 }));
        manager.register(Arc::new(Uppercaser { priority: 90 }));
        manager.initialize_all(&HashMap::new()).await;

        let (text, errors) = manager.transform_input("seed".to_string(), None).await;
        assert!(errors.is_empty());
        // Priority 90 runs before priority 10
        assert_eq!(text, "seed|90|10");
    }

    #[tokio::test]
    async fn test_action_gate() {
        let executed = Arc::new(AtomicUsize::new(0));
        let mut manager = PluginManager::new(Duration::from_secs(5));
        manager.register(Arc::new(CountingAction {
            executions: Arc::clone(&executed),
            gate_open: false,
        }));
        manager.initialize_all(&HashMap::new()).await;

        manager.run_actions(&pipeline_result()).await;
        assert_eq!(executed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_action_executes_when_gate_open() {
        let executed = Arc::new(AtomicUsize::new(0));
        let mut manager = PluginManager::new(Duration::from_secs(5));
        manager.register(Arc::new(CountingAction {
            executions: Arc::clone(&executed),
            gate_open: true,
        }));
        manager.initialize_all(&HashMap::new()).await;

        let errors = manager.run_actions(&pipeline_result()).await;
        assert!(errors.is_empty());
        assert_eq!(executed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shutdown_clears_plugins() {
        let mut manager = PluginManager::new(Duration::from_secs(5));
        manager.register(Arc::new(TestDetector {
            name: "d".to_string(),
            fail: false,
            delay_ms: 0,
        }));
        manager.initialize_all(&HashMap::new()).await;
        assert_eq!(manager.len(), 1);

        manager.shutdown_all().await;
        assert!(manager.is_empty());
    }
}
