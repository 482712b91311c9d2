//! Engine configuration surface
//!
//! Every option has a built-in default. Sources cascade, strongest first:
//! explicit setter > `RAXE_*` environment variable > config file > default.
//!
//! ## Example
//!
//! ```rust,ignore
//! let config = EngineConfig::default()
//!     .apply_env()?
//!     .with_mode(ScanMode::Thorough);
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "RAXE_";

/// Pipeline scan mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// L1 only; target <= 5 ms end-to-end
    Fast,
    /// L1 + L2 in parallel; target <= 55 ms
    Balanced,
    /// L1 + L2 + all plugins; target <= 160 ms
    Thorough,
}

impl Default for ScanMode {
    fn default() -> Self {
        ScanMode::Balanced
    }
}

impl FromStr for ScanMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fast" => Ok(ScanMode::Fast),
            "balanced" => Ok(ScanMode::Balanced),
            "thorough" => Ok(ScanMode::Thorough),
            other => Err(format!("unknown scan mode '{}'", other)),
        }
    }
}

/// Full engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding rule packs; `None` means bundled rules only
    pub packs_root: Option<PathBuf>,

    /// Directory holding model packages
    pub models_root: Option<PathBuf>,

    /// Enable the L2 detector
    pub l2_enabled: bool,

    /// Explicit model selection; `None` picks the best available
    pub l2_model_id: Option<String>,

    /// Minimum L2 confidence to report a prediction
    pub l2_confidence_threshold: f64,

    /// Per-call L2 inference deadline in milliseconds
    pub l2_timeout_ms: u64,

    /// Cancel pending L2/plugin work on an L1 critical hit
    pub fail_fast_on_critical: bool,

    /// Scan mode
    pub mode: ScanMode,

    /// Embedding cache LRU capacity
    pub embedding_cache_size: usize,

    /// Global policy default: block on critical severity
    pub block_on_critical: bool,

    /// Global policy default: block on high severity
    pub block_on_high: bool,

    /// Global policy confidence threshold
    pub confidence_threshold: f64,

    /// Gate for telemetry sinks
    pub telemetry_enabled: bool,

    /// Path to the user suppression list
    pub suppression_file: Option<PathBuf>,

    /// Per-plugin call deadline in milliseconds
    pub plugin_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            packs_root: None,
            models_root: None,
            l2_enabled: true,
            l2_model_id: None,
            l2_confidence_threshold: 0.7,
            l2_timeout_ms: 150,
            fail_fast_on_critical: true,
            mode: ScanMode::Balanced,
            embedding_cache_size: 1_000,
            block_on_critical: true,
            block_on_high: false,
            confidence_threshold: 0.7,
            telemetry_enabled: false,
            suppression_file: None,
            plugin_timeout_ms: 5_000,
        }
    }
}

/// Explicit per-option overrides, the strongest layer of the cascade
///
/// Every field is optional; `None` defers to the environment, the config
/// file, and finally the built-in default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfigOverrides {
    /// Config file to layer underneath the environment
    pub config_file: Option<PathBuf>,

    pub packs_root: Option<PathBuf>,
    pub models_root: Option<PathBuf>,
    pub l2_enabled: Option<bool>,
    pub l2_model_id: Option<String>,
    pub l2_confidence_threshold: Option<f64>,
    pub l2_timeout_ms: Option<u64>,
    pub fail_fast_on_critical: Option<bool>,
    pub mode: Option<ScanMode>,
    pub embedding_cache_size: Option<usize>,
    pub block_on_critical: Option<bool>,
    pub block_on_high: Option<bool>,
    pub confidence_threshold: Option<f64>,
    pub telemetry_enabled: Option<bool>,
    pub suppression_file: Option<PathBuf>,
    pub plugin_timeout_ms: Option<u64>,
}

impl EngineConfig {
    /// Resolve the full cascade: explicit argument > `RAXE_*` environment
    /// variable > config file > built-in default
    ///
    /// The config file layer comes from `explicit.config_file` when set.
    /// Invalid values fail with an error naming the offending field.
    pub fn resolve(explicit: EngineConfigOverrides) -> Result<Self> {
        let base = match &explicit.config_file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let mut config = base.apply_env()?;

        if let Some(v) = explicit.packs_root {
            config.packs_root = Some(v);
        }
        if let Some(v) = explicit.models_root {
            config.models_root = Some(v);
        }
        if let Some(v) = explicit.l2_enabled {
            config.l2_enabled = v;
        }
        if let Some(v) = explicit.l2_model_id {
            config.l2_model_id = Some(v);
        }
        if let Some(v) = explicit.l2_confidence_threshold {
            config.l2_confidence_threshold = v;
        }
        if let Some(v) = explicit.l2_timeout_ms {
            config.l2_timeout_ms = v;
        }
        if let Some(v) = explicit.fail_fast_on_critical {
            config.fail_fast_on_critical = v;
        }
        if let Some(v) = explicit.mode {
            config.mode = v;
        }
        if let Some(v) = explicit.embedding_cache_size {
            config.embedding_cache_size = v;
        }
        if let Some(v) = explicit.block_on_critical {
            config.block_on_critical = v;
        }
        if let Some(v) = explicit.block_on_high {
            config.block_on_high = v;
        }
        if let Some(v) = explicit.confidence_threshold {
            config.confidence_threshold = v;
        }
        if let Some(v) = explicit.telemetry_enabled {
            config.telemetry_enabled = v;
        }
        if let Some(v) = explicit.suppression_file {
            config.suppression_file = Some(v);
        }
        if let Some(v) = explicit.plugin_timeout_ms {
            config.plugin_timeout_ms = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load a config file (YAML or JSON by extension), then apply the
    /// environment on top
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_file(path)?.apply_env()
    }

    /// Parse a config file without applying the environment
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::config(
                "config_file",
                format!("failed to read '{}': {}", path.display(), e),
            )
        })?;

        let config: EngineConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&raw).map_err(|e| {
                Error::config("config_file", format!("invalid YAML: {}", e))
            })?,
            _ => serde_json::from_str(&raw).map_err(|e| {
                Error::config("config_file", format!("invalid JSON: {}", e))
            })?,
        };

        config.validate()?;
        tracing::debug!(path = %path.display(), "engine config loaded");
        Ok(config)
    }

    /// Apply `RAXE_*` environment variables on top of this configuration
    pub fn apply_env(mut self) -> Result<Self> {
        if let Some(v) = env_var("PACKS_ROOT") {
            self.packs_root = Some(expand_path(&v));
        }
        if let Some(v) = env_var("MODELS_ROOT") {
            self.models_root = Some(expand_path(&v));
        }
        if let Some(v) = env_var("L2_ENABLED") {
            self.l2_enabled = parse_bool("l2_enabled", &v)?;
        }
        if let Some(v) = env_var("L2_MODEL_ID") {
            self.l2_model_id = Some(v);
        }
        if let Some(v) = env_var("L2_CONFIDENCE_THRESHOLD") {
            self.l2_confidence_threshold = parse_fraction("l2_confidence_threshold", &v)?;
        }
        if let Some(v) = env_var("L2_TIMEOUT_MS") {
            self.l2_timeout_ms = parse_u64("l2_timeout_ms", &v)?;
        }
        if let Some(v) = env_var("FAIL_FAST_ON_CRITICAL") {
            self.fail_fast_on_critical = parse_bool("fail_fast_on_critical", &v)?;
        }
        if let Some(v) = env_var("MODE") {
            self.mode = v
                .parse()
                .map_err(|e: String| Error::config("mode", e))?;
        }
        if let Some(v) = env_var("EMBEDDING_CACHE_SIZE") {
            self.embedding_cache_size = parse_u64("embedding_cache_size", &v)? as usize;
        }
        if let Some(v) = env_var("BLOCK_ON_CRITICAL") {
            self.block_on_critical = parse_bool("block_on_critical", &v)?;
        }
        if let Some(v) = env_var("BLOCK_ON_HIGH") {
            self.block_on_high = parse_bool("block_on_high", &v)?;
        }
        if let Some(v) = env_var("CONFIDENCE_THRESHOLD") {
            self.confidence_threshold = parse_fraction("confidence_threshold", &v)?;
        }
        if let Some(v) = env_var("TELEMETRY_ENABLED") {
            self.telemetry_enabled = parse_bool("telemetry_enabled", &v)?;
        }
        if let Some(v) = env_var("SUPPRESSION_FILE") {
            self.suppression_file = Some(expand_path(&v));
        }
        self.validate()?;
        Ok(self)
    }

    /// Check value ranges, naming the offending field
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(Error::config(
                "confidence_threshold",
                format!("{} is outside [0.0, 1.0]", self.confidence_threshold),
            ));
        }
        if !(0.0..=1.0).contains(&self.l2_confidence_threshold) {
            return Err(Error::config(
                "l2_confidence_threshold",
                format!("{} is outside [0.0, 1.0]", self.l2_confidence_threshold),
            ));
        }
        if self.l2_timeout_ms == 0 {
            return Err(Error::config("l2_timeout_ms", "must be greater than zero"));
        }
        if self.plugin_timeout_ms == 0 {
            return Err(Error::config(
                "plugin_timeout_ms",
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Resolved models root: configured value or `<home>/models`
    pub fn resolved_models_root(&self) -> PathBuf {
        self.models_root.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("models")
        })
    }

    /// Set the scan mode
    pub fn with_mode(mut self, mode: ScanMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the packs root
    pub fn with_packs_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.packs_root = Some(root.into());
        self
    }

    /// Set the models root
    pub fn with_models_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.models_root = Some(root.into());
        self
    }

    /// Enable or disable L2
    pub fn with_l2_enabled(mut self, enabled: bool) -> Self {
        self.l2_enabled = enabled;
        self
    }
}

fn env_var(option: &str) -> Option<String> {
    std::env::var(format!("{}{}", ENV_PREFIX, option)).ok()
}

fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).to_string())
}

fn parse_bool(field: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::config(
            field,
            format!("'{}' is not a boolean", other),
        )),
    }
}

fn parse_u64(field: &str, raw: &str) -> Result<u64> {
    raw.parse()
        .map_err(|_| Error::config(field, format!("'{}' is not an integer", raw)))
}

fn parse_fraction(field: &str, raw: &str) -> Result<f64> {
    let value: f64 = raw
        .parse()
        .map_err(|_| Error::config(field, format!("'{}' is not a number", raw)))?;
    if !(0.0..=1.0).contains(&value) {
        return Err(Error::config(
            field,
            format!("{} is outside [0.0, 1.0]", value),
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.l2_enabled);
        assert_eq!(config.mode, ScanMode::Balanced);
        assert_eq!(config.embedding_cache_size, 1_000);
        assert_eq!(config.l2_timeout_ms, 150);
        assert!(config.block_on_critical);
        assert!(!config.block_on_high);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_scan_mode_parse() {
        assert_eq!("fast".parse::<ScanMode>().unwrap(), ScanMode::Fast);
        assert_eq!("Thorough".parse::<ScanMode>().unwrap(), ScanMode::Thorough);
        assert!("turbo".parse::<ScanMode>().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_threshold() {
        let config = EngineConfig {
            confidence_threshold: 1.3,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Config { ref field, .. } if field == "confidence_threshold"));
    }

    #[test]
    fn test_from_file_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raxe.json");
        std::fs::write(&path, r#"{"mode": "fast", "l2_enabled": false}"#).unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.mode, ScanMode::Fast);
        assert!(!config.l2_enabled);
        // Unspecified fields keep their defaults
        assert_eq!(config.embedding_cache_size, 1_000);
    }

    #[test]
    fn test_from_file_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raxe.yaml");
        std::fs::write(&path, "mode: thorough\nblock_on_high: true\n").unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.mode, ScanMode::Thorough);
        assert!(config.block_on_high);
    }

    #[test]
    fn test_from_file_invalid_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raxe.json");
        std::fs::write(&path, r#"{"confidence_threshold": 7.0}"#).unwrap();
        assert!(EngineConfig::from_file(&path).is_err());
    }

    #[test]
    fn test_resolve_explicit_beats_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raxe.yaml");
        std::fs::write(&path, "mode: fast\nl2_timeout_ms: 80\nblock_on_high: true\n").unwrap();

        let config = EngineConfig::resolve(EngineConfigOverrides {
            config_file: Some(path),
            mode: Some(ScanMode::Thorough),
            ..Default::default()
        })
        .unwrap();

        // Explicit wins over the file...
        assert_eq!(config.mode, ScanMode::Thorough);
        // ...while untouched options keep the file's values...
        assert_eq!(config.l2_timeout_ms, 80);
        assert!(config.block_on_high);
        // ...and everything else defaults
        assert_eq!(config.embedding_cache_size, 1_000);
    }

    #[test]
    fn test_resolve_without_file_uses_defaults() {
        let config = EngineConfig::resolve(EngineConfigOverrides {
            l2_enabled: Some(false),
            confidence_threshold: Some(0.9),
            ..Default::default()
        })
        .unwrap();
        assert!(!config.l2_enabled);
        assert!((config.confidence_threshold - 0.9).abs() < f64::EPSILON);
        assert_eq!(config.mode, ScanMode::Balanced);
    }

    #[test]
    fn test_resolve_rejects_invalid_explicit_value() {
        let err = EngineConfig::resolve(EngineConfigOverrides {
            confidence_threshold: Some(2.0),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, Error::Config { ref field, .. } if field == "confidence_threshold"));
    }

    #[test]
    fn test_parse_bool_values() {
        assert!(parse_bool("x", "true").unwrap());
        assert!(parse_bool("x", "1").unwrap());
        assert!(!parse_bool("x", "off").unwrap());
        assert!(parse_bool("x", "maybe").is_err());
    }
}
