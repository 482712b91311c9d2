//! Model package manifests
//!
//! Each model lives in its own directory identified by a `manifest.json`
//! naming the embedding model, the classifier head files, the tokenizer
//! configuration, and the label encoders. Validation checks required
//! fields and that every referenced file exists; models failing validation
//! are logged and excluded from discovery.

use raxe_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Manifest file name probed inside a model directory
pub const MANIFEST_FILE: &str = "manifest.json";

/// Lifecycle status of a model package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
    /// Production-ready
    Active,
    /// Usable, but not selected unless nothing active fits
    Experimental,
    /// Excluded from selection
    Deprecated,
}

/// Embedding model declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSpec {
    /// ONNX file, relative to the model directory
    pub model: PathBuf,

    /// Embedding dimensionality
    pub dim: usize,

    /// Maximum token window
    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

fn default_max_length() -> usize {
    128
}

/// Classifier head files; binary/family/subfamily are the required cascade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierSpec {
    pub binary: PathBuf,
    pub family: PathBuf,
    pub subfamily: PathBuf,
    #[serde(default)]
    pub severity: Option<PathBuf>,
    #[serde(default)]
    pub technique: Option<PathBuf>,
    #[serde(default)]
    pub harm: Option<PathBuf>,
}

/// Tokenizer declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenizerSpec {
    /// Tokenizer JSON file (vocabulary + special tokens)
    pub file: PathBuf,

    /// Tokenizer type, e.g. `wordpiece`
    #[serde(rename = "type")]
    pub kind: String,

    /// Maximum sequence length fed to the embedding model
    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

/// Performance claims used by best-model selection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceClaims {
    /// Expected per-call latency in milliseconds
    pub latency_ms: f64,

    /// Claimed accuracy in [0, 1]
    pub accuracy: f64,
}

/// A parsed model manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelManifest {
    /// Unique model identifier
    pub model_id: String,

    /// Lifecycle status
    pub status: ModelStatus,

    /// Embedding model
    pub embedding: EmbeddingSpec,

    /// Classifier heads
    pub classifiers: ClassifierSpec,

    /// Tokenizer configuration
    pub tokenizer: TokenizerSpec,

    /// Label encoder JSON mapping numeric classes to strings, per head
    pub label_encoders: PathBuf,

    /// Performance claims
    pub performance: PerformanceClaims,
}

impl ModelManifest {
    /// Parse and validate the manifest inside `dir`
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            Error::model_load(
                dir.display().to_string(),
                format!("failed to read {}: {}", MANIFEST_FILE, e),
            )
        })?;
        let manifest: ModelManifest = serde_json::from_str(&raw).map_err(|e| {
            Error::model_load(dir.display().to_string(), format!("invalid manifest: {}", e))
        })?;
        manifest.validate(dir)?;
        Ok(manifest)
    }

    /// Check required fields and referenced files
    pub fn validate(&self, dir: &Path) -> Result<()> {
        if self.model_id.is_empty() {
            return Err(self.invalid("model_id", "must not be empty"));
        }
        if self.embedding.dim == 0 {
            return Err(self.invalid("embedding.dim", "must be greater than zero"));
        }
        if self.tokenizer.kind.is_empty() {
            return Err(self.invalid("tokenizer.type", "must be declared"));
        }

        self.require_file(dir, "embedding.model", &self.embedding.model)?;
        self.require_file(dir, "classifiers.binary", &self.classifiers.binary)?;
        self.require_file(dir, "classifiers.family", &self.classifiers.family)?;
        self.require_file(dir, "classifiers.subfamily", &self.classifiers.subfamily)?;
        for (field, path) in [
            ("classifiers.severity", &self.classifiers.severity),
            ("classifiers.technique", &self.classifiers.technique),
            ("classifiers.harm", &self.classifiers.harm),
        ] {
            if let Some(path) = path {
                self.require_file(dir, field, path)?;
            }
        }
        self.require_file(dir, "tokenizer.file", &self.tokenizer.file)?;
        self.require_file(dir, "label_encoders", &self.label_encoders)?;
        Ok(())
    }

    /// The optional heads this package actually ships
    pub fn optional_heads(&self) -> Vec<&'static str> {
        let mut heads = Vec::new();
        if self.classifiers.severity.is_some() {
            heads.push("severity");
        }
        if self.classifiers.technique.is_some() {
            heads.push("technique");
        }
        if self.classifiers.harm.is_some() {
            heads.push("harm");
        }
        heads
    }

    fn require_file(&self, dir: &Path, field: &str, relative: &Path) -> Result<()> {
        let resolved = dir.join(relative);
        if !resolved.is_file() {
            return Err(self.invalid(
                field,
                format!("referenced file '{}' does not exist", resolved.display()),
            ));
        }
        Ok(())
    }

    fn invalid<R: Into<String>>(&self, field: &str, reason: R) -> Error {
        Error::model_load(
            self.model_id.clone(),
            format!("{}: {}", field, reason.into()),
        )
    }
}


#[cfg(test)]
mod tests {
    use super::test_fixtures::write_stub_package;
    use super::*;

    #[test]
    fn test_load_valid_manifest() {
        let dir = tempfile::tempdir().unwrap();
        write_stub_package(dir.path(), "raxe-l2-v1", "active");

        let manifest = ModelManifest::load(dir.path()).unwrap();
        assert_eq!(manifest.model_id, "raxe-l2-v1");
        assert_eq!(manifest.status, ModelStatus::Active);
        assert_eq!(manifest.embedding.dim, 768);
        assert!(manifest.optional_heads().is_empty());
    }

    #[test]
    fn test_missing_referenced_file_names_field() {
        let dir = tempfile::tempdir().unwrap();
        write_stub_package(dir.path(), "raxe-l2-v1", "active");
        std::fs::remove_file(dir.path().join("family.onnx")).unwrap();

        let err = ModelManifest::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("classifiers.family"));
    }

    #[test]
    fn test_missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ModelManifest::load(dir.path()).is_err());
    }

    #[test]
    fn test_status_parse() {
        let dir = tempfile::tempdir().unwrap();
        write_stub_package(dir.path(), "m", "experimental");
        let manifest = ModelManifest::load(dir.path()).unwrap();
        assert_eq!(manifest.status, ModelStatus::Experimental);
    }
}
