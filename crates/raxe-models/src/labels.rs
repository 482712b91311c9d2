//! Label encoders
//!
//! Classifier heads emit numeric classes; the label encoder JSON maps
//! them back to strings, one table per head:
//!
//! ```json
//! {
//!   "binary": {"0": "safe", "1": "threat"},
//!   "family": {"0": "prompt_injection", "1": "jailbreak"}
//! }
//! ```

use raxe_core::{Error, Result};
use std::collections::HashMap;
use std::path::Path;

/// Decoded label tables, one per head
#[derive(Debug, Clone, Default)]
pub struct LabelEncoders {
    tables: HashMap<String, HashMap<i64, String>>,
}

impl LabelEncoders {
    /// Load from a label-encoder JSON file
    pub fn load(path: &Path, model_id: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::model_load(model_id, format!("failed to read label encoders: {}", e))
        })?;
        Self::parse(&raw, model_id)
    }

    /// Parse the encoder document
    pub fn parse(raw: &str, model_id: &str) -> Result<Self> {
        let parsed: HashMap<String, HashMap<String, String>> = serde_json::from_str(raw)
            .map_err(|e| {
                Error::model_load(model_id, format!("invalid label encoders: {}", e))
            })?;

        let mut tables = HashMap::new();
        for (head, entries) in parsed {
            let mut table = HashMap::new();
            for (index, label) in entries {
                let index: i64 = index.parse().map_err(|_| {
                    Error::model_load(
                        model_id,
                        format!("label_encoders.{}: '{}' is not an integer class", head, index),
                    )
                })?;
                table.insert(index, label);
            }
            tables.insert(head, table);
        }
        Ok(Self { tables })
    }

    /// Decode a class index for the given head
    ///
    /// Unknown classes decode to `class_<n>` rather than failing the scan.
    pub fn decode(&self, head: &str, class: i64) -> String {
        self.tables
            .get(head)
            .and_then(|t| t.get(&class))
            .cloned()
            .unwrap_or_else(|| format!("class_{}", class))
    }

    /// Whether a table exists for the head
    pub fn has_head(&self, head: &str) -> bool {
        self.tables.contains_key(head)
    }

    /// Number of classes known for the head
    pub fn class_count(&self, head: &str) -> usize {
        self.tables.get(head).map(|t| t.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "binary": {"0": "safe", "1": "threat"},
        "family": {"0": "prompt_injection", "1": "jailbreak", "2": "harmful_content"}
    }"#;

    #[test]
    fn test_parse_and_decode() {
        let encoders = LabelEncoders::parse(DOC, "m").unwrap();
        assert_eq!(encoders.decode("binary", 1), "threat");
        assert_eq!(encoders.decode("family", 2), "harmful_content");
        assert_eq!(encoders.class_count("family"), 3);
    }

    #[test]
    fn test_unknown_class_degrades() {
        let encoders = LabelEncoders::parse(DOC, "m").unwrap();
        assert_eq!(encoders.decode("binary", 9), "class_9");
        assert_eq!(encoders.decode("missing_head", 0), "class_0");
        assert!(!encoders.has_head("missing_head"));
    }

    #[test]
    fn test_non_integer_class_is_error() {
        let doc = r#"{"binary": {"zero": "safe"}}"#;
        let err = LabelEncoders::parse(doc, "m").unwrap_err();
        assert!(err.to_string().contains("binary"));
    }
}
