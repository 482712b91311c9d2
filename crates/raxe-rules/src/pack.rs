//! Rule packs on disk
//!
//! A pack is a directory with a manifest (`pack.yaml` or `pack.json`)
//! declaring the pack name, version, and a family-indexed list of rule
//! files. Each rule file is a single rule document, YAML or JSON by
//! extension. Malformed documents produce a load-time diagnostic naming
//! the offending field and are excluded; a pack with zero loadable rules
//! is reported but not fatal.

use raxe_core::{Error, Result, Rule, RuleFamily};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Manifest file names probed inside a pack directory, in order
pub const MANIFEST_NAMES: &[&str] = &["pack.yaml", "pack.yml", "pack.json"];

/// Pack manifest document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackManifest {
    /// Pack name, unique within a root
    pub name: String,

    /// Pack version
    pub version: semver::Version,

    /// Rule files per family, relative to the pack directory
    #[serde(default)]
    pub rules: HashMap<RuleFamily, Vec<PathBuf>>,
}

/// A loaded rule pack
#[derive(Debug, Clone)]
pub struct RulePack {
    /// Pack name from the manifest
    pub name: String,

    /// Pack version from the manifest
    pub version: semver::Version,

    /// Successfully loaded rules
    pub rules: Vec<Rule>,

    /// Load-time diagnostics for excluded documents
    pub diagnostics: Vec<String>,
}

impl RulePack {
    /// Load a pack from its directory
    ///
    /// Fails only when the manifest itself is missing or unreadable;
    /// individual rule failures become diagnostics.
    pub fn load(dir: &Path) -> Result<Self> {
        let manifest = read_manifest(dir)?;
        let mut rules = Vec::new();
        let mut diagnostics = Vec::new();

        for (family, files) in &manifest.rules {
            for file in files {
                let path = dir.join(file);
                match load_rule_file(&path) {
                    Ok(rule) => {
                        if rule.family != *family {
                            diagnostics.push(format!(
                                "{}: family: rule declares '{}' but is listed under '{}'",
                                path.display(),
                                rule.family,
                                family
                            ));
                            continue;
                        }
                        rules.push(rule);
                    }
                    Err(err) => diagnostics.push(format!("{}: {}", path.display(), err)),
                }
            }
        }

        if rules.is_empty() {
            tracing::warn!(pack = %manifest.name, "pack loaded with zero usable rules");
        }
        for diagnostic in &diagnostics {
            tracing::warn!(pack = %manifest.name, "{}", diagnostic);
        }

        Ok(Self {
            name: manifest.name,
            version: manifest.version,
            rules,
            diagnostics,
        })
    }
}

fn read_manifest(dir: &Path) -> Result<PackManifest> {
    for name in MANIFEST_NAMES {
        let candidate = dir.join(name);
        if candidate.is_file() {
            let raw = std::fs::read_to_string(&candidate)?;
            let manifest: PackManifest = parse_document(&candidate, &raw)
                .map_err(|reason| Error::rule_load(dir.display().to_string(), "<manifest>", reason))?;
            return Ok(manifest);
        }
    }
    Err(Error::rule_load(
        dir.display().to_string(),
        "<manifest>",
        "no pack manifest found",
    ))
}

/// Parse and validate a single rule document
pub fn load_rule_file(path: &Path) -> std::result::Result<Rule, String> {
    let raw = std::fs::read_to_string(path).map_err(|e| format!("read failed: {}", e))?;
    let rule: Rule = parse_document(path, &raw)?;
    rule.validate()?;
    Ok(rule)
}

fn parse_document<T: for<'de> Deserialize<'de>>(
    path: &Path,
    raw: &str,
) -> std::result::Result<T, String> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => {
            serde_yaml::from_str(raw).map_err(|e| describe_yaml_error(&e))
        }
        Some("json") => serde_json::from_str(raw).map_err(|e| e.to_string()),
        other => Err(format!(
            "unsupported rule file extension '{}'",
            other.unwrap_or("<none>")
        )),
    }
}

fn describe_yaml_error(err: &serde_yaml::Error) -> String {
    // serde_yaml already names the field for missing/unknown keys
    err.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    const RULE_YAML: &str = r#"
id: pi-101
version: 1.2.0
family: pi
subfamily: instruction_override
name: Instruction override
description: Attempts to override prior instructions
severity: critical
confidence: 0.9
patterns:
  - source: 'ignore\s+(all\s+)?previous\s+instructions'
    flags:
      case_insensitive: true
    timeout_ms: 50
attack_ids: [T1566]
"#;

    #[test]
    fn test_load_rule_yaml() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "pi-101.yaml", RULE_YAML);

        let rule = load_rule_file(&dir.path().join("pi-101.yaml")).unwrap();
        assert_eq!(rule.id, "pi-101");
        assert_eq!(rule.version, semver::Version::new(1, 2, 0));
        assert!(rule.patterns[0].flags.case_insensitive);
        assert_eq!(rule.patterns[0].timeout_ms, 50);
    }

    #[test]
    fn test_load_rule_json() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "cmd-001.json",
            r#"{
                "id": "cmd-001",
                "version": "1.0.0",
                "family": "cmd",
                "name": "Shell injection",
                "severity": "high",
                "confidence": 0.8,
                "patterns": [{"source": "rm\\s+-rf"}]
            }"#,
        );

        let rule = load_rule_file(&dir.path().join("cmd-001.json")).unwrap();
        assert_eq!(rule.family, RuleFamily::Cmd);
        assert_eq!(rule.severity, raxe_core::Severity::High);
    }

    #[test]
    fn test_invalid_rule_names_field() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "bad.json",
            r#"{
                "id": "pi-999",
                "version": "1.0.0",
                "family": "pi",
                "name": "Bad confidence",
                "severity": "high",
                "confidence": 3.0,
                "patterns": [{"source": "x"}]
            }"#,
        );

        let err = load_rule_file(&dir.path().join("bad.json")).unwrap_err();
        assert!(err.contains("confidence"));
    }

    #[test]
    fn test_pack_load_with_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "pack.yaml",
            r#"
name: community
version: 2.1.0
rules:
  pi: [pi-101.yaml]
  cmd: [missing.yaml]
"#,
        );
        write(dir.path(), "pi-101.yaml", RULE_YAML);

        let pack = RulePack::load(dir.path()).unwrap();
        assert_eq!(pack.name, "community");
        assert_eq!(pack.rules.len(), 1);
        assert_eq!(pack.diagnostics.len(), 1);
        assert!(pack.diagnostics[0].contains("missing.yaml"));
    }

    #[test]
    fn test_pack_family_mismatch_is_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "pack.yaml",
            "name: p\nversion: 1.0.0\nrules:\n  jb: [pi-101.yaml]\n",
        );
        write(dir.path(), "pi-101.yaml", RULE_YAML);

        let pack = RulePack::load(dir.path()).unwrap();
        assert!(pack.rules.is_empty());
        assert!(pack.diagnostics[0].contains("family"));
    }

    #[test]
    fn test_missing_manifest_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(RulePack::load(dir.path()).is_err());
    }
}
