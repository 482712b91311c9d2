//! Compiled-pattern cache
//!
//! Compilation is pure over `(source, flags)`, so compiled matchers are
//! shared across rules and packs. The cache is populated eagerly during
//! preload and read-mostly afterwards; a failed compilation is remembered
//! so the error is reported once at load time, not on every scan.

use crate::matcher::CompiledPattern;
use raxe_core::{Error, Pattern, PatternKey, Result, Rule};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Shared cache of compiled patterns keyed by `(source, flags)`
#[derive(Default)]
pub struct CompiledPatternCache {
    compiled: RwLock<HashMap<PatternKey, Arc<CompiledPattern>>>,
    failed: RwLock<HashMap<PatternKey, String>>,
}

/// Counters describing the cache contents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternCacheStats {
    /// Successfully compiled patterns
    pub compiled: usize,
    /// Patterns that failed to compile
    pub failed: usize,
}

impl CompiledPatternCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a compiled pattern, compiling and caching on first use
    ///
    /// A pattern that failed before returns the original error without
    /// re-attempting compilation.
    pub fn get_or_compile(&self, pattern: &Pattern, rule_id: &str) -> Result<Arc<CompiledPattern>> {
        let key = pattern.cache_key();

        if let Some(found) = self.compiled.read().unwrap().get(&key) {
            return Ok(Arc::clone(found));
        }
        if let Some(reason) = self.failed.read().unwrap().get(&key) {
            return Err(Error::pattern_compile(rule_id, reason.clone()));
        }

        match CompiledPattern::compile_for_rule(pattern, rule_id) {
            Ok(compiled) => {
                let compiled = Arc::new(compiled);
                let mut map = self.compiled.write().unwrap();
                // Another thread may have won the race; keep its entry
                let entry = map.entry(key).or_insert_with(|| Arc::clone(&compiled));
                Ok(Arc::clone(entry))
            }
            Err(err) => {
                if let Error::PatternCompile { ref reason, .. } = err {
                    self.failed.write().unwrap().insert(key, reason.clone());
                }
                Err(err)
            }
        }
    }

    /// Compile every pattern of every rule, returning the ids of rules
    /// left with no usable pattern
    ///
    /// Called once during preload so scans never pay compile cost.
    pub fn precompile(&self, rules: &[Arc<Rule>]) -> Vec<String> {
        let mut disabled = Vec::new();

        for rule in rules {
            let mut usable = 0usize;
            for pattern in &rule.patterns {
                match self.get_or_compile(pattern, &rule.id) {
                    Ok(_) => usable += 1,
                    Err(err) => {
                        tracing::warn!(rule_id = %rule.id, error = %err, "pattern disabled");
                    }
                }
            }
            if usable == 0 {
                disabled.push(rule.id.clone());
            }
        }

        if !disabled.is_empty() {
            tracing::warn!(count = disabled.len(), "rules disabled by compile errors");
        }
        disabled
    }

    /// Current cache counters
    pub fn stats(&self) -> PatternCacheStats {
        PatternCacheStats {
            compiled: self.compiled.read().unwrap().len(),
            failed: self.failed.read().unwrap().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raxe_core::{RuleFamily, Severity};

    #[test]
    fn test_compile_once_and_share() {
        let cache = CompiledPatternCache::new();
        let a = Pattern::insensitive(r"ignore\s+previous");
        let b = Pattern::insensitive(r"ignore\s+previous").with_timeout_ms(10);

        let first = cache.get_or_compile(&a, "pi-001").unwrap();
        let second = cache.get_or_compile(&b, "pi-002").unwrap();
        // Same (source, flags) -> same compiled instance
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.stats().compiled, 1);
    }

    #[test]
    fn test_failed_compile_remembered() {
        let cache = CompiledPatternCache::new();
        let bad = Pattern::new(r"(unclosed");

        assert!(cache.get_or_compile(&bad, "xx-001").is_err());
        assert!(cache.get_or_compile(&bad, "xx-001").is_err());
        assert_eq!(cache.stats().failed, 1);
        assert_eq!(cache.stats().compiled, 0);
    }

    #[test]
    fn test_precompile_reports_disabled_rules() {
        let cache = CompiledPatternCache::new();
        let good = Arc::new(Rule::new(
            "pi-001",
            "Good",
            RuleFamily::Pi,
            Severity::High,
            0.9,
            vec![Pattern::new(r"ignore")],
        ));
        let broken = Arc::new(Rule::new(
            "xx-002",
            "Broken",
            RuleFamily::Xx,
            Severity::Low,
            0.5,
            vec![Pattern::new(r"(unclosed")],
        ));

        let disabled = cache.precompile(&[good, broken]);
        assert_eq!(disabled, vec!["xx-002".to_string()]);
    }

    #[test]
    fn test_partial_pattern_failure_keeps_rule() {
        let cache = CompiledPatternCache::new();
        let rule = Arc::new(Rule::new(
            "enc-001",
            "Mixed",
            RuleFamily::Enc,
            Severity::Medium,
            0.6,
            vec![Pattern::new(r"(unclosed"), Pattern::new(r"[A-Za-z0-9+/]{24,}")],
        ));

        let disabled = cache.precompile(&[rule]);
        assert!(disabled.is_empty());
    }
}
