//! Pack registry with precedence resolution
//!
//! Packs load from named roots, each carrying a precedence rank
//! (`custom` 300 > `community` 200 > bundled `core` 100). The effective
//! rule list is the deduplicated union: for a shared rule id the
//! higher-ranked source wins, and within one source the higher semantic
//! version wins. The list is materialized once at load and is stable and
//! cheap to re-read for the registry's lifetime.

use crate::builtin::{BUNDLED_PACK_NAME, BUNDLED_RULES};
use crate::cache::{CompiledPatternCache, PatternCacheStats};
use crate::pack::RulePack;
use raxe_core::{Result, Rule, RuleRepository};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Precedence rank of the bundled pack
pub const RANK_BUNDLED: u32 = 100;
/// Precedence rank of community packs
pub const RANK_COMMUNITY: u32 = 200;
/// Precedence rank of user-supplied packs
pub const RANK_CUSTOM: u32 = 300;

/// A named pack root: a directory scanned for pack manifests
#[derive(Debug, Clone)]
pub struct PackRoot {
    /// Root name, e.g. `custom`
    pub name: String,

    /// Directory holding pack subdirectories
    pub path: PathBuf,

    /// Precedence rank; higher shadows lower
    pub rank: u32,
}

impl PackRoot {
    /// A custom root (highest precedence)
    pub fn custom<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            name: "custom".to_string(),
            path: path.into(),
            rank: RANK_CUSTOM,
        }
    }

    /// A community root
    pub fn community<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            name: "community".to_string(),
            path: path.into(),
            rank: RANK_COMMUNITY,
        }
    }
}

/// The resolved, read-only rule registry
pub struct PackRegistry {
    rules: Arc<Vec<Arc<Rule>>>,
    packs_loaded: usize,
    cache: Arc<CompiledPatternCache>,
}

impl PackRegistry {
    /// Registry containing only the bundled pack
    pub fn bundled_only() -> Self {
        Self::load(&[], true).expect("bundled pack always loads")
    }

    /// Load packs from the conventional layout under a single packs root
    ///
    /// `<root>/custom` and `<root>/community` are scanned with their
    /// default ranks; the bundled pack is always included underneath.
    pub fn from_packs_root(packs_root: Option<&Path>) -> Result<Self> {
        let mut roots = Vec::new();
        if let Some(root) = packs_root {
            let custom = root.join("custom");
            if custom.is_dir() {
                roots.push(PackRoot::custom(custom));
            }
            let community = root.join("community");
            if community.is_dir() {
                roots.push(PackRoot::community(community));
            }
        }
        Self::load(&roots, true)
    }

    /// Load packs from explicit roots
    pub fn load(roots: &[PackRoot], include_bundled: bool) -> Result<Self> {
        // (rank, version) candidates per rule id
        let mut candidates: HashMap<String, (u32, Arc<Rule>)> = HashMap::new();
        let mut packs_loaded = 0usize;

        if include_bundled {
            for rule in BUNDLED_RULES.iter() {
                consider(&mut candidates, RANK_BUNDLED, Arc::clone(rule));
            }
            packs_loaded += 1;
            tracing::debug!(
                pack = BUNDLED_PACK_NAME,
                rules = BUNDLED_RULES.len(),
                "bundled pack registered"
            );
        }

        for root in roots {
            for pack_dir in pack_dirs(&root.path)? {
                match RulePack::load(&pack_dir) {
                    Ok(pack) => {
                        tracing::info!(
                            root = %root.name,
                            pack = %pack.name,
                            rules = pack.rules.len(),
                            "pack loaded"
                        );
                        for rule in pack.rules {
                            consider(&mut candidates, root.rank, Arc::new(rule));
                        }
                        packs_loaded += 1;
                    }
                    Err(err) => {
                        tracing::warn!(
                            root = %root.name,
                            dir = %pack_dir.display(),
                            error = %err,
                            "pack skipped"
                        );
                    }
                }
            }
        }

        let mut rules: Vec<Arc<Rule>> =
            candidates.into_values().map(|(_, rule)| rule).collect();
        rules.sort_by(|a, b| a.id.cmp(&b.id));

        tracing::info!(
            rules = rules.len(),
            packs = packs_loaded,
            "rule registry materialized"
        );

        Ok(Self {
            rules: Arc::new(rules),
            packs_loaded,
            cache: Arc::new(CompiledPatternCache::new()),
        })
    }

    /// The effective rule list (pre-materialized; cheap to call)
    pub fn get_all_rules(&self) -> Vec<Arc<Rule>> {
        self.rules.as_ref().clone()
    }

    /// Number of effective rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Number of packs that contributed rules
    pub fn packs_loaded(&self) -> usize {
        self.packs_loaded
    }

    /// The compiled-pattern cache shared by executors over this registry
    pub fn pattern_cache(&self) -> Arc<CompiledPatternCache> {
        Arc::clone(&self.cache)
    }

    /// Eagerly compile every pattern; returns cache counters and the ids
    /// of rules disabled by compile errors
    pub fn precompile_patterns(&self) -> (PatternCacheStats, Vec<String>) {
        let disabled = self.cache.precompile(&self.rules);
        (self.cache.stats(), disabled)
    }

    /// Look up one rule by id
    pub fn get_rule(&self, id: &str) -> Option<Arc<Rule>> {
        self.rules
            .binary_search_by(|r| r.id.as_str().cmp(id))
            .ok()
            .map(|i| Arc::clone(&self.rules[i]))
    }
}

impl RuleRepository for PackRegistry {
    fn all_rules(&self) -> Vec<Arc<Rule>> {
        self.get_all_rules()
    }
}

fn consider(candidates: &mut HashMap<String, (u32, Arc<Rule>)>, rank: u32, rule: Arc<Rule>) {
    match candidates.get(&rule.id) {
        Some((held_rank, held_rule)) => {
            let replace = rank > *held_rank
                || (rank == *held_rank && rule.version > held_rule.version);
            if replace {
                tracing::debug!(
                    rule_id = %rule.id,
                    old_rank = held_rank,
                    new_rank = rank,
                    "rule shadowed"
                );
                candidates.insert(rule.id.clone(), (rank, rule));
            }
        }
        None => {
            candidates.insert(rule.id.clone(), (rank, rule));
        }
    }
}

fn pack_dirs(root: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    if !root.is_dir() {
        tracing::warn!(root = %root.display(), "pack root does not exist");
        return Ok(dirs);
    }
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}
