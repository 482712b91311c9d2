//! Embedding cache
//!
//! A bounded LRU keyed by `(model_id, text_fingerprint)`, where the
//! fingerprint is the first 16 hex characters of the input's SHA-256.
//! On a hit the detector skips tokenization and the embedding forward
//! pass entirely.
//!
//! ## Thread Safety
//!
//! `Arc<RwLock<_>>` interior mutability for the entry map, plus a per-key
//! in-flight lock so two scans of the same text never recompute the same
//! embedding concurrently: the first caller computes under the key's
//! lock, the second finds the cached vector when the lock frees
//! (compute-once-under-lock, read-many).

use raxe_core::short_fingerprint;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

/// Default cache capacity
pub const DEFAULT_CACHE_CAPACITY: usize = 1_000;

/// Cache key: model id plus short text fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    model_id: String,
    fingerprint: String,
}

impl CacheKey {
    /// Build a key for a model/text pair
    pub fn for_text(model_id: &str, text: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
            fingerprint: short_fingerprint(text),
        }
    }
}

/// Cache performance counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbeddingCacheStats {
    /// Lookups that found a live entry
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
    /// Entries evicted to make room
    pub evictions: u64,
}

impl EmbeddingCacheStats {
    /// Hit rate in [0, 1]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Bounded LRU cache of pooled embedding vectors
#[derive(Debug)]
pub struct EmbeddingCache {
    inner: Arc<RwLock<CacheInner>>,
    inflight: Arc<Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>>,
}

#[derive(Debug)]
struct CacheInner {
    capacity: usize,
    entries: HashMap<CacheKey, Arc<Vec<f32>>>,
    // LRU order: oldest first, newest last
    access_order: Vec<CacheKey>,
    stats: EmbeddingCacheStats,
}

impl EmbeddingCache {
    /// Create a cache with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(CacheInner {
                capacity,
                entries: HashMap::new(),
                access_order: Vec::new(),
                stats: EmbeddingCacheStats::default(),
            })),
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Look up an embedding, computing it under the key's lock on a miss
    ///
    /// Concurrent callers with the same key serialize on the per-key
    /// lock; exactly one runs `compute`, the rest read its result.
    pub fn get_or_compute<F, E>(&self, key: CacheKey, compute: F) -> Result<Arc<Vec<f32>>, E>
    where
        F: FnOnce() -> Result<Vec<f32>, E>,
    {
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }

        let key_lock = {
            let mut inflight = self.inflight.lock().unwrap();
            Arc::clone(
                inflight
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        let _guard = key_lock.lock().unwrap();

        // A racing caller may have filled the entry while we waited
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }

        let computed = match compute() {
            Ok(embedding) => Arc::new(embedding),
            Err(err) => {
                self.inflight.lock().unwrap().remove(&key);
                return Err(err);
            }
        };

        // Insert before retiring the in-flight entry: a caller arriving in
        // between either waits on this key's lock or hits the fresh entry
        self.insert(key.clone(), Arc::clone(&computed));
        self.inflight.lock().unwrap().remove(&key);
        Ok(computed)
    }

    /// Look up an embedding, refreshing its LRU position on hit
    pub fn get(&self, key: &CacheKey) -> Option<Arc<Vec<f32>>> {
        let mut inner = self.inner.write().unwrap();

        if let Some(embedding) = inner.entries.get(key).cloned() {
            inner.stats.hits += 1;
            inner.access_order.retain(|k| k != key);
            inner.access_order.push(key.clone());
            Some(embedding)
        } else {
            inner.stats.misses += 1;
            None
        }
    }

    /// Insert an embedding, evicting the least recently used entry at
    /// capacity
    pub fn insert(&self, key: CacheKey, embedding: Arc<Vec<f32>>) {
        let mut inner = self.inner.write().unwrap();

        if inner.capacity == 0 {
            return;
        }

        if inner.entries.contains_key(&key) {
            inner.access_order.retain(|k| k != &key);
        } else if inner.entries.len() >= inner.capacity {
            if let Some(oldest) = inner.access_order.first().cloned() {
                inner.entries.remove(&oldest);
                inner.access_order.remove(0);
                inner.stats.evictions += 1;
            }
        }

        inner.entries.insert(key.clone(), embedding);
        inner.access_order.push(key);
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> EmbeddingCacheStats {
        self.inner.read().unwrap().stats.clone()
    }

    /// Drop all entries, keeping statistics
    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap();
        inner.entries.clear();
        inner.access_order.clear();
    }
}

impl Clone for EmbeddingCache {
    /// Clones share the same underlying cache and statistics
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            inflight: Arc::clone(&self.inflight),
        }
    }
}
