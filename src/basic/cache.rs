//! Compilation cache
//!
//! Content-addressed LRU over (source, target) pairs. Linting runs on every
//! keystroke, and most keystrokes are followed by an undo or an identical
//! re-lint, so serving the previous result by hash makes recompiles of
//! unchanged sources effectively free. Only zero-error results are stored:
//! a hit always means "known good, reuse directly".

use std::collections::HashMap;
use std::time::Instant;

use tracing::debug;

use crate::basic::diagnostics::Diagnostic;
use crate::basic::emit::Target;

/// Default number of cached compilations.
pub const DEFAULT_CAPACITY: usize = 64;

/// A cached compilation result.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub code: String,
    pub diagnostics: Vec<Diagnostic>,
    pub created: Instant,
}

/// Counters exposed for hosts and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

/// CRC-64 of `source || 0xFF || target`. Collisions are accepted as
/// negligible for editor-lifetime caching; this is not a security boundary.
fn content_key(source: &str, target: Target) -> u64 {
    let mut bytes = Vec::with_capacity(source.len() + 8);
    bytes.extend_from_slice(source.as_bytes());
    bytes.push(0xFF);
    bytes.extend_from_slice(target.as_str().as_bytes());
    crc::crc64::checksum_ecma(&bytes)
}

/// LRU cache over compile results. Owned by the compiler facade; there is
/// no process-global instance.
pub struct CompileCache {
    entries: HashMap<u64, CacheEntry>,
    /// Keys ordered least recently used first.
    order: Vec<u64>,
    capacity: usize,
    hits: u64,
    misses: u64,
}

impl CompileCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
            capacity: capacity.max(1),
            hits: 0,
            misses: 0,
        }
    }

    /// Look up a previous compile of exactly this (source, target) pair,
    /// refreshing its recency on a hit.
    pub fn get(&mut self, source: &str, target: Target) -> Option<&CacheEntry> {
        let key = content_key(source, target);
        if self.entries.contains_key(&key) {
            self.hits += 1;
            self.touch(key);
            debug!(emit_target = %target, "compile cache hit");
            self.entries.get(&key)
        } else {
            self.misses += 1;
            None
        }
    }

    /// Store a compile result, evicting the least recently used entry once
    /// over capacity. Callers only store error-free results.
    pub fn set(&mut self, source: &str, target: Target, code: String, diagnostics: Vec<Diagnostic>) {
        let key = content_key(source, target);
        let entry = CacheEntry {
            code,
            diagnostics,
            created: Instant::now(),
        };
        if self.entries.insert(key, entry).is_none() {
            self.order.push(key);
        } else {
            self.touch(key);
        }
        while self.entries.len() > self.capacity {
            let oldest = self.order.remove(0);
            self.entries.remove(&oldest);
            debug!("compile cache evicted one entry");
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            capacity: self.capacity,
            hits: self.hits,
            misses: self.misses,
        }
    }

    /// Move `key` to the most recently used end.
    fn touch(&mut self, key: u64) {
        if let Some(index) = self.order.iter().position(|&k| k == key) {
            self.order.remove(index);
        }
        self.order.push(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_code(cache: &mut CompileCache, source: &str) -> Option<String> {
        cache.get(source, Target::Node).map(|e| e.code.clone())
    }

    #[test]
    fn test_miss_then_hit() {
        let mut cache = CompileCache::new(4);
        assert!(cache.get("PRINT 1", Target::Node).is_none());
        cache.set("PRINT 1", Target::Node, "code".into(), Vec::new());
        let entry = cache.get("PRINT 1", Target::Node).expect("hit");
        assert_eq!(entry.code, "code");
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_target_is_part_of_the_key() {
        let mut cache = CompileCache::new(4);
        cache.set("PRINT 1", Target::Node, "node code".into(), Vec::new());
        assert!(cache.get("PRINT 1", Target::Web).is_none());
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let mut cache = CompileCache::new(2);
        cache.set("a", Target::Node, "A".into(), Vec::new());
        cache.set("b", Target::Node, "B".into(), Vec::new());
        // Touch "a" so "b" is the eviction candidate
        assert!(entry_code(&mut cache, "a").is_some());
        cache.set("c", Target::Node, "C".into(), Vec::new());
        assert!(entry_code(&mut cache, "b").is_none());
        assert!(entry_code(&mut cache, "a").is_some());
        assert!(entry_code(&mut cache, "c").is_some());
        assert_eq!(cache.stats().entries, 2);
    }

    #[test]
    fn test_set_same_key_replaces() {
        let mut cache = CompileCache::new(2);
        cache.set("a", Target::Node, "old".into(), Vec::new());
        cache.set("a", Target::Node, "new".into(), Vec::new());
        assert_eq!(entry_code(&mut cache, "a").unwrap(), "new");
        assert_eq!(cache.stats().entries, 1);
    }

    #[test]
    fn test_clear_is_safe() {
        let mut cache = CompileCache::new(2);
        cache.set("a", Target::Node, "A".into(), Vec::new());
        cache.clear();
        assert_eq!(cache.stats().entries, 0);
        assert!(entry_code(&mut cache, "a").is_none());
    }

    #[test]
    fn test_capacity_floor_of_one() {
        let mut cache = CompileCache::new(0);
        cache.set("a", Target::Node, "A".into(), Vec::new());
        assert_eq!(cache.stats().entries, 1);
    }
}
