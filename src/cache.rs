//! Deep link match caching
//!
//! Resolving a path walks the catalog in declaration order. Apps that
//! receive the same links repeatedly (notification taps, shared URLs) can keep
//! the outcome in an LRU cache keyed by the raw path.

use crate::params::ParamMap;
use crate::trace_log;
use lru::LruCache;
use std::num::NonZeroUsize;

/// Cached outcome of matching one path against the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CachedMatch {
    /// Index into the catalog plus the extracted path parameters
    Hit { index: usize, path_params: ParamMap },
    /// No route matched
    Miss,
}

/// Cache performance statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub invalidations: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Match cache with LRU eviction
///
/// Default capacity: 256 paths.
#[derive(Debug)]
pub struct MatchCache {
    entries: LruCache<String, CachedMatch>,
    stats: CacheStats,
}

impl MatchCache {
    pub const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(256) {
        Some(capacity) => capacity,
        None => unreachable!(),
    };

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            entries: LruCache::new(capacity),
            stats: CacheStats::default(),
        }
    }

    pub fn clear(&mut self) {
        trace_log!("Clearing deep link match cache");
        self.entries.clear();
        self.stats.invalidations += 1;
    }

    pub(crate) fn get(&mut self, path: &str) -> Option<CachedMatch> {
        if let Some(entry) = self.entries.get(path) {
            self.stats.hits += 1;
            trace_log!("Match cache hit for path: '{}'", path);
            Some(entry.clone())
        } else {
            self.stats.misses += 1;
            trace_log!("Match cache miss for path: '{}'", path);
            None
        }
    }

    pub(crate) fn insert(&mut self, path: String, entry: CachedMatch) {
        self.entries.push(path, entry);
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = CacheStats::default();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MatchCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MatchCache {
    fn clone(&self) -> Self {
        Self {
            entries: LruCache::new(self.entries.cap()),
            stats: self.stats.clone(),
        }
    }
}
