//! Decoded value cache.
//!
//! Memoizes successful queries keyed by `(path, target type, tags)` so that a
//! repeated `get` returns without walking or decoding the tree.
//!
//! # Cache Behavior
//!
//! - Cache key: `(normalized path, TypeId, tags)`
//! - Cleared wholesale whenever the snapshot changes (`load` or `reload`)
//! - Every clear starts a new generation; values decoded against an older
//!   generation are rejected on insert, so a query that raced a reload can
//!   never store a stale value
//! - Thread-safe concurrent access via `RwLock`

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

use crate::tags::Tags;

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;

/// Identifies one memoized query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    path: String,
    type_id: TypeId,
    tags: Tags,
}

impl CacheKey {
    pub fn new<T: 'static>(path: impl Into<String>, tags: &Tags) -> Self {
        Self {
            path: path.into(),
            type_id: TypeId::of::<T>(),
            tags: tags.clone(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[derive(Default)]
struct CacheState {
    generation: u64,
    values: HashMap<CacheKey, Arc<dyn Any + Send + Sync>>,
}

/// Memoized decoded values.
pub struct DecodedValueCache {
    state: RwLock<CacheState>,
    stats: RwLock<CacheStatistics>,
}

impl std::fmt::Debug for DecodedValueCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedValueCache")
            .field("generation", &self.generation())
            .field("stats", &self.statistics())
            .finish()
    }
}

impl Default for DecodedValueCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DecodedValueCache {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            stats: RwLock::new(CacheStatistics::default()),
        }
    }

    /// The current generation.
    pub fn generation(&self) -> u64 {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }

    /// Looks up a value and records the request in the statistics.
    pub fn get<T: Clone + Send + Sync + 'static>(&self, key: &CacheKey) -> Option<T> {
        let value = {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            state
                .values
                .get(key)
                .and_then(|value| value.downcast_ref::<T>())
                .cloned()
        };

        let mut stats = self.stats.write().unwrap_or_else(PoisonError::into_inner);
        stats.total_requests += 1;
        if value.is_some() {
            stats.cache_hits += 1;
            debug!("Cache hit: {}", key.path());
        } else {
            stats.cache_misses += 1;
        }
        value
    }

    /// Stores a value decoded against `generation`.
    ///
    /// Returns `false` without storing if the cache has moved to a newer
    /// generation since.
    pub fn insert<T: Send + Sync + 'static>(&self, generation: u64, key: CacheKey, value: T) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.generation != generation {
            debug!(
                "Discarding value for '{}' decoded against generation {} (current {})",
                key.path(),
                generation,
                state.generation
            );
            return false;
        }
        state.values.insert(key, Arc::new(value));
        let entries = state.values.len();
        drop(state);

        self.stats
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .cached_entries = entries;
        true
    }

    /// Drops every entry and moves to `generation`.
    pub fn clear(&self, generation: u64) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.values.clear();
        state.generation = generation;
        drop(state);

        self.stats
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .cached_entries = 0;
        debug!("Cleared decoded value cache (generation {})", generation);
    }

    pub fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the cache statistics.
    pub fn statistics(&self) -> CacheStatistics {
        *self.stats.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cache performance statistics.
///
/// # Examples
///
/// ```
/// use config_resolver::CacheStatistics;
///
/// let stats = CacheStatistics {
///     total_requests: 100,
///     cache_hits: 75,
///     cache_misses: 25,
///     cached_entries: 10,
/// };
///
/// assert_eq!(stats.hit_ratio(), 0.75);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStatistics {
    /// Total number of lookups
    pub total_requests: u64,

    /// Lookups served from the cache
    pub cache_hits: u64,

    /// Lookups that had to decode
    pub cache_misses: u64,

    /// Current number of cached values
    pub cached_entries: usize,
}

impl CacheStatistics {
    /// Hit ratio between 0.0 and 1.0; 0.0 before the first request.
    pub fn hit_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total_requests as f64
        }
    }
}
