//! Tests for the decoded value cache.

use super::*;

// ============================================================================
// Lookups
// ============================================================================

/// Verify a stored value is returned and counted as a hit.
#[test]
fn test_insert_then_get() {
    let cache = DecodedValueCache::new();
    let key = CacheKey::new::<u32>("db.port", &Tags::new());

    assert_eq!(cache.get::<u32>(&key), None);
    assert!(cache.insert(cache.generation(), key.clone(), 5432u32));
    assert_eq!(cache.get::<u32>(&key), Some(5432));

    let stats = cache.statistics();
    assert_eq!(stats.total_requests, 2);
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.cache_misses, 1);
    assert_eq!(stats.cached_entries, 1);
    assert_eq!(stats.hit_ratio(), 0.5);
}

/// Verify type and tags are part of the key.
#[test]
fn test_key_includes_type_and_tags() {
    let cache = DecodedValueCache::new();
    let untagged = Tags::new();
    let prod = Tags::of([("env", "prod")]);
    cache.insert(0, CacheKey::new::<u32>("port", &untagged), 1u32);

    assert_eq!(cache.get::<u64>(&CacheKey::new::<u64>("port", &untagged)), None);
    assert_eq!(cache.get::<u32>(&CacheKey::new::<u32>("port", &prod)), None);
    assert_eq!(cache.get::<u32>(&CacheKey::new::<u32>("port", &untagged)), Some(1));
}

// ============================================================================
// Generations
// ============================================================================

/// Verify clearing drops entries and rejects values from an old generation.
#[test]
fn test_clear_rejects_stale_inserts() {
    let cache = DecodedValueCache::new();
    let key = CacheKey::new::<String>("name", &Tags::new());
    cache.insert(0, key.clone(), "old".to_string());

    cache.clear(1);

    assert!(cache.is_empty());
    assert_eq!(cache.statistics().cached_entries, 0);
    assert!(!cache.insert(0, key.clone(), "stale".to_string()));
    assert_eq!(cache.get::<String>(&key), None);
    assert!(cache.insert(1, key.clone(), "fresh".to_string()));
    assert_eq!(cache.get::<String>(&key).as_deref(), Some("fresh"));
}

#[test]
fn test_hit_ratio_without_requests() {
    assert_eq!(CacheStatistics::default().hit_ratio(), 0.0);
}
