//! Soft-flush integration tests.
//!
//! Tests verify:
//! - Usage ends within the bound after a soft flush
//! - Pyramid levels are evicted before any decoded image
//! - Within a pool, the oldest entry goes first (or the least recently used
//!   one with recency ordering)
//! - Limits are read from the configuration source at flush time

use std::collections::HashMap;

use pyramid_cache::{CacheLimits, EvictionOrder, ImageCache, HYSTERESIS_KEY, UPPER_BOUND_KEY};

use super::test_utils::{cache_with_log, limits, MockDecoder};

/// Image 30000 bytes, level 0 10000 bytes, level 1 2500 bytes.
const IMAGE_BYTES: usize = 100 * 100 * 3;
const LEVELS_BYTES: usize = 100 * 100 + 50 * 50;

fn decoder_with(names: &[&str]) -> MockDecoder {
    names
        .iter()
        .fold(MockDecoder::new(), |d, name| d.with_gradient(name, 100, 100))
}

// =============================================================================
// Bounds
// =============================================================================

#[test]
fn test_single_large_image_is_evicted_entirely() {
    let decoder = MockDecoder::new().with_flat("big.jpg", 1000, 1000);
    let (cache, log) = cache_with_log(decoder);
    let mut cache = cache.with_config(limits(1_000_000, 0));

    cache.get_image("big.jpg").unwrap();
    assert_eq!(cache.memory_usage().total(), 3_000_000);
    log.clear();

    let report = cache.soft_flush();

    assert_eq!(report.used_bytes, 3_000_000);
    assert_eq!(report.purged_bytes, 3_000_000);
    assert_eq!(report.evicted_images, 1);
    assert_eq!(cache.memory_usage().total(), 0);
    assert!(cache.is_empty());
    assert_eq!(
        log.messages(),
        vec!["Purged 2 MB from image cache. Current cache usage: 0 MB"]
    );
}

#[test]
fn test_usage_within_bound_after_flush() {
    let names = ["a.jpg", "b.jpg", "c.jpg", "d.jpg", "e.jpg"];

    for (upper, hysteresis) in [(0, 0), (20_000, 5_000), (50_000, 0), (70_000, 30_000)] {
        let mut cache =
            ImageCache::new(decoder_with(&names)).with_config(limits(upper, hysteresis));
        for name in names {
            cache.get_pyramid_level(name, 1).unwrap();
            cache.get_image_small(name).unwrap();
        }

        let before = cache.memory_usage().total();
        let report = cache.soft_flush();
        let after = cache.memory_usage().total();

        assert_eq!(report.remaining_bytes(), after);
        assert!(after <= upper + hysteresis, "{} > {} + {}", after, upper, hysteresis);
        assert!(after < before);
    }
}

#[test]
fn test_no_eviction_within_hysteresis() {
    let (cache, log) = cache_with_log(decoder_with(&["a.jpg"]));
    // 42500 used; bound 40000 + 5000 margin
    let mut cache = cache.with_config(limits(40_000, 5_000));

    cache.get_pyramid_level("a.jpg", 1).unwrap();
    log.clear();

    let report = cache.soft_flush();

    assert!(!report.purge_required());
    assert_eq!(report.purged_bytes, 0);
    assert_eq!(cache.memory_usage().total(), IMAGE_BYTES + LEVELS_BYTES);
    assert!(log.messages().is_empty());
}

#[test]
fn test_flush_on_empty_cache() {
    let mut cache = ImageCache::new(MockDecoder::new()).with_config(limits(0, 0));

    let report = cache.soft_flush();
    assert_eq!(report.used_bytes, 0);
    assert_eq!(report.evicted_entries(), 0);

    cache.flush();
    assert!(cache.is_empty());
}

// =============================================================================
// Order
// =============================================================================

#[test]
fn test_all_pyramids_evicted_before_images() {
    let mut cache = ImageCache::new(decoder_with(&["a.jpg", "b.jpg"]))
        .with_config(limits(40_000, 0));

    cache.get_pyramid_level("a.jpg", 1).unwrap();
    cache.get_pyramid_level("b.jpg", 1).unwrap();
    assert_eq!(
        cache.memory_usage().total(),
        2 * (IMAGE_BYTES + LEVELS_BYTES)
    );

    // Must free 45000: every level (25000), then the oldest image
    let report = cache.soft_flush();

    assert_eq!(report.evicted_levels, 4);
    assert_eq!(report.evicted_images, 1);
    assert_eq!(cache.pyramid_count(), 0);
    assert!(!cache.contains_image("a.jpg"));
    assert!(cache.contains_image("b.jpg"));
    assert_eq!(cache.memory_usage().total(), IMAGE_BYTES);
}

#[test]
fn test_pyramids_evicted_oldest_first() {
    let mut cache = ImageCache::new(decoder_with(&["a.jpg", "b.jpg"]));

    cache.get_pyramid_level("a.jpg", 1).unwrap();
    cache.get_pyramid_level("b.jpg", 1).unwrap();

    // 85000 used; bound 72500 requires 12500: a's level 0 and level 1
    cache.set_config(limits(72_500, 0));
    let report = cache.soft_flush();

    assert_eq!(report.evicted_levels, 2);
    assert_eq!(report.evicted_images, 0);
    assert!(!cache.contains_pyramid_level("a.jpg", 0));
    assert!(!cache.contains_pyramid_level("a.jpg", 1));
    assert!(cache.contains_pyramid_level("b.jpg", 0));
    assert!(cache.contains_pyramid_level("b.jpg", 1));
}

#[test]
fn test_thumbnail_evicted_in_insertion_order() {
    let decoder = MockDecoder::new()
        .with_flat("a.jpg", 256, 256)
        .with_flat("b.jpg", 256, 256);
    let mut cache = ImageCache::new(decoder);

    // Insertion order: a, a's thumbnail, b
    cache.get_image_small("a.jpg").unwrap();
    cache.get_image("b.jpg").unwrap();

    let each = 256 * 256 * 3;
    cache.set_config(limits(2 * each, 0));
    let report = cache.soft_flush();

    assert_eq!(report.evicted_images, 1);
    assert!(!cache.contains_image("a.jpg"));
    assert!(cache.contains_thumbnail("a.jpg"));
    assert!(cache.contains_image("b.jpg"));
}

#[test]
fn test_insertion_order_ignores_hits() {
    let mut cache = ImageCache::new(decoder_with(&["a.jpg", "b.jpg", "c.jpg"]));
    for name in ["a.jpg", "b.jpg", "c.jpg"] {
        cache.get_image(name).unwrap();
    }
    cache.get_image("a.jpg").unwrap();

    cache.set_config(limits(2 * IMAGE_BYTES, 0));
    cache.soft_flush();

    assert!(!cache.contains_image("a.jpg"));
    assert!(cache.contains_image("b.jpg"));
    assert!(cache.contains_image("c.jpg"));
}

#[test]
fn test_recency_order_keeps_recently_used() {
    let mut cache = ImageCache::new(decoder_with(&["a.jpg", "b.jpg", "c.jpg"]))
        .with_eviction_order(EvictionOrder::Recency);
    for name in ["a.jpg", "b.jpg", "c.jpg"] {
        cache.get_image(name).unwrap();
    }
    cache.get_image("a.jpg").unwrap();

    cache.set_config(limits(2 * IMAGE_BYTES, 0));
    cache.soft_flush();

    assert!(cache.contains_image("a.jpg"));
    assert!(!cache.contains_image("b.jpg"));
    assert!(cache.contains_image("c.jpg"));
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_limits_read_on_every_flush() {
    let mut cache = ImageCache::new(decoder_with(&["a.jpg", "b.jpg"]));
    cache.get_image("a.jpg").unwrap();
    cache.get_image("b.jpg").unwrap();

    // Defaults (200MB) leave everything in place
    assert_eq!(cache.soft_flush().evicted_entries(), 0);

    cache.set_config(CacheLimits::new(IMAGE_BYTES, 0));
    assert_eq!(cache.soft_flush().evicted_entries(), 1);

    cache.set_config(CacheLimits::new(0, 0));
    assert_eq!(cache.soft_flush().evicted_entries(), 1);
    assert!(cache.is_empty());
    assert_eq!(cache.stats().evictions, 2);
}

#[test]
fn test_invalid_limit_falls_back_to_default() {
    let mut cache = ImageCache::new(decoder_with(&["a.jpg"]));
    cache.get_image("a.jpg").unwrap();

    let config = HashMap::from([(UPPER_BOUND_KEY.to_string(), "not a number".to_string())]);
    cache.set_config(config);

    assert_eq!(cache.limits(), CacheLimits::default());
    assert_eq!(cache.soft_flush().evicted_entries(), 0);
    assert!(cache.contains_image("a.jpg"));
}

#[test]
fn test_size_suffixes_in_configuration() {
    let decoder = MockDecoder::new().with_flat("big.jpg", 1024, 1024);
    let mut cache = ImageCache::new(decoder).with_config(HashMap::from([
        (UPPER_BOUND_KEY.to_string(), "2MB".to_string()),
        (HYSTERESIS_KEY.to_string(), "512KB".to_string()),
    ]));

    cache.get_image("big.jpg").unwrap();
    let report = cache.soft_flush();

    assert_eq!(report.purge_target_bytes, 2 * 1024 * 1024 + 512 * 1024);
    assert_eq!(report.evicted_images, 1);
    assert_eq!(report.purged_mb(), 3);
}
