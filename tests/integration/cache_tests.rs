//! Cache behavior integration tests.
//!
//! Tests verify:
//! - Repeated requests are answered without decoding again
//! - Thumbnails are derived once and cached next to the full image
//! - Decode failures are surfaced and never cached
//! - Progress messages describe each load and derivation

use std::sync::Arc;

use pyramid_cache::{CacheError, DecodeError, ImageCache, THUMBNAIL_WIDTH};

use super::test_utils::{cache_with_log, gradient_image, MockDecoder};

// =============================================================================
// Memoization
// =============================================================================

#[test]
fn test_get_image_is_idempotent() {
    let decoder = MockDecoder::new().with_gradient("a.jpg", 40, 30);
    let mut cache = ImageCache::new(decoder.clone());

    let first = cache.get_image("a.jpg").unwrap();
    let second = cache.get_image("a.jpg").unwrap();

    assert_eq!(decoder.call_count(), 1);
    assert_eq!(*first, *second);
    assert_eq!(*first, gradient_image(40, 30));
}

#[test]
fn test_images_cached_independently() {
    let decoder = MockDecoder::new()
        .with_gradient("a.jpg", 10, 10)
        .with_gradient("b.jpg", 20, 10);
    let mut cache = ImageCache::new(decoder.clone());

    cache.get_image("a.jpg").unwrap();
    cache.get_image("b.jpg").unwrap();
    cache.get_image("a.jpg").unwrap();
    cache.get_image("b.jpg").unwrap();

    assert_eq!(decoder.decoded_names(), vec!["a.jpg", "b.jpg"]);
    assert_eq!(cache.image_count(), 2);
    assert_eq!(cache.memory_usage().image_bytes, 300 + 600);
}

#[test]
fn test_handles_survive_flush() {
    let decoder = MockDecoder::new().with_gradient("a.jpg", 8, 8);
    let mut cache = ImageCache::new(decoder);

    let image = cache.get_image("a.jpg").unwrap();
    cache.flush();

    assert!(cache.is_empty());
    assert_eq!(image.width(), 8);
    assert_eq!(image.pixels().len(), 8 * 8 * 3);
}

#[test]
fn test_flush_forces_decode_again() {
    let decoder = MockDecoder::new().with_gradient("a.jpg", 8, 8);
    let mut cache = ImageCache::new(decoder.clone());

    let before = cache.get_image("a.jpg").unwrap();
    cache.flush();
    let after = cache.get_image("a.jpg").unwrap();

    assert_eq!(decoder.call_count(), 2);
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(*before, *after);
}

// =============================================================================
// Thumbnails
// =============================================================================

#[test]
fn test_thumbnail_dimensions() {
    let decoder = MockDecoder::new()
        .with_flat("wide.jpg", 1024, 768)
        .with_flat("tall.jpg", 300, 600);
    let mut cache = ImageCache::new(decoder);

    let wide = cache.get_image_small("wide.jpg").unwrap();
    assert_eq!((wide.width(), wide.height()), (THUMBNAIL_WIDTH, 192));

    let tall = cache.get_image_small("tall.jpg").unwrap();
    assert_eq!((tall.width(), tall.height()), (THUMBNAIL_WIDTH, 512));
}

#[test]
fn test_thumbnail_reuses_cached_full_image() {
    let decoder = MockDecoder::new().with_gradient("a.jpg", 512, 512);
    let mut cache = ImageCache::new(decoder.clone());

    cache.get_image("a.jpg").unwrap();
    cache.get_image_small("a.jpg").unwrap();
    cache.get_image_small("a.jpg").unwrap();

    assert_eq!(decoder.call_count(), 1);
    assert_eq!(cache.stats().derivations, 1);
    assert!(cache.contains_image("a.jpg"));
    assert!(cache.contains_thumbnail("a.jpg"));
}

#[test]
fn test_thumbnail_counted_like_full_image() {
    let decoder = MockDecoder::new().with_flat("a.jpg", 512, 256);
    let mut cache = ImageCache::new(decoder);

    cache.get_image_small("a.jpg").unwrap();

    // 512x256x3 full image + 256x128x3 thumbnail
    assert_eq!(cache.memory_usage().image_bytes, 393_216 + 98_304);
    assert_eq!(cache.memory_usage().pyramid_bytes, 0);
}

#[test]
fn test_thumbnail_key_does_not_shadow_other_files() {
    let decoder = MockDecoder::new()
        .with_flat("a.jpg", 512, 512)
        .with_flat("a.jpg_small", 64, 64);
    let mut cache = ImageCache::new(decoder);

    let thumb = cache.get_image_small("a.jpg").unwrap();
    let other = cache.get_image("a.jpg_small").unwrap();

    assert_eq!(thumb.width(), 256);
    assert_eq!(other.width(), 64);
    assert_eq!(cache.image_count(), 3);
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn test_decode_failure_is_surfaced() {
    let decoder = MockDecoder::new().with_broken("bad.jpg");
    let mut cache = ImageCache::new(decoder.clone());

    let err = cache.get_image("bad.jpg").unwrap_err();
    match err {
        CacheError::Decode { name, source } => {
            assert_eq!(name, "bad.jpg");
            assert!(matches!(source, DecodeError::Format { .. }));
        }
    }
    assert!(cache.is_empty());
}

#[test]
fn test_missing_file_is_surfaced() {
    let mut cache = ImageCache::new(MockDecoder::new());

    let err = cache.get_image("nowhere.jpg").unwrap_err();
    assert!(err.to_string().contains("nowhere.jpg"));
    assert_eq!(cache.memory_usage().total(), 0);
}

#[test]
fn test_failed_decode_is_retried_on_next_request() {
    let decoder = MockDecoder::new().with_broken("bad.jpg");
    let mut cache = ImageCache::new(decoder.clone());

    assert!(cache.get_image("bad.jpg").is_err());
    assert!(cache.get_image("bad.jpg").is_err());

    assert_eq!(decoder.calls_for("bad.jpg"), 2);
    assert_eq!(cache.stats().hits, 0);
}

#[test]
fn test_thumbnail_of_failed_image_returns_same_error() {
    let decoder = MockDecoder::new().with_broken("bad.jpg");
    let mut cache = ImageCache::new(decoder.clone());

    let err = cache.get_image_small("bad.jpg").unwrap_err();
    assert_eq!(err.image_name(), "bad.jpg");
    assert!(!cache.contains_thumbnail("bad.jpg"));
    assert_eq!(decoder.call_count(), 1);
}

#[test]
fn test_failure_does_not_disturb_other_entries() {
    let decoder = MockDecoder::new()
        .with_gradient("good.jpg", 16, 16)
        .with_broken("bad.jpg");
    let mut cache = ImageCache::new(decoder);

    let good = cache.get_image("good.jpg").unwrap();
    assert!(cache.get_pyramid_level("bad.jpg", 2).is_err());

    assert!(cache.contains_image("good.jpg"));
    assert_eq!(*cache.get_image("good.jpg").unwrap(), *good);
}

// =============================================================================
// Progress
// =============================================================================

#[test]
fn test_progress_for_load_and_thumbnail() {
    let decoder = MockDecoder::new().with_gradient("a.jpg", 300, 200);
    let (mut cache, log) = cache_with_log(decoder);

    cache.get_image_small("a.jpg").unwrap();

    assert_eq!(
        log.messages(),
        vec!["Scaling image a.jpg", "Loading image a.jpg"]
    );
    assert!(log.progress_values().iter().all(|&p| p == 0));
}

#[test]
fn test_no_progress_on_hits() {
    let decoder = MockDecoder::new().with_gradient("a.jpg", 30, 20);
    let (mut cache, log) = cache_with_log(decoder);

    cache.get_image("a.jpg").unwrap();
    cache.get_pyramid_level("a.jpg", 1).unwrap();
    log.clear();

    cache.get_image("a.jpg").unwrap();
    cache.get_pyramid_level("a.jpg", 0).unwrap();
    cache.get_pyramid_level("a.jpg", 1).unwrap();

    assert!(log.messages().is_empty());
}

#[test]
fn test_cache_without_progress_sink() {
    let decoder = MockDecoder::new().with_gradient("a.jpg", 30, 20);
    let mut cache = ImageCache::new(decoder);

    // Nothing to observe; just must not fail
    cache.get_image_small("a.jpg").unwrap();
    cache.get_pyramid_level("a.jpg", 3).unwrap();
    cache.soft_flush();
}
