//! The image cache.
//!
//! [`ImageCache`] owns two pools:
//!
//! - **images**: full-resolution decoded images and their thumbnails
//! - **pyramids**: grayscale pyramid levels, keyed by filename and level
//!
//! Lookups never evict. Memory is only reclaimed by [`ImageCache::flush`] and
//! [`ImageCache::soft_flush`], which callers run between requests. Because
//! every method takes `&mut self`, a flush can never run while an entry is
//! being built.

use std::path::Path;
use std::sync::Arc;

use lru::LruCache;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{CacheLimits, ConfigSource};
use crate::decode::Decoder;
use crate::error::{CacheError, DecodeError};
use crate::raster::{
    reduce_to_next_level, rgb_to_gray, scale_to_width, DecodedImage, PyramidLevel,
    THUMBNAIL_WIDTH,
};

use super::accountant::{
    EvictionOrder, FlushReport, ImagePool, MemoryAccountant, MemoryUsage, PyramidPool,
};
use super::key::{ImageKey, PyramidKey};
use super::progress::ProgressSink;

// =============================================================================
// Statistics
// =============================================================================

/// Counters describing cache activity since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Requests answered from the cache
    pub hits: u64,

    /// Requests that had to decode or derive
    pub misses: u64,

    /// Decoder invocations, including failed ones
    pub decodes: u64,

    /// Thumbnails and pyramid levels built
    pub derivations: u64,

    /// Entries removed by soft flushes
    pub evictions: u64,
}

impl CacheStats {
    /// Fraction of requests answered from the cache (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// =============================================================================
// Image Cache
// =============================================================================

/// Memory-bounded cache of decoded images, thumbnails and pyramid levels.
///
/// Construct one per process and pass it by `&mut` reference to whatever
/// needs images. Entries are handed out as `Arc`s; evicting an entry never
/// invalidates a handle a caller still holds.
///
/// # Example
///
/// ```no_run
/// use pyramid_cache::{CacheLimits, ImageCache, ImageFileDecoder, TracingProgress};
///
/// let mut cache = ImageCache::new(ImageFileDecoder::new())
///     .with_config(CacheLimits::new(64 * 1024 * 1024, 8 * 1024 * 1024))
///     .with_progress(TracingProgress);
///
/// let full = cache.get_image("photos/left.jpg")?;
/// let thumb = cache.get_image_small("photos/left.jpg")?;
/// let coarse = cache.get_pyramid_level("photos/left.jpg", 3)?;
/// assert_eq!(thumb.width(), 256);
/// assert!(coarse.width() <= full.width());
///
/// // Between requests: trim back under the configured bound
/// let report = cache.soft_flush();
/// println!("{}", report.message());
/// # Ok::<(), pyramid_cache::CacheError>(())
/// ```
pub struct ImageCache<D> {
    /// Turns filenames into RGB rasters
    decoder: D,

    /// Full images and thumbnails, in eviction order
    images: ImagePool,

    /// Pyramid levels, in eviction order
    pyramids: PyramidPool,

    /// Source of the memory limits, read on every soft flush
    config: Box<dyn ConfigSource>,

    /// Optional status sink
    progress: Option<Box<dyn ProgressSink>>,

    eviction_order: EvictionOrder,
    stats: CacheStats,
}

impl<D: Decoder> ImageCache<D> {
    /// Create an empty cache with default limits and no progress sink.
    pub fn new(decoder: D) -> Self {
        Self {
            decoder,
            images: LruCache::unbounded(),
            pyramids: LruCache::unbounded(),
            config: Box::new(CacheLimits::default()),
            progress: None,
            eviction_order: EvictionOrder::default(),
            stats: CacheStats::default(),
        }
    }

    /// Read memory limits from `source`.
    pub fn with_config(mut self, source: impl ConfigSource + 'static) -> Self {
        self.config = Box::new(source);
        self
    }

    /// Send status messages to `sink`.
    pub fn with_progress(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.progress = Some(Box::new(sink));
        self
    }

    /// Use `order` to pick eviction victims within each pool.
    pub fn with_eviction_order(mut self, order: EvictionOrder) -> Self {
        self.eviction_order = order;
        self
    }

    /// Replace the configuration source.
    pub fn set_config(&mut self, source: impl ConfigSource + 'static) {
        self.config = Box::new(source);
    }

    /// Replace or remove the progress sink.
    pub fn set_progress_sink(&mut self, sink: Option<Box<dyn ProgressSink>>) {
        self.progress = sink;
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Get the full-resolution image for `name`, decoding it on a miss.
    ///
    /// A failed decode is returned to the caller and nothing is cached, so a
    /// later call tries the decoder again.
    pub fn get_image(&mut self, name: &str) -> Result<Arc<DecodedImage>, CacheError> {
        let key = ImageKey::full(name);
        if let Some(image) = self.eviction_order.lookup(&mut self.images, &key) {
            self.stats.hits += 1;
            debug!("Image cache hit: {}", name);
            return Ok(image);
        }

        self.stats.misses += 1;
        let image = Arc::new(self.load(name)?);
        self.images.put(key, Arc::clone(&image));
        Ok(image)
    }

    /// Get the 256px-wide thumbnail for `name`.
    ///
    /// The full image is loaded (or taken from the cache) first. If that
    /// fails, its error is returned and no thumbnail is derived.
    pub fn get_image_small(&mut self, name: &str) -> Result<Arc<DecodedImage>, CacheError> {
        let key = ImageKey::thumbnail(name);
        if let Some(image) = self.eviction_order.lookup(&mut self.images, &key) {
            self.stats.hits += 1;
            debug!("Thumbnail cache hit: {}", name);
            return Ok(image);
        }

        self.stats.misses += 1;
        self.report(&format!("Scaling image {}", name));

        let full = self.get_image(name)?;
        let small = Arc::new(scale_to_width(&full, THUMBNAIL_WIDTH));
        self.stats.derivations += 1;
        debug!(
            "Created thumbnail for {}: {}x{}",
            name,
            small.width(),
            small.height()
        );

        self.images.put(key, Arc::clone(&small));
        Ok(small)
    }

    /// Get pyramid level `level` of `name`.
    ///
    /// Missing levels from 0 up to `level` are built and cached on the way,
    /// so a later request for any coarser-or-equal level is a hit.
    pub fn get_pyramid_level(
        &mut self,
        name: &str,
        level: u32,
    ) -> Result<Arc<PyramidLevel>, CacheError> {
        let key = PyramidKey::new(name, level);
        if let Some(found) = self.eviction_order.lookup(&mut self.pyramids, &key) {
            self.stats.hits += 1;
            debug!("Pyramid cache hit: {} level {}", name, level);
            return Ok(found);
        }

        self.stats.misses += 1;

        let mut current = self.base_level(name)?;
        for i in 1..=level {
            let key = PyramidKey::new(name, i);
            current = match self.eviction_order.lookup(&mut self.pyramids, &key) {
                Some(cached) => cached,
                None => {
                    self.report(&format!("Creating pyramid image for {}, level {}", name, i));
                    let reduced = Arc::new(reduce_to_next_level(&current));
                    self.stats.derivations += 1;
                    debug!(
                        "Reduced {} level {} to level {}: {}x{}",
                        name,
                        i - 1,
                        i,
                        reduced.width(),
                        reduced.height()
                    );
                    self.pyramids.put(key, Arc::clone(&reduced));
                    reduced
                }
            };
        }

        Ok(current)
    }

    /// Level 0 of `name`, from the cache or converted from the full image.
    fn base_level(&mut self, name: &str) -> Result<Arc<PyramidLevel>, CacheError> {
        let key = PyramidKey::new(name, 0);
        if let Some(cached) = self.eviction_order.lookup(&mut self.pyramids, &key) {
            return Ok(cached);
        }

        let full = self.get_image(name)?;
        self.report(&format!("Creating grayscale version of image {}", name));
        let gray = Arc::new(rgb_to_gray(&full));
        self.stats.derivations += 1;
        debug!("Created level 0 pyramid image for {}", name);

        self.pyramids.put(key, Arc::clone(&gray));
        Ok(gray)
    }

    /// Run the decoder for `name`.
    fn load(&mut self, name: &str) -> Result<DecodedImage, CacheError> {
        self.report(&format!("Loading image {}", name));
        self.stats.decodes += 1;

        let result = self.decoder.decode(Path::new(name)).and_then(|image| {
            if image.is_empty() {
                Err(DecodeError::EmptyImage {
                    path: name.to_string(),
                    width: image.width(),
                    height: image.height(),
                })
            } else {
                Ok(image)
            }
        });

        match result {
            Ok(image) => {
                debug!("Loaded {}: {}x{}", name, image.width(), image.height());
                Ok(image)
            }
            Err(source) => {
                warn!("Can't load image {}: {}", name, source);
                Err(CacheError::Decode {
                    name: name.to_string(),
                    source,
                })
            }
        }
    }

    // =========================================================================
    // Flushing
    // =========================================================================

    /// Remove every entry from both pools.
    pub fn flush(&mut self) {
        debug!(
            "Flushing image cache: {} images, {} pyramid levels",
            self.images.len(),
            self.pyramids.len()
        );
        self.images.clear();
        self.pyramids.clear();
    }

    /// Evict entries until usage is back under the configured bound.
    ///
    /// Limits are read from the configuration source on every call. Does
    /// nothing while usage is within `upper bound + hysteresis`; otherwise
    /// pyramid levels are evicted before images, oldest first, and the
    /// outcome is sent to the progress sink.
    pub fn soft_flush(&mut self) -> FlushReport {
        let limits = CacheLimits::from_source(self.config.as_ref());
        let report = MemoryAccountant::new(limits).soft_flush(&mut self.images, &mut self.pyramids);

        if report.purge_required() {
            self.stats.evictions += report.evicted_entries() as u64;
            self.report(&report.message());
        }

        report
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Returns `true` if the full image for `name` is cached.
    pub fn contains_image(&self, name: &str) -> bool {
        self.images.contains(&ImageKey::full(name))
    }

    /// Returns `true` if the thumbnail for `name` is cached.
    pub fn contains_thumbnail(&self, name: &str) -> bool {
        self.images.contains(&ImageKey::thumbnail(name))
    }

    /// Returns `true` if pyramid level `level` of `name` is cached.
    pub fn contains_pyramid_level(&self, name: &str, level: u32) -> bool {
        self.pyramids.contains(&PyramidKey::new(name, level))
    }

    /// Number of cached images, thumbnails included.
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Number of cached pyramid levels.
    pub fn pyramid_count(&self) -> usize {
        self.pyramids.len()
    }

    /// Returns `true` if both pools are empty.
    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.pyramids.is_empty()
    }

    /// Current accounted memory usage.
    pub fn memory_usage(&self) -> MemoryUsage {
        MemoryAccountant::usage(&self.images, &self.pyramids)
    }

    /// Activity counters.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Limits the next soft flush would use.
    pub fn limits(&self) -> CacheLimits {
        CacheLimits::from_source(self.config.as_ref())
    }

    /// The decoder this cache loads images with.
    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    fn report(&self, message: &str) {
        if let Some(sink) = &self.progress {
            sink.progress_message(message, 0);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
