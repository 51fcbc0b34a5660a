//! # pyramid-cache
//!
//! A memory-bounded, in-process cache for decoded images and the grayscale
//! image pyramids derived from them.
//!
//! Interactive image-alignment tools keep asking for the same images: at full
//! resolution for display, as small thumbnails for lists, and as coarse
//! grayscale pyramid levels for coarse-to-fine matching. This crate decodes
//! each image once, derives thumbnails and pyramid levels lazily, memoizes
//! all of it, and trims the cache back under a configurable memory bound on
//! request.
//!
//! ## Features
//!
//! - **Lazy pyramids**: requesting level N builds and caches every missing
//!   level from 0 to N
//! - **Thumbnails**: 256px-wide, aspect-preserving, cached next to the full
//!   image
//! - **Soft flush with hysteresis**: nothing is evicted until usage exceeds
//!   the bound plus a margin; then pyramid levels go before decoded images,
//!   oldest first
//! - **Pluggable decoding**: any [`Decoder`]; [`ImageFileDecoder`] reads
//!   JPEG, PNG and TIFF files with the `image` crate
//!
//! ## Architecture
//!
//! - [`cache`] - The cache, its keys, memory accounting and progress sinks
//! - [`raster`] - Decoded images, pyramid levels and their derivations
//! - [`decode`] - Decoder trait and the file decoder
//! - [`config`] - Memory limits, configuration sources and CLI arguments
//! - [`error`] - Error types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use pyramid_cache::{ImageCache, ImageFileDecoder, TracingProgress};
//!
//! let limits = HashMap::from([
//!     ("upperBoundBytes".to_string(), "100MB".to_string()),
//!     ("hysteresisBytes".to_string(), "10MB".to_string()),
//! ]);
//!
//! let mut cache = ImageCache::new(ImageFileDecoder::new())
//!     .with_config(limits)
//!     .with_progress(TracingProgress);
//!
//! let level = cache.get_pyramid_level("left.jpg", 2)?;
//! println!("level 2 is {}x{}", level.width(), level.height());
//!
//! cache.soft_flush();
//! # Ok::<(), pyramid_cache::CacheError>(())
//! ```

pub mod cache;
pub mod config;
pub mod decode;
pub mod error;
pub mod raster;

// Re-export commonly used types
pub use cache::{
    CacheStats, EvictionOrder, FlushReport, ImageCache, ImageKey, MemoryAccountant, MemoryUsage,
    ProgressSink, PyramidKey, TracingProgress,
};
pub use config::{
    parse_byte_size, CacheLimits, Config, ConfigSource, EnvConfig, ReportFormat,
    DEFAULT_HYSTERESIS_BYTES, DEFAULT_UPPER_BOUND_BYTES, HYSTERESIS_KEY, UPPER_BOUND_KEY,
};
pub use decode::{Decoder, ImageFileDecoder};
pub use error::{CacheError, ConfigError, DecodeError};
pub use raster::{
    reduce_to_next_level, rgb_to_gray, scale_to_width, DecodedImage, Footprint, PyramidLevel,
    THUMBNAIL_WIDTH,
};
