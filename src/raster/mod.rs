//! In-memory rasters held by the cache.
//!
//! Two raster types live in the cache:
//!
//! - [`DecodedImage`]: an RGB8 image produced by a decoder, or a thumbnail
//!   scaled from one (3 bytes per pixel)
//! - [`PyramidLevel`]: a single-channel 8-bit image derived from a decoded
//!   image (1 byte per pixel)
//!
//! Both are immutable once built. Pixel buffers are stored as [`bytes::Bytes`]
//! so clones share the same allocation.
//!
//! # Pyramid
//!
//! ```text
//! DecodedImage (RGB, w x h)
//!        │ luminance
//!        ▼
//! level 0 (gray, w x h)
//!        │ 2x2 box average
//!        ▼
//! level 1 (gray, ceil(w/2) x ceil(h/2))
//!        │
//!        ▼
//!       ...
//! ```
//!
//! Both types implement [`Footprint`], which is what the cache's memory
//! accounting and eviction code is written against.

mod decoded;
mod pyramid;
mod thumbnail;

pub use decoded::DecodedImage;
pub use pyramid::{reduce_to_next_level, rgb_to_gray, PyramidLevel};
pub use thumbnail::{scale_to_width, thumbnail_height, THUMBNAIL_WIDTH};

/// Kind of cache entry, used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Produced by the decoder (or scaled from such an image)
    Decoded,
    /// Derived from a decoded image, cheap to rebuild
    Derived,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::Decoded => write!(f, "image"),
            EntryKind::Derived => write!(f, "pyramid level"),
        }
    }
}

/// Memory footprint of a cached raster.
///
/// The cost of an entry is `width * height * BYTES_PER_PIXEL`, regardless of
/// allocator overhead or shared buffers.
pub trait Footprint {
    /// Bytes accounted per pixel.
    const BYTES_PER_PIXEL: usize;

    /// What kind of entry this is.
    const KIND: EntryKind;

    /// `(width, height)` in pixels.
    fn dimensions(&self) -> (u32, u32);

    /// Accounted memory size in bytes.
    fn memory_size(&self) -> usize {
        let (width, height) = self.dimensions();
        width as usize * height as usize * Self::BYTES_PER_PIXEL
    }
}
