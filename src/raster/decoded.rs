//! Decoded RGB images.

use bytes::Bytes;
use image::{Rgb, RgbImage};

use super::{EntryKind, Footprint};

/// Bytes per pixel of an RGB8 raster.
const RGB_CHANNELS: usize = 3;

/// An immutable RGB8 image.
///
/// Pixels are stored row-major, 3 bytes per pixel, with no row padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    width: u32,
    height: u32,
    pixels: Bytes,
}

impl DecodedImage {
    /// Wrap an RGB8 pixel buffer.
    ///
    /// Returns `None` if `pixels` is not exactly `width * height * 3` bytes.
    pub fn new(width: u32, height: u32, pixels: impl Into<Bytes>) -> Option<Self> {
        let pixels = pixels.into();
        if pixels.len() != width as usize * height as usize * RGB_CHANNELS {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels,
        })
    }

    /// Image width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGB8 pixel data.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Returns `true` if the image has no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Width divided by height.
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// RGB value at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are outside the image.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let idx = (y as usize * self.width as usize + x as usize) * RGB_CHANNELS;
        [self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2]]
    }

    /// Copy into an owned [`RgbImage`] for use with `image` operations.
    pub fn to_rgb8(&self) -> RgbImage {
        RgbImage::from_fn(self.width, self.height, |x, y| Rgb(self.pixel(x, y)))
    }
}

impl From<RgbImage> for DecodedImage {
    fn from(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            pixels: Bytes::from(image.into_raw()),
        }
    }
}

impl Footprint for DecodedImage {
    const BYTES_PER_PIXEL: usize = RGB_CHANNELS;
    const KIND: EntryKind = EntryKind::Decoded;

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
