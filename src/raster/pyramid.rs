//! Grayscale pyramid levels and the pure functions that derive them.
//!
//! Level 0 is the luminance of the full decoded image. Every further level
//! halves both dimensions (rounding up) by averaging non-overlapping 2x2
//! blocks. On odd dimensions the last row/column of blocks only averages the
//! pixels that exist.
//!
//! All arithmetic is integer with round-to-nearest, so rebuilding a level
//! from the same source always yields the same bytes.

use bytes::Bytes;
use image::{GrayImage, Luma};

use super::{DecodedImage, EntryKind, Footprint};

/// A single-channel 8-bit pyramid level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PyramidLevel {
    width: u32,
    height: u32,
    pixels: Bytes,
}

impl PyramidLevel {
    /// Wrap a gray pixel buffer.
    ///
    /// Returns `None` if `pixels` is not exactly `width * height` bytes.
    pub fn new(width: u32, height: u32, pixels: impl Into<Bytes>) -> Option<Self> {
        let pixels = pixels.into();
        if pixels.len() != width as usize * height as usize {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels,
        })
    }

    /// Level width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Level height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw gray pixel data, row-major.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Gray value at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are outside the level.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> u8 {
        self.pixels[y as usize * self.width as usize + x as usize]
    }

    /// Copy into an owned [`GrayImage`], e.g. for saving to disk.
    pub fn to_luma8(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| Luma([self.pixel(x, y)]))
    }
}

impl Footprint for PyramidLevel {
    const BYTES_PER_PIXEL: usize = 1;
    const KIND: EntryKind = EntryKind::Derived;

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Luminance of one RGB pixel: `0.30 R + 0.59 G + 0.11 B`, rounded.
#[inline]
fn luminance([r, g, b]: [u8; 3]) -> u8 {
    // 100 * 255 + 50 fits comfortably in u32 and the quotient is <= 255
    ((30 * r as u32 + 59 * g as u32 + 11 * b as u32 + 50) / 100) as u8
}

/// Build pyramid level 0 from a decoded image.
pub fn rgb_to_gray(image: &DecodedImage) -> PyramidLevel {
    let pixels: Vec<u8> = image
        .pixels()
        .chunks_exact(3)
        .map(|px| luminance([px[0], px[1], px[2]]))
        .collect();

    PyramidLevel {
        width: image.width(),
        height: image.height(),
        pixels: Bytes::from(pixels),
    }
}

/// Reduce a level to the next coarser one by 2x2 box averaging.
pub fn reduce_to_next_level(level: &PyramidLevel) -> PyramidLevel {
    let width = level.width.div_ceil(2);
    let height = level.height.div_ceil(2);
    let mut pixels = Vec::with_capacity(width as usize * height as usize);

    for y in 0..height {
        let sy = y * 2;
        let rows = if sy + 1 < level.height { 2 } else { 1 };

        for x in 0..width {
            let sx = x * 2;
            let cols = if sx + 1 < level.width { 2 } else { 1 };

            let mut sum = 0u32;
            for dy in 0..rows {
                for dx in 0..cols {
                    sum += level.pixel(sx + dx, sy + dy) as u32;
                }
            }
            let count = rows * cols;
            pixels.push(((sum + count / 2) / count) as u8);
        }
    }

    PyramidLevel {
        width,
        height,
        pixels: Bytes::from(pixels),
    }
}
