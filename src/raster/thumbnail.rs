//! Fixed-width thumbnails.

use image::imageops::{self, FilterType};

use super::DecodedImage;

/// Width of every cached thumbnail, in pixels.
pub const THUMBNAIL_WIDTH: u32 = 256;

/// Height of a `target_width`-wide copy of a `width` x `height` image,
/// keeping the aspect ratio. Never less than 1.
pub fn thumbnail_height(width: u32, height: u32, target_width: u32) -> u32 {
    let aspect = width as f64 / height as f64;
    ((target_width as f64 / aspect).round() as u32).max(1)
}

/// Scale an image isotropically to `target_width` pixels wide.
///
/// The image must not be empty.
pub fn scale_to_width(image: &DecodedImage, target_width: u32) -> DecodedImage {
    let height = thumbnail_height(image.width(), image.height(), target_width);
    let scaled = imageops::resize(&image.to_rgb8(), target_width, height, FilterType::Triangle);
    DecodedImage::from(scaled)
}
