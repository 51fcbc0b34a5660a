//! Image decoders.
//!
//! The cache never parses image formats itself. It hands a path to a
//! [`Decoder`] and caches whatever RGB raster comes back.
//!
//! [`ImageFileDecoder`] reads files from the local filesystem with the
//! `image` crate, detecting the format from the file contents. Closures with
//! the right signature are decoders too, which is convenient in tests:
//!
//! ```
//! use std::path::Path;
//! use pyramid_cache::{DecodeError, DecodedImage, Decoder};
//!
//! let decoder = |_path: &Path| -> Result<DecodedImage, DecodeError> {
//!     Ok(DecodedImage::new(1, 1, vec![255, 0, 0]).unwrap())
//! };
//! let img = decoder.decode(Path::new("red.png")).unwrap();
//! assert_eq!(img.pixel(0, 0), [255, 0, 0]);
//! ```

use std::path::Path;

use image::{ImageError, ImageReader};

use crate::error::DecodeError;
use crate::raster::DecodedImage;

/// Turns a path into a decoded RGB raster.
pub trait Decoder {
    /// Decode the image at `path`.
    fn decode(&self, path: &Path) -> Result<DecodedImage, DecodeError>;
}

impl<F> Decoder for F
where
    F: Fn(&Path) -> Result<DecodedImage, DecodeError>,
{
    fn decode(&self, path: &Path) -> Result<DecodedImage, DecodeError> {
        self(path)
    }
}

/// Decoder for image files on the local filesystem.
///
/// Supports the formats enabled on the `image` dependency (JPEG, PNG, TIFF).
/// Every image is converted to 8-bit RGB; alpha is dropped.
#[derive(Debug, Clone, Default)]
pub struct ImageFileDecoder {}

impl ImageFileDecoder {
    /// Create a new file decoder.
    pub fn new() -> Self {
        Self {}
    }
}

impl Decoder for ImageFileDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedImage, DecodeError> {
        let display = path.display().to_string();
        let io_error = |e: std::io::Error| DecodeError::Io {
            path: display.clone(),
            message: e.to_string(),
        };

        let reader = ImageReader::open(path)
            .map_err(io_error)?
            .with_guessed_format()
            .map_err(io_error)?;

        let img = reader.decode().map_err(|e| match e {
            ImageError::IoError(e) => io_error(e),
            other => DecodeError::Format {
                path: display.clone(),
                message: other.to_string(),
            },
        })?;

        Ok(DecodedImage::from(img.into_rgb8()))
    }
}
