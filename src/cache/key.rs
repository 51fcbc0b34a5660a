//! Cache keys.
//!
//! The image pool is keyed by [`ImageKey`] (a full image or its thumbnail),
//! the pyramid pool by [`PyramidKey`] (a filename and a level). Both keys
//! also have a deterministic string form, used in logs:
//!
//! | Key                          | String form            |
//! |------------------------------|------------------------|
//! | `ImageKey::Full("a.jpg")`    | `a.jpg`                |
//! | `ImageKey::Thumbnail("a.jpg")` | `a.jpg\0small`       |
//! | `PyramidKey("a.jpg", 2)`     | `a.jpg\0pyr\02`        |
//!
//! A NUL byte cannot appear in a filesystem path, so the string forms of
//! distinct keys never collide.

use std::fmt;
use std::sync::Arc;

/// Suffix appended to a filename to form its thumbnail key string.
pub const THUMBNAIL_SUFFIX: &str = "\0small";

/// Separator between the filename and the level in a pyramid key string.
pub const PYRAMID_SEPARATOR: &str = "\0pyr\0";

/// Key of an entry in the image pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImageKey {
    /// The full-resolution decoded image
    Full(Arc<str>),

    /// The fixed-width thumbnail derived from the full image
    Thumbnail(Arc<str>),
}

impl ImageKey {
    /// Key of the full image for `name`.
    pub fn full(name: impl Into<Arc<str>>) -> Self {
        ImageKey::Full(name.into())
    }

    /// Key of the thumbnail for `name`.
    pub fn thumbnail(name: impl Into<Arc<str>>) -> Self {
        ImageKey::Thumbnail(name.into())
    }

    /// Filename this key refers to.
    pub fn name(&self) -> &str {
        match self {
            ImageKey::Full(name) | ImageKey::Thumbnail(name) => name,
        }
    }

    /// Returns `true` for thumbnail keys.
    pub fn is_thumbnail(&self) -> bool {
        matches!(self, ImageKey::Thumbnail(_))
    }
}

impl fmt::Display for ImageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageKey::Full(name) => f.write_str(name),
            ImageKey::Thumbnail(name) => write!(f, "{}{}", name, THUMBNAIL_SUFFIX),
        }
    }
}

/// Key of an entry in the pyramid pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PyramidKey {
    /// Filename of the source image
    pub name: Arc<str>,

    /// Pyramid level (0 = full resolution grayscale)
    pub level: u32,
}

impl PyramidKey {
    /// Create a new pyramid key.
    pub fn new(name: impl Into<Arc<str>>, level: u32) -> Self {
        Self {
            name: name.into(),
            level,
        }
    }
}

impl fmt::Display for PyramidKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.name, PYRAMID_SEPARATOR, self.level)
    }
}
