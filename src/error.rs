use thiserror::Error;

/// Errors reported by an image decoder.
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    /// The source could not be read
    #[error("Cannot read {path}: {message}")]
    Io { path: String, message: String },

    /// The source was read but is not a decodable image
    #[error("Cannot decode {path}: {message}")]
    Format { path: String, message: String },

    /// The decoder produced a raster without pixels
    #[error("Decoded image {path} is empty ({width}x{height})")]
    EmptyImage {
        path: String,
        width: u32,
        height: u32,
    },
}

/// Errors returned by the image cache.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// Loading the source image failed; nothing was cached
    #[error("Failed to load image {name}: {source}")]
    Decode {
        name: String,
        #[source]
        source: DecodeError,
    },
}

impl CacheError {
    /// Name of the image the failed request was for.
    pub fn image_name(&self) -> &str {
        match self {
            CacheError::Decode { name, .. } => name,
        }
    }
}

/// Errors raised while reading cache limits from a configuration source.
///
/// These are never fatal: the cache logs them and falls back to defaults.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A key is present but its value is not a byte count
    #[error("Invalid value for {key}: {value:?} ({message})")]
    Invalid {
        key: &'static str,
        value: String,
        message: String,
    },
}
