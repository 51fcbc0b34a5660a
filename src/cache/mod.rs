//! Memory-bounded image cache.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       ImageCache                         │
//! │  get_image / get_image_small / get_pyramid_level         │
//! │  ┌──────────────────────┐   ┌─────────────────────────┐  │
//! │  │     image pool       │   │      pyramid pool       │  │
//! │  │  name -> RGB image   │   │  (name, level) -> gray  │  │
//! │  │  name -> thumbnail   │   │                         │  │
//! │  └──────────┬───────────┘   └────────────┬────────────┘  │
//! │             └──────────────┬─────────────┘               │
//! │                            ▼                             │
//! │                   MemoryAccountant                       │
//! │          (soft_flush: pyramids first, then images)       │
//! └───────────┬──────────────────────────────┬───────────────┘
//!             ▼                              ▼
//!      ┌─────────────┐                ┌──────────────┐
//!      │   Decoder   │                │ ProgressSink │
//!      └─────────────┘                └──────────────┘
//! ```
//!
//! # Components
//!
//! - [`ImageCache`]: owns both pools and exposes the public API
//! - [`MemoryAccountant`]: computes usage and runs the eviction policy
//! - [`ImageKey`] / [`PyramidKey`]: pool keys with collision-free string forms
//! - [`ProgressSink`]: receives status messages during slow operations

mod accountant;
mod key;
mod progress;
mod store;

pub use accountant::{
    pool_usage, EvictionOrder, FlushReport, MemoryAccountant, MemoryUsage, BYTES_PER_MB,
};
pub use key::{ImageKey, PyramidKey, PYRAMID_SEPARATOR, THUMBNAIL_SUFFIX};
pub use progress::{ProgressSink, TracingProgress};
pub use store::{CacheStats, ImageCache};
