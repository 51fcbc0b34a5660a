//! Memory accounting and the soft-flush eviction policy.
//!
//! # Accounting
//!
//! Usage is recomputed from the pool contents on every soft flush:
//! `width * height * 3` per decoded image (thumbnails included) and
//! `width * height` per pyramid level. No running counters are kept, so
//! nested builds can never double-count an entry.
//!
//! # Eviction
//!
//! Nothing happens while usage stays at or below `upper_bound +
//! hysteresis`. Above that, entries are evicted until at least
//! `usage - upper_bound` bytes have been freed: first every pyramid level,
//! then decoded images, each pool oldest entry first. Pyramid levels go
//! first because they are pure derivations of cached images and are cheap to
//! rebuild.

use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;

use clap::ValueEnum;
use lru::LruCache;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::CacheLimits;
use crate::raster::{DecodedImage, Footprint, PyramidLevel};

use super::key::{ImageKey, PyramidKey};

/// Bytes per reported megabyte.
pub const BYTES_PER_MB: usize = 1024 * 1024;

pub(crate) type ImagePool = LruCache<ImageKey, Arc<DecodedImage>>;
pub(crate) type PyramidPool = LruCache<PyramidKey, Arc<PyramidLevel>>;

// =============================================================================
// Eviction Order
// =============================================================================

/// Order in which entries within a pool are evicted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EvictionOrder {
    /// Oldest inserted entry first; cache hits do not change the order
    #[default]
    Insertion,

    /// Least recently used entry first; cache hits refresh an entry
    Recency,
}

impl EvictionOrder {
    /// Look up an entry, refreshing its position if the order is recency based.
    pub(crate) fn lookup<K, V>(self, pool: &mut LruCache<K, Arc<V>>, key: &K) -> Option<Arc<V>>
    where
        K: Hash + Eq,
    {
        match self {
            EvictionOrder::Insertion => pool.peek(key).cloned(),
            EvictionOrder::Recency => pool.get(key).cloned(),
        }
    }
}

// =============================================================================
// Usage
// =============================================================================

/// Accounted memory usage of both pools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemoryUsage {
    /// Bytes held by decoded images and thumbnails
    pub image_bytes: usize,

    /// Bytes held by pyramid levels
    pub pyramid_bytes: usize,
}

impl MemoryUsage {
    /// Total accounted bytes.
    pub fn total(&self) -> usize {
        self.image_bytes + self.pyramid_bytes
    }
}

/// Sum of the memory sizes of all entries in a pool.
pub fn pool_usage<K, V>(pool: &LruCache<K, Arc<V>>) -> usize
where
    K: Hash + Eq,
    V: Footprint,
{
    pool.iter().map(|(_, entry)| entry.memory_size()).sum()
}

// =============================================================================
// Flush Report
// =============================================================================

/// Outcome of a soft flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    /// Usage before the flush
    pub used_bytes: usize,

    /// Usage above which eviction starts (upper bound + hysteresis)
    pub purge_target_bytes: usize,

    /// Bytes freed by the flush
    pub purged_bytes: usize,

    /// Pyramid levels evicted
    pub evicted_levels: usize,

    /// Decoded images (including thumbnails) evicted
    pub evicted_images: usize,
}

impl FlushReport {
    /// Usage after the flush.
    pub fn remaining_bytes(&self) -> usize {
        self.used_bytes - self.purged_bytes
    }

    /// Purged amount in whole megabytes (rounded down).
    pub fn purged_mb(&self) -> usize {
        self.purged_bytes / BYTES_PER_MB
    }

    /// Remaining usage in whole megabytes (rounded down).
    pub fn remaining_mb(&self) -> usize {
        self.remaining_bytes() / BYTES_PER_MB
    }

    /// Returns `true` if usage was above the purge target.
    pub fn purge_required(&self) -> bool {
        self.used_bytes > self.purge_target_bytes
    }

    /// Total number of evicted entries.
    pub fn evicted_entries(&self) -> usize {
        self.evicted_levels + self.evicted_images
    }

    /// Status line for progress reporting.
    pub fn message(&self) -> String {
        format!(
            "Purged {} MB from image cache. Current cache usage: {} MB",
            self.purged_mb(),
            self.remaining_mb()
        )
    }
}

// =============================================================================
// Memory Accountant
// =============================================================================

/// Computes pool usage and evicts entries to honor [`CacheLimits`].
#[derive(Debug, Clone, Copy)]
pub struct MemoryAccountant {
    limits: CacheLimits,
}

impl MemoryAccountant {
    /// Create an accountant for the given limits.
    pub fn new(limits: CacheLimits) -> Self {
        Self { limits }
    }

    /// The limits this accountant enforces.
    pub fn limits(&self) -> CacheLimits {
        self.limits
    }

    /// Bytes that must be freed for `usage`, or `None` if usage is within
    /// the purge target.
    pub fn purge_amount(&self, usage: MemoryUsage) -> Option<usize> {
        let used = usage.total();
        if used <= self.limits.purge_target() {
            None
        } else {
            Some(used - self.limits.upper_bound_bytes)
        }
    }

    /// Current usage of both pools.
    pub(crate) fn usage(images: &ImagePool, pyramids: &PyramidPool) -> MemoryUsage {
        MemoryUsage {
            image_bytes: pool_usage(images),
            pyramid_bytes: pool_usage(pyramids),
        }
    }

    /// Evict entries until usage is back under the bound.
    ///
    /// Running out of entries before the target is met is not an error.
    pub(crate) fn soft_flush(
        &self,
        images: &mut ImagePool,
        pyramids: &mut PyramidPool,
    ) -> FlushReport {
        let usage = Self::usage(images, pyramids);
        let mut report = FlushReport {
            used_bytes: usage.total(),
            purge_target_bytes: self.limits.purge_target(),
            ..Default::default()
        };

        debug!(
            "Cache usage: {} MB (images {} MB, pyramids {} MB), purge target {} MB",
            usage.total() / BYTES_PER_MB,
            usage.image_bytes / BYTES_PER_MB,
            usage.pyramid_bytes / BYTES_PER_MB,
            report.purge_target_bytes / BYTES_PER_MB
        );

        let Some(purge_amount) = self.purge_amount(usage) else {
            return report;
        };

        report.evicted_levels = evict_oldest(pyramids, purge_amount, &mut report.purged_bytes);
        report.evicted_images = evict_oldest(images, purge_amount, &mut report.purged_bytes);

        if report.purged_bytes < purge_amount {
            warn!(
                "Purged all cache entries but freed only {} of {} bytes",
                report.purged_bytes, purge_amount
            );
        }

        info!(
            purged_bytes = report.purged_bytes,
            evicted_levels = report.evicted_levels,
            evicted_images = report.evicted_images,
            "{}",
            report.message()
        );

        report
    }
}

/// Pop the oldest entries of `pool` until `freed` reaches `target`.
///
/// Returns the number of evicted entries.
fn evict_oldest<K, V>(pool: &mut LruCache<K, Arc<V>>, target: usize, freed: &mut usize) -> usize
where
    K: Hash + Eq + Display,
    V: Footprint,
{
    let mut evicted = 0;
    while *freed < target {
        let Some((key, entry)) = pool.pop_lru() else {
            break;
        };
        let size = entry.memory_size();
        debug!("Evicting {} {:?} ({} bytes)", V::KIND, key.to_string(), size);
        *freed += size;
        evicted += 1;
    }
    evicted
}
