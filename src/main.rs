//! pyramid-cache - Warm an image cache and report its memory usage.
//!
//! Loads every image given on the command line through the cache, builds the
//! requested thumbnails and pyramid levels, and soft-flushes after each image
//! the way an interactive editor would between user actions.

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pyramid_cache::{
    cache::BYTES_PER_MB, CacheLimits, CacheStats, Config, ImageCache, ImageFileDecoder,
    MemoryUsage, ReportFormat, TracingProgress,
};

fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let limits = config.limits();
    info!(
        "Cache bound: {} MB (+{} MB hysteresis), eviction order: {:?}",
        limits.upper_bound_bytes / BYTES_PER_MB,
        limits.hysteresis_bytes / BYTES_PER_MB,
        config.eviction_order
    );

    if let Some(ref dir) = config.dump_dir {
        if let Err(e) = std::fs::create_dir_all(dir) {
            error!("Failed to create {}: {}", dir.display(), e);
            return ExitCode::FAILURE;
        }
    }

    let mut cache = ImageCache::new(ImageFileDecoder::new())
        .with_config(limits)
        .with_progress(TracingProgress)
        .with_eviction_order(config.eviction_order);

    let mut results = Vec::with_capacity(config.images.len());
    let mut purged_bytes = 0;
    let mut evicted_entries = 0;

    for path in &config.images {
        let result = warm_image(&mut cache, &config, path);

        let flush = cache.soft_flush();
        purged_bytes += flush.purged_bytes;
        evicted_entries += flush.evicted_entries();

        results.push(result);
    }

    let report = Report {
        limits,
        images: results,
        usage: cache.memory_usage(),
        stats: cache.stats(),
        purged_bytes,
        evicted_entries,
    };

    let failures = report.images.iter().filter(|r| r.error.is_some()).count();

    match config.format {
        ReportFormat::Text => print_text(&report),
        ReportFormat::Json => match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Failed to serialize report: {}", e);
                return ExitCode::FAILURE;
            }
        },
    }

    if failures > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "pyramid_cache=debug"
    } else {
        "pyramid_cache=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// =============================================================================
// Warming
// =============================================================================

#[derive(Debug, Serialize)]
struct ImageResult {
    path: String,
    width: Option<u32>,
    height: Option<u32>,
    levels: Vec<(u32, u32)>,
    thumbnail: Option<(u32, u32)>,
    error: Option<String>,
}

/// Load one image and everything derived from it.
fn warm_image(cache: &mut ImageCache<ImageFileDecoder>, config: &Config, path: &Path) -> ImageResult {
    let name = path.to_string_lossy().into_owned();
    let mut result = ImageResult {
        path: name.clone(),
        width: None,
        height: None,
        levels: Vec::new(),
        thumbnail: None,
        error: None,
    };

    let image = match cache.get_image(&name) {
        Ok(image) => image,
        Err(e) => {
            error!("{}", e);
            result.error = Some(e.to_string());
            return result;
        }
    };
    result.width = Some(image.width());
    result.height = Some(image.height());

    if config.thumbnails {
        match cache.get_image_small(&name) {
            Ok(small) => result.thumbnail = Some((small.width(), small.height())),
            Err(e) => warn!("No thumbnail for {}: {}", name, e),
        }
    }

    for level in 0..config.levels {
        let built = match cache.get_pyramid_level(&name, level) {
            Ok(built) => built,
            Err(e) => {
                result.error = Some(e.to_string());
                break;
            }
        };
        result.levels.push((built.width(), built.height()));

        if let Some(ref dir) = config.dump_dir {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "image".to_string());
            let out = dir.join(format!("{}_level{}.png", stem, level));
            if let Err(e) = built.to_luma8().save(&out) {
                warn!("Failed to write {}: {}", out.display(), e);
            }
        }
    }

    result
}

// =============================================================================
// Report
// =============================================================================

#[derive(Debug, Serialize)]
struct Report {
    limits: CacheLimits,
    images: Vec<ImageResult>,
    usage: MemoryUsage,
    stats: CacheStats,
    purged_bytes: usize,
    evicted_entries: usize,
}

fn print_text(report: &Report) {
    println!("Image Cache Report");
    println!("══════════════════");
    println!();

    for image in &report.images {
        match (&image.error, image.width, image.height) {
            (Some(e), None, _) => println!("✗ {}: {}", image.path, e),
            (_, Some(w), Some(h)) => {
                println!("✓ {} ({}x{})", image.path, w, h);
                if let Some((tw, th)) = image.thumbnail {
                    println!("    thumbnail: {}x{}", tw, th);
                }
                for (i, (lw, lh)) in image.levels.iter().enumerate() {
                    println!("    level {}: {}x{}", i, lw, lh);
                }
                if let Some(ref e) = image.error {
                    println!("    error: {}", e);
                }
            }
            _ => println!("? {}", image.path),
        }
    }

    println!();
    println!(
        "Usage: {} MB ({} MB images, {} MB pyramids)",
        report.usage.total() / BYTES_PER_MB,
        report.usage.image_bytes / BYTES_PER_MB,
        report.usage.pyramid_bytes / BYTES_PER_MB
    );
    println!(
        "Bound: {} MB + {} MB hysteresis",
        report.limits.upper_bound_bytes / BYTES_PER_MB,
        report.limits.hysteresis_bytes / BYTES_PER_MB
    );
    println!(
        "Purged: {} MB in {} evictions",
        report.purged_bytes / BYTES_PER_MB,
        report.evicted_entries
    );
    println!(
        "Requests: {} hits, {} misses ({:.0}% hit rate), {} decodes, {} derivations",
        report.stats.hits,
        report.stats.misses,
        report.stats.hit_rate() * 100.0,
        report.stats.decodes,
        report.stats.derivations
    );
}
