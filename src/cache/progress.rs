//! Progress notifications for slow cache operations.

use tracing::info;

/// Receives human-readable status messages while the cache decodes or
/// derives images.
///
/// `progress` is a completion hint; the cache always passes 0, since none of
/// its operations report partial progress.
pub trait ProgressSink {
    /// Show a status message.
    fn progress_message(&self, message: &str, progress: u32);
}

impl<F> ProgressSink for F
where
    F: Fn(&str, u32),
{
    fn progress_message(&self, message: &str, progress: u32) {
        self(message, progress)
    }
}

/// Forwards progress messages to the `tracing` log at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn progress_message(&self, message: &str, progress: u32) {
        info!(progress, "{}", message);
    }
}
