//! Progress reporting for long-running multi-track operations.
//!
//! Operations like [`reverse`](crate::ops::reverse) count the samples their
//! readers have consumed and hand a [`ProgressInfo`] to a
//! [`ProgressReporter`] after every block step.

use std::time::Duration;

use crossbeam::channel::Sender;

#[cfg(feature = "progress-tracking")]
use indicatif::{ProgressBar, ProgressStyle};

/// Snapshot of the progress of an operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressInfo {
    /// Name of the running operation.
    pub operation: String,
    /// Samples processed so far, summed over all tracks.
    pub processed: u64,
    /// Total samples the operation will process.
    pub total: u64,
    /// Time elapsed since the operation started.
    pub elapsed: Duration,
}

impl ProgressInfo {
    /// Progress as a fraction in `0.0..=1.0`.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.processed as f64 / self.total as f64).min(1.0)
    }

    /// Estimated time until completion, `None` before anything was processed.
    pub fn estimated_remaining(&self) -> Option<Duration> {
        if self.processed == 0 || self.total == 0 {
            return None;
        }
        let per_sample = self.elapsed.as_secs_f64() / self.processed as f64;
        let left = self.total.saturating_sub(self.processed) as f64;
        Some(Duration::from_secs_f64(per_sample * left))
    }
}

/// Receives progress updates of an operation.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress snapshot.
    fn report_progress(&self, info: &ProgressInfo);

    /// Report that an operation over `total` samples has started.
    fn start(&self, operation: &str, total: u64) {
        let _ = (operation, total);
    }

    /// Report that the operation has finished or was cancelled.
    fn finish(&self, elapsed: Duration) {
        let _ = elapsed;
    }
}

/// Reporter that does nothing.
#[derive(Debug, Default)]
pub struct NullProgressReporter;

impl ProgressReporter for NullProgressReporter {
    fn report_progress(&self, _info: &ProgressInfo) {}
}

/// Reporter that emits `tracing` events.
#[derive(Debug, Default)]
pub struct LogProgressReporter;

impl ProgressReporter for LogProgressReporter {
    fn report_progress(&self, info: &ProgressInfo) {
        tracing::debug!(
            operation = %info.operation,
            processed = info.processed,
            total = info.total,
            percent = info.fraction() * 100.0,
            "progress"
        );
    }

    fn start(&self, operation: &str, total: u64) {
        tracing::info!(operation, total, "operation started");
    }

    fn finish(&self, elapsed: Duration) {
        tracing::info!(elapsed_ms = elapsed.as_millis() as u64, "operation finished");
    }
}

/// Reporter that forwards every snapshot through a channel.
///
/// Updates are dropped silently once the receiving side is gone.
#[derive(Debug, Clone)]
pub struct ChannelProgressReporter {
    sender: Sender<ProgressInfo>,
}

impl ChannelProgressReporter {
    /// Create a reporter sending into `sender`.
    pub const fn new(sender: Sender<ProgressInfo>) -> Self {
        Self { sender }
    }
}

impl ProgressReporter for ChannelProgressReporter {
    fn report_progress(&self, info: &ProgressInfo) {
        let _ = self.sender.send(info.clone());
    }
}

/// Reporter calling a closure for every snapshot.
#[derive(Debug)]
pub struct CallbackProgressReporter<F> {
    callback: F,
}

impl<F> CallbackProgressReporter<F>
where
    F: Fn(&ProgressInfo) + Send + Sync,
{
    /// Create a new callback reporter.
    pub const fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for CallbackProgressReporter<F>
where
    F: Fn(&ProgressInfo) + Send + Sync,
{
    fn report_progress(&self, info: &ProgressInfo) {
        (self.callback)(info);
    }
}

/// Progress bar on the terminal using indicatif.
#[cfg(feature = "progress-tracking")]
#[derive(Debug)]
pub struct ProgressBarReporter {
    bar: ProgressBar,
}

#[cfg(feature = "progress-tracking")]
impl ProgressBarReporter {
    /// Create a hidden bar, sized when the operation starts.
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg} ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Self { bar }
    }

    /// Create a bar with a custom style.
    pub fn with_style(style: ProgressStyle) -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(style);
        Self { bar }
    }
}

#[cfg(feature = "progress-tracking")]
impl Default for ProgressBarReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "progress-tracking")]
impl ProgressReporter for ProgressBarReporter {
    fn report_progress(&self, info: &ProgressInfo) {
        self.bar.set_position(info.processed);
    }

    fn start(&self, operation: &str, total: u64) {
        self.bar.set_length(total);
        self.bar.set_message(operation.to_string());
    }

    fn finish(&self, _elapsed: Duration) {
        self.bar.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::unbounded;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn info(processed: u64, total: u64) -> ProgressInfo {
        ProgressInfo {
            operation: "test".to_string(),
            processed,
            total,
            elapsed: Duration::from_secs(2),
        }
    }

    #[test]
    fn test_fraction() {
        assert_eq!(info(25, 100).fraction(), 0.25);
        assert_eq!(info(0, 0).fraction(), 1.0);
        assert_eq!(info(150, 100).fraction(), 1.0);
    }

    #[test]
    fn test_estimated_remaining() {
        assert_eq!(info(0, 100).estimated_remaining(), None);
        let eta = info(50, 100).estimated_remaining().unwrap();
        assert!((eta.as_secs_f64() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_channel_reporter() {
        let (tx, rx) = unbounded();
        let reporter = ChannelProgressReporter::new(tx);
        reporter.report_progress(&info(10, 20));
        assert_eq!(rx.try_recv().unwrap().processed, 10);
        drop(rx);
        // no receiver left, must not panic
        reporter.report_progress(&info(20, 20));
    }

    #[test]
    fn test_callback_reporter() {
        let last = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&last);
        let reporter = CallbackProgressReporter::new(move |i: &ProgressInfo| {
            seen.store(i.processed, Ordering::Relaxed);
        });
        reporter.report_progress(&info(7, 10));
        assert_eq!(last.load(Ordering::Relaxed), 7);
    }

    #[test]
    fn test_log_and_null_reporters() {
        for reporter in [
            Box::new(LogProgressReporter) as Box<dyn ProgressReporter>,
            Box::new(NullProgressReporter),
        ] {
            reporter.start("test", 10);
            reporter.report_progress(&info(5, 10));
            reporter.finish(Duration::from_millis(1));
        }
    }
}
