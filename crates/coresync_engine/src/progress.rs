//! Progress reporting for long-running operations.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

type Callback = Box<dyn Fn(u8, &str) + Send + Sync>;

/// Forwards percentage updates to an optional callback.
///
/// Percentages are clamped to `0..=100` and never go backwards: a report
/// lower than the last one is raised to the current value, so a consumer
/// driving a progress bar can apply updates blindly.
pub struct ProgressSink {
    callback: Option<Callback>,
    last: AtomicU8,
}

impl ProgressSink {
    /// Creates a sink that forwards updates to `callback`.
    #[must_use]
    pub fn new(callback: impl Fn(u8, &str) + Send + Sync + 'static) -> Self {
        ProgressSink {
            callback: Some(Box::new(callback)),
            last: AtomicU8::new(0),
        }
    }

    /// Creates a sink that discards all updates.
    #[must_use]
    pub fn none() -> Self {
        ProgressSink {
            callback: None,
            last: AtomicU8::new(0),
        }
    }

    /// Reports progress, keeping the sequence monotonic.
    pub fn report(&self, percent: u8, message: &str) {
        let capped = percent.min(100);
        let previous = self.last.fetch_max(capped, Ordering::Relaxed);
        let effective = capped.max(previous);
        if let Some(callback) = &self.callback {
            callback(effective, message);
        }
    }

    /// Reports completion at 100 percent.
    pub fn finish(&self, message: &str) {
        self.report(100, message);
    }

    /// Returns the highest percentage reported so far.
    #[must_use]
    pub fn current(&self) -> u8 {
        self.last.load(Ordering::Relaxed)
    }
}

impl Default for ProgressSink {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressSink")
            .field("last", &self.last.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
