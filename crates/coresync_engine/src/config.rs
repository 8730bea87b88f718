//! Engine configuration.

/// Tuning knobs for pull, detection and push.
///
/// The defaults suit a small-to-medium remote store; callers override
/// individual fields with the `with_*` builders.
///
/// ```
/// use coresync_engine::SyncConfig;
///
/// let config = SyncConfig::new().with_page_size(500);
/// assert_eq!(config.page_size, 500);
/// ```
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Records requested per listing page when the query does not set one.
    pub page_size: u32,
    /// Half-width of the square polygon generated from a point when the
    /// local geometry kind requires an area, in coordinate units.
    pub point_buffer: f64,
}

impl SyncConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        SyncConfig {
            page_size: 100,
            point_buffer: 1e-4,
        }
    }

    /// Sets the default listing page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets the point-to-polygon buffer distance.
    #[must_use]
    pub fn with_point_buffer(mut self, buffer: f64) -> Self {
        self.point_buffer = buffer;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}
