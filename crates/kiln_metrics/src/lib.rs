//! Kiln Metrics - frame statistics for the host loop
//!
//! Rolling frame and update timings. Everything except [`FrameSummary`]
//! compiles to no-ops unless the `metrics` feature is enabled.
//!
//! ```ignore
//! let mut stats = kiln_metrics::FrameStats::new(120);
//! stats.record_frame(frame_time, update_time);
//! tracing::info!(fps = stats.summary().fps);
//! ```

#[cfg(feature = "metrics")]
mod frame_stats;
#[cfg(feature = "metrics")]
mod window;

#[cfg(feature = "metrics")]
pub use frame_stats::FrameStats;
#[cfg(feature = "metrics")]
pub use window::RollingWindow;

use std::time::Duration;

/// Snapshot of the rolling statistics. All zero when metrics are disabled.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameSummary {
    pub samples: usize,
    pub fps: f64,
    pub frame_avg: Duration,
    pub frame_max: Duration,
    pub update_avg: Duration,
    pub update_max: Duration,
}

// ============================================================================
// No-op stubs when metrics disabled
// ============================================================================

#[cfg(not(feature = "metrics"))]
#[derive(Debug, Default)]
pub struct FrameStats;

#[cfg(not(feature = "metrics"))]
impl FrameStats {
    pub fn new(_capacity: usize) -> Self { Self }
    pub fn record_frame(&mut self, _frame: Duration, _update: Duration) {}
    pub fn summary(&self) -> FrameSummary { FrameSummary::default() }
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_compiles_with_or_without_metrics() {
        let mut stats = super::FrameStats::new(8);
        stats.record_frame(std::time::Duration::from_millis(16), std::time::Duration::from_millis(4));
        let _ = stats.summary();
    }
}
