//! Frame and update timings

use std::time::Duration;

use crate::window::RollingWindow;
use crate::FrameSummary;

pub struct FrameStats {
    frames: RollingWindow<Duration>,
    updates: RollingWindow<Duration>,
}

impl FrameStats {
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: RollingWindow::new(capacity),
            updates: RollingWindow::new(capacity),
        }
    }

    /// `frame` is the wall time since the previous frame, `update` the time
    /// spent inside the module's update call.
    pub fn record_frame(&mut self, frame: Duration, update: Duration) {
        self.frames.push(frame);
        self.updates.push(update);
    }

    pub fn summary(&self) -> FrameSummary {
        let frame_avg = self.frames.average();
        FrameSummary {
            samples: self.frames.len(),
            fps: if frame_avg.is_zero() {
                0.0
            } else {
                1.0 / frame_avg.as_secs_f64()
            },
            frame_avg,
            frame_max: self.frames.max(),
            update_avg: self.updates.average(),
            update_max: self.updates.max(),
        }
    }
}

impl std::fmt::Debug for FrameStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameStats")
            .field("samples", &self.frames.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary() {
        let mut stats = FrameStats::new(4);
        stats.record_frame(Duration::from_millis(20), Duration::from_millis(5));
        stats.record_frame(Duration::from_millis(20), Duration::from_millis(7));

        let summary = stats.summary();
        assert_eq!(summary.samples, 2);
        assert!((summary.fps - 50.0).abs() < 1e-6);
        assert_eq!(summary.update_avg, Duration::from_millis(6));
        assert_eq!(summary.update_max, Duration::from_millis(7));
    }
}
