//! Frame pacing
//!
//! Wall-clock frame timing for the host loop. Deltas are clamped so a long
//! stall (debugger break, window drag, a slow reload) does not hand the
//! application one enormous step.

use std::time::{Duration, Instant};

/// Target frame rate (60 Hz = 16.666ms per frame)
pub const FRAME_RATE_HZ: u32 = 60;
pub const FRAME_DURATION: Duration = Duration::from_micros(16_666); // ~16.666ms

/// Largest delta a single `tick` reports.
pub const MAX_FRAME_DELTA: Duration = Duration::from_millis(250);

/// Frame clock
pub struct FrameClock {
    start: Instant,
    last: Instant,
    frames: u64,
}

impl FrameClock {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last: now,
            frames: 0,
        }
    }

    /// Time since the previous tick, clamped to [`MAX_FRAME_DELTA`].
    pub fn tick(&mut self) -> Duration {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> Duration {
        let delta = now.saturating_duration_since(self.last);
        self.last = now;
        self.frames += 1;
        delta.min(MAX_FRAME_DELTA)
    }

    /// When the next frame should begin.
    pub fn next_deadline(&self) -> Instant {
        self.last + FRAME_DURATION
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn total(&self) -> Duration {
        self.last.saturating_duration_since(self.start)
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_clamps_long_stalls() {
        let mut clock = FrameClock::new();
        let later = clock.last + Duration::from_secs(5);
        assert_eq!(clock.tick_at(later), MAX_FRAME_DELTA);
        assert_eq!(clock.frames(), 1);
        assert_eq!(clock.total(), Duration::from_secs(5));
    }

    #[test]
    fn test_deadline_follows_last_tick() {
        let mut clock = FrameClock::new();
        let now = clock.last + Duration::from_millis(10);
        assert_eq!(clock.tick_at(now), Duration::from_millis(10));
        assert_eq!(clock.next_deadline(), now + FRAME_DURATION);
    }
}
