//! Windowless driver
//!
//! Feeds a [`Host`] from an [`EventSource`] instead of a window. Used by
//! tests and by batch runs that only need the module's update loop.

use std::collections::VecDeque;
use std::time::Duration;

use kiln_core::time::FRAME_DURATION;
use kiln_module::ModuleLoader;
use kiln_platform::Platform;
use kiln_services::InputEvent;

use crate::host::{FrameOutcome, Host};

/// One frame's worth of events plus the time it took.
pub trait EventSource {
    /// `None` ends the run.
    fn poll_frame(&mut self) -> Option<(Duration, Vec<InputEvent>)>;
}

/// A fixed list of frames.
#[derive(Debug, Clone, Default)]
pub struct ScriptedEvents {
    frames: VecDeque<(Duration, Vec<InputEvent>)>,
}

impl ScriptedEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// A frame with no events at the nominal frame rate.
    pub fn idle(self) -> Self {
        self.frame(Vec::new())
    }

    pub fn idle_frames(mut self, count: usize) -> Self {
        for _ in 0..count {
            self = self.idle();
        }
        self
    }

    pub fn frame(self, events: Vec<InputEvent>) -> Self {
        self.frame_after(FRAME_DURATION, events)
    }

    pub fn frame_after(mut self, delta: Duration, events: Vec<InputEvent>) -> Self {
        self.frames.push_back((delta, events));
        self
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl EventSource for ScriptedEvents {
    fn poll_frame(&mut self) -> Option<(Duration, Vec<InputEvent>)> {
        self.frames.pop_front()
    }
}

/// Drive `host` until the source runs dry or the host stops.
/// Returns the number of frames run, including the one that stopped the host.
pub fn run_headless<L, P, S>(host: &mut Host<L, P>, source: &mut S) -> u64
where
    L: ModuleLoader,
    P: Platform,
    S: EventSource + ?Sized,
{
    let mut frames = 0;
    while let Some((delta, events)) = source.poll_frame() {
        for event in &events {
            host.record_event(event);
        }
        let before = host.counters().frames;
        let outcome = host.run_frame(delta);
        frames += host.counters().frames - before;
        if outcome == FrameOutcome::Stopped {
            break;
        }
    }
    tracing::debug!(frames, "headless run finished");
    frames
}
