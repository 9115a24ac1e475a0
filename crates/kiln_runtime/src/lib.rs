//! Kiln Runtime
//!
//! The reload host: owns memory, input and the module binding, runs the
//! frame loop, and swaps in new builds of the application between frames.

pub mod capabilities;
pub mod headless;
pub mod host;

pub use capabilities::CapabilityBridge;
pub use headless::{run_headless, EventSource, ScriptedEvents};
pub use host::{
    FrameOutcome, Host, HostCounters, HostError, HostState, HostSummary, ReloadOutcome,
};
