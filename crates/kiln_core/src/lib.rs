//! Kiln Core
//!
//! The memory disciplines shared by the host and every reloadable module:
//! - Bump-pointer arenas with bulk reset
//! - A pool of nested, frame-scoped scratch arenas
//! - Frame pacing and clock
//! - Contract-violation reporting

pub mod arena;
pub mod contract;
pub mod scratch;
pub mod time;

pub use arena::{Arena, ArenaError, ArenaFlags};
pub use scratch::{Scratch, ScratchError, ScratchId, ScratchStack};
pub use time::FrameClock;

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
