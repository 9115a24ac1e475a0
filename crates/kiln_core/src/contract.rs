//! Contract-violation reporting
//!
//! Ordering and lifetime rules of the arenas are programmer contracts, not
//! data conditions. A broken contract is always logged; with debug assertions
//! enabled it also halts immediately. Release builds continue with whatever
//! guarded fallback the caller chose.

use std::fmt;

/// Report a broken contract.
///
/// Never panics while the thread is already unwinding, so it is safe to call
/// from `Drop` implementations.
#[track_caller]
pub fn violation(message: impl fmt::Display) {
    let location = std::panic::Location::caller();
    tracing::error!(target: "kiln::contract", %location, "contract violation: {message}");

    if cfg!(debug_assertions) && !std::thread::panicking() {
        panic!("contract violation: {message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "contract violation: slot 3 released twice")]
    fn test_violation_panics_in_debug() {
        violation(format_args!("slot {} released twice", 3));
    }
}
