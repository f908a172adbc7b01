//! Hardware Abstraction Layer trait for the Opium kernel
//!
//! The registry, device-switch and VFS layers never talk to the platform
//! directly. Everything they need from the outside world (a clock and a
//! place to write debug output) goes through the [`HAL`] trait, so the same
//! kernel runs inside unit tests, inside the interactive shell, or on a
//! bare-metal console.
//!
//! # Platform Implementations
//!
//! - **Tests**: [`TestHal`] (silent, frozen clock)
//! - **Hosted shell**: `tools/opium-shell` (stderr, `std::time`)

#![no_std]

extern crate alloc;

use alloc::rc::Rc;
use core::sync::atomic::{AtomicU64, Ordering};

/// Hardware Abstraction Layer trait
///
/// Implementations provide platform-specific functionality for:
/// - Time measurement
/// - Debug output
///
/// The trait is object safe: kernel subsystems hold a [`HalRef`] so that
/// they can log without carrying a generic parameter around.
pub trait HAL: 'static {
    // === Time ===

    /// Get current time in nanoseconds (monotonic)
    fn now_nanos(&self) -> u64;

    /// Get wall-clock time in milliseconds since Unix epoch
    ///
    /// This is real time-of-day, not monotonic.
    fn wallclock_ms(&self) -> u64;

    // === Debug ===

    /// Write a debug message to the platform's console/log
    fn debug_write(&self, msg: &str);
}

/// Shared handle to the platform HAL.
pub type HalRef = Rc<dyn HAL>;

/// A minimal test HAL for unit testing
///
/// Debug output is discarded and the clock only moves when told to.
#[derive(Default)]
pub struct TestHal {
    time: AtomicU64,
}

impl TestHal {
    pub fn new() -> Self {
        Self {
            time: AtomicU64::new(0),
        }
    }

    /// Convenience constructor returning a shared handle.
    pub fn shared() -> HalRef {
        Rc::new(Self::new())
    }

    /// Advance the monotonic clock.
    pub fn advance(&self, nanos: u64) {
        self.time.fetch_add(nanos, Ordering::SeqCst);
    }
}

impl HAL for TestHal {
    fn now_nanos(&self) -> u64 {
        self.time.load(Ordering::SeqCst)
    }

    fn wallclock_ms(&self) -> u64 {
        1737504000000
    }

    fn debug_write(&self, _msg: &str) {
        // No-op for tests
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advances() {
        let hal = TestHal::new();
        assert_eq!(hal.now_nanos(), 0);
        hal.advance(1500);
        assert_eq!(hal.now_nanos(), 1500);
    }

    #[test]
    fn test_shared_handle_is_object_safe() {
        let hal: HalRef = TestHal::shared();
        hal.debug_write("ignored");
        assert_eq!(hal.wallclock_ms(), 1737504000000);
    }
}
