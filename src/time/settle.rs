//! Settle delays
//!
//! Replay waits for the screen to catch up after every action and between
//! location passes. The waits block the calling thread.

use std::thread;
use std::time::{Duration, Instant};

use tracing::trace;

/// Remaining time below which an early wake-up ends the wait
pub const RESUME_THRESHOLD: Duration = Duration::from_millis(10);

/// Blocking delay provider
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

/// Parks the current thread until the deadline.
///
/// Spurious or explicit unparks resume the wait while more than
/// [`RESUME_THRESHOLD`] remains.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl ThreadSleeper {
    pub fn new() -> Self {
        Self
    }
}

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        let deadline = Instant::now() + duration;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return;
            }
            thread::park_timeout(remaining);

            let left = deadline.saturating_duration_since(Instant::now());
            if left <= RESUME_THRESHOLD {
                return;
            }
            trace!(left_ms = left.as_millis() as u64, "Woken early, resuming wait");
        }
    }
}
