//! Monotonic time sources for the game loop.
//!
//! [`MonotonicClock`] is the real thing. [`ManualClock`] is a simulated clock
//! whose `pause` advances time instead of sleeping, so the scheduler can be
//! driven through seconds of iterations instantly and deterministically.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// The pacing wait failed before its deadline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("pacing wait interrupted: {reason}")]
pub struct WaitError {
    pub reason: String,
}

/// A monotonic time source plus the wait primitive used for frame pacing.
pub trait Clock {
    /// Time since this clock's origin. Never decreases.
    fn now(&self) -> Duration;

    /// Yield the calling thread for roughly `duration`.
    fn pause(&self, duration: Duration) -> Result<(), WaitError>;
}

/// Wall-clock-immune clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn pause(&self, duration: Duration) -> Result<(), WaitError> {
        std::thread::sleep(duration);
        Ok(())
    }
}

/// Simulated clock. Clones share the same timeline.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
    fail_next_pause: Arc<AtomicBool>,
}

impl ManualClock {
    /// A clock starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(duration_nanos(by), Ordering::SeqCst);
    }

    /// Make the next [`pause`](Clock::pause) fail with a [`WaitError`].
    pub fn fail_next_pause(&self) {
        self.fail_next_pause.store(true, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }

    fn pause(&self, duration: Duration) -> Result<(), WaitError> {
        if self.fail_next_pause.swap(false, Ordering::SeqCst) {
            return Err(WaitError {
                reason: "simulated interruption".to_string(),
            });
        }
        self.advance(duration);
        Ok(())
    }
}

fn duration_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}
