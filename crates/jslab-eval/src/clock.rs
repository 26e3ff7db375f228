//! Time sources for the event loop.
//!
//! Sessions run on [`RealClock`]; tests drive [`ManualClock`], whose time
//! only moves when advanced (or when the loop sleeps on it), so timer
//! behaviour is deterministic.

use std::cell::Cell;
use std::time::{Duration, Instant};

/// Millisecond time source.
pub trait Clock {
    /// Milliseconds since the clock was created.
    fn now_ms(&self) -> u64;

    /// Block until `deadline_ms` has been reached.
    fn sleep_until(&self, deadline_ms: u64);
}

/// Monotonic wall clock.
#[derive(Debug, Clone)]
pub struct RealClock {
    start: Instant,
}

impl RealClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for RealClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for RealClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn sleep_until(&self, deadline_ms: u64) {
        let now = self.now_ms();
        if deadline_ms > now {
            std::thread::sleep(Duration::from_millis(deadline_ms - now));
        }
    }
}

/// Virtual clock starting at 0.
#[derive(Debug, Default)]
pub struct ManualClock {
    current_time_ms: Cell<u64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward by `ms`.
    pub fn advance_by(&self, ms: u64) {
        self.current_time_ms.set(self.current_time_ms.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.current_time_ms.get()
    }

    /// Sleeping on a manual clock jumps straight to the deadline.
    fn sleep_until(&self, deadline_ms: u64) {
        if deadline_ms > self.current_time_ms.get() {
            self.current_time_ms.set(deadline_ms);
        }
    }
}
