//! Uptime clock used to time the speed tests

use std::cell::Cell;
use std::time::Instant;

/// Monotonic millisecond uptime source
pub trait UptimeClock {
    /// Milliseconds since the clock started
    fn uptime_ms(&self) -> u64;

    /// Milliseconds elapsed since `stamp`; moves `stamp` to now
    fn delta(&self, stamp: &mut u64) -> u64 {
        let now = self.uptime_ms();
        let elapsed = now.saturating_sub(*stamp);
        *stamp = now;
        elapsed
    }
}

/// Uptime backed by `Instant`, counted from construction
#[derive(Debug, Clone, Copy)]
pub struct SystemUptime {
    started: Instant,
}

impl SystemUptime {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for SystemUptime {
    fn default() -> Self {
        Self::new()
    }
}

impl UptimeClock for SystemUptime {
    fn uptime_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// Clock that only moves when told to
///
/// `auto_step` is added after every reading, which lets a test see a
/// deterministic, non-zero elapsed time for an operation.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<u64>,
    auto_step: u64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Cell::new(start_ms),
            auto_step: 0,
        }
    }

    pub fn with_auto_step(mut self, step_ms: u64) -> Self {
        self.auto_step = step_ms;
        self
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl UptimeClock for ManualClock {
    fn uptime_ms(&self) -> u64 {
        let now = self.now.get();
        self.now.set(now + self.auto_step);
        now
    }
}
