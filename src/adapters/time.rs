//! Clock adapters.
//!
//! - [`SystemClock`] uses `std::time::Instant` for the monotonic reading
//!   and `SystemTime` for event timestamps.
//! - [`ManualClock`] is advanced explicitly; clones share one reading so
//!   the guard, the controller and a test harness stay in step.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::app::ports::Clock;

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn utc_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as u64)
    }
}

/// Deterministic clock for tests and replay.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Rc<Cell<u64>>,
    epoch_ms: u64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now_ms: Rc::new(Cell::new(start_ms)),
            epoch_ms: 0,
        }
    }

    /// Report `utc_ms` as `epoch_ms + now_ms`.
    #[must_use]
    pub fn with_epoch(mut self, epoch_ms: u64) -> Self {
        self.epoch_ms = epoch_ms;
        self
    }

    pub fn advance(&self, ms: u64) {
        self.now_ms.set(self.now_ms.get().saturating_add(ms));
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.get()
    }

    fn utc_ms(&self) -> u64 {
        self.epoch_ms.saturating_add(self.now_ms.get())
    }
}
