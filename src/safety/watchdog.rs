//! Heartbeat watchdog.
//!
//! The host UI must call `feed()` (via `SafetyGuard::send_heartbeat`) at
//! least every [`HEARTBEAT_TIMEOUT_MS`].  The runtime polls `poll()` every
//! [`WATCHDOG_TICK_MS`]; a stale heartbeat trips the watchdog exactly
//! once until the next feed or an unlock re-arms it.

use log::{debug, warn};

use super::limits::{HEARTBEAT_TIMEOUT_MS, WATCHDOG_TICK_MS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogStatus {
    Healthy,
    /// Heartbeat is stale and this poll is the one that trips.
    Tripped { silent_for_ms: u64 },
    /// Already tripped; waiting for the next heartbeat.
    Expired,
}

#[derive(Debug, Clone)]
pub struct HeartbeatWatchdog {
    last_fed_ms: u64,
    timeout_ms: u64,
    tripped: bool,
}

impl HeartbeatWatchdog {
    pub fn new(now_ms: u64) -> Self {
        Self::with_timeout(now_ms, HEARTBEAT_TIMEOUT_MS)
    }

    pub fn with_timeout(now_ms: u64, timeout_ms: u64) -> Self {
        debug!("watchdog: armed ({timeout_ms} ms timeout, {WATCHDOG_TICK_MS} ms tick)");
        Self {
            last_fed_ms: now_ms,
            timeout_ms,
            tripped: false,
        }
    }

    /// Record a heartbeat.  Clock regressions are ignored so the reading
    /// never goes backwards.
    pub fn feed(&mut self, now_ms: u64) {
        self.last_fed_ms = self.last_fed_ms.max(now_ms);
        if self.tripped {
            debug!("watchdog: re-armed by heartbeat");
        }
        self.tripped = false;
    }

    pub fn poll(&mut self, now_ms: u64) -> WatchdogStatus {
        let silent_for_ms = now_ms.saturating_sub(self.last_fed_ms);
        if silent_for_ms <= self.timeout_ms {
            return WatchdogStatus::Healthy;
        }
        if self.tripped {
            return WatchdogStatus::Expired;
        }
        warn!("watchdog: no heartbeat for {silent_for_ms} ms");
        self.tripped = true;
        WatchdogStatus::Tripped { silent_for_ms }
    }

    pub fn last_fed_ms(&self) -> u64 {
        self.last_fed_ms
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped
    }

    /// Clear the trip latch but keep the last heartbeat, so a still-stale
    /// period trips again on the next poll.
    pub fn rearm(&mut self) {
        self.tripped = false;
    }

    /// Forget any trip and restart the period from `now_ms`.
    pub fn reset(&mut self, now_ms: u64) {
        self.last_fed_ms = now_ms;
        self.tripped = false;
    }
}
