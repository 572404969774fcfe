//! Reconfigurable analog front-end controller.
//!
//! [`RafeController`] owns the current [`RafeState`], a bounded log of
//! [`ModeChangeEvent`]s and the owner-scoped [`ModeLock`].
//!
//! A mode change is split into two phases so an async caller can hold no
//! borrow while the switches settle:
//!
//! ```text
//!  plan_transition(mode) ──▶ PendingTransition ──▶ settle(latency) ──▶ commit_transition
//!       (read-only)             (value)              (await)            (mutates, logs)
//! ```
//!
//! `set_mode` chains the three for direct callers.

pub mod analyte;
pub mod lock;
pub mod preset;

pub use analyte::ResolvedAnalyte;
pub use lock::{ModeLock, ModeLockStatus};
pub use preset::{
    ActivePins, AnalyteCategory, ModePreset, PinConfig, PinFunction, RafeMode, SwitchChange,
    SwitchChanges, SwitchId, SwitchMatrix, SwitchState,
};

use core::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::Clock;
use crate::config::SystemConfig;
use crate::error::{Error, Result};
use crate::events::{SubscriptionId, Subscribers};
use crate::journal::{DEFAULT_JOURNAL_CAPACITY, Journal};

/// Base relay settle time.
pub const SETTLE_BASE_MS: u64 = 10;
/// Extra settle time per flipped switch.
pub const SETTLE_PER_SWITCH_MS: u64 = 5;
/// Simulated calibration sweep.
pub const CALIBRATION_TIME_MS: u64 = 50;

pub const fn transition_time_ms(switch_changes: usize) -> u64 {
    SETTLE_BASE_MS + SETTLE_PER_SWITCH_MS * switch_changes as u64
}

// ---------------------------------------------------------------------------
// State & events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RafeState {
    pub mode: RafeMode,
    pub target_analytes: Vec<String>,
    pub selected_analyte: Option<String>,
    pub category: AnalyteCategory,
    pub input_impedance_ohm: f64,
    pub frequency_hz: f64,
    pub gain: u32,
    pub switch_matrix: SwitchMatrix,
    pub active_pins: ActivePins,
    pub is_calibrated: bool,
    pub last_calibration_ms: Option<u64>,
    pub power_consumption_mw: f64,
}

impl RafeState {
    /// Fresh, uncalibrated projection of `mode`'s preset.
    pub fn for_mode(mode: RafeMode) -> Self {
        let p = mode.preset();
        Self {
            mode,
            target_analytes: p.target_analytes.iter().map(|a| (*a).to_string()).collect(),
            selected_analyte: None,
            category: p.category,
            input_impedance_ohm: p.input_impedance_ohm,
            frequency_hz: p.frequency_hz,
            gain: p.gain,
            switch_matrix: p.switch_matrix(),
            active_pins: p.active_pins(),
            is_calibrated: false,
            last_calibration_ms: None,
            power_consumption_mw: p.power_consumption_mw,
        }
    }
}

impl Default for RafeState {
    fn default() -> Self {
        Self::for_mode(RafeMode::Idle)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeChangeEvent {
    pub timestamp_ms: u64,
    pub previous_mode: RafeMode,
    pub new_mode: RafeMode,
    pub switch_changes: SwitchChanges,
    pub transition_time_ms: u64,
}

/// A planned but not yet applied mode change.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTransition {
    pub from: RafeMode,
    pub to: RafeMode,
    pub switch_changes: SwitchChanges,
    pub transition_time_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyteSelection {
    pub analyte: Option<String>,
    pub mode: RafeMode,
    /// Present only when the selection caused a mode change.
    pub event: Option<ModeChangeEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub mode: RafeMode,
    pub calibrated_at_ms: u64,
    pub duration_ms: u64,
}

/// Wait out the simulated hardware delay.
pub(crate) async fn settle(ms: u64, simulate: bool) {
    if simulate && ms > 0 {
        async_io_mini::Timer::after(Duration::from_millis(ms)).await;
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct RafeController<C: Clock> {
    clock: C,
    state: RafeState,
    log: Journal<ModeChangeEvent>,
    lock: ModeLock,
    subscribers: Subscribers<RafeState>,
    simulate_latency: bool,
}

impl<C: Clock> RafeController<C> {
    pub fn new(config: &SystemConfig, clock: C) -> Self {
        info!(
            "rafe: controller online in {} (lock lease: {:?} ms)",
            RafeMode::Idle,
            config.mode_lock_lease_ms
        );
        Self {
            clock,
            state: RafeState::default(),
            log: Journal::with_capacity(DEFAULT_JOURNAL_CAPACITY),
            lock: ModeLock::new(config.mode_lock_lease_ms),
            subscribers: Subscribers::new(),
            simulate_latency: config.simulate_latency,
        }
    }

    pub fn state(&self) -> RafeState {
        self.state.clone()
    }

    pub fn mode(&self) -> RafeMode {
        self.state.mode
    }

    pub(crate) fn simulate_latency(&self) -> bool {
        self.simulate_latency
    }

    // ── Transitions ───────────────────────────────────────────

    /// Compute a transition without touching state.  `None` while locked.
    pub fn plan_transition(&mut self, mode: RafeMode) -> Option<PendingTransition> {
        if self.lock.is_locked(self.clock.now_ms()) {
            debug!("rafe: {mode} ignored, mode locked");
            return None;
        }
        let switch_changes = self
            .state
            .switch_matrix
            .diff(&mode.preset().switch_matrix());
        Some(PendingTransition {
            from: self.state.mode,
            to: mode,
            transition_time_ms: transition_time_ms(switch_changes.len()),
            switch_changes,
        })
    }

    /// Install a planned transition.  Fails (returns `None`) if the mode
    /// moved or a lock was taken since planning.
    pub fn commit_transition(&mut self, pending: PendingTransition) -> Option<ModeChangeEvent> {
        if self.lock.is_locked(self.clock.now_ms()) {
            debug!("rafe: transition to {} dropped, mode locked", pending.to);
            return None;
        }
        if self.state.mode != pending.from {
            warn!(
                "rafe: stale transition {}→{} (now in {})",
                pending.from, pending.to, self.state.mode
            );
            return None;
        }

        self.state = RafeState::for_mode(pending.to);
        let event = ModeChangeEvent {
            timestamp_ms: self.clock.utc_ms(),
            previous_mode: pending.from,
            new_mode: pending.to,
            switch_changes: pending.switch_changes,
            transition_time_ms: pending.transition_time_ms,
        };
        info!(
            "rafe: {} → {} ({} switches, {} ms)",
            event.previous_mode,
            event.new_mode,
            event.switch_changes.len(),
            event.transition_time_ms
        );
        self.log.push(event.clone());
        self.subscribers.publish(&self.state);
        Some(event)
    }

    /// Switch modes and return the committed transition.
    ///
    /// While the mode lock is held this is a silent no-op returning `None`;
    /// the current state is left exactly as it was and is read back with
    /// [`state`](Self::state).
    pub async fn set_mode(&mut self, mode: RafeMode) -> Option<ModeChangeEvent> {
        let pending = self.plan_transition(mode)?;
        settle(pending.transition_time_ms, self.simulate_latency).await;
        self.commit_transition(pending)
    }

    // ── Analytes ──────────────────────────────────────────────

    /// Select a target analyte, switching modes first if needed.
    pub async fn select_target_analyte(&mut self, analyte: &str) -> AnalyteSelection {
        if self.lock.is_locked(self.clock.now_ms()) {
            return self.current_selection();
        }
        let resolved = analyte::resolve(analyte);
        let event = if resolved.mode == self.state.mode {
            None
        } else {
            match self.set_mode(resolved.mode).await {
                Some(event) => Some(event),
                // Locked mid-transition; nothing changed.
                None => return self.current_selection(),
            }
        };
        self.apply_selection(resolved, event)
    }

    pub(crate) fn current_selection(&self) -> AnalyteSelection {
        AnalyteSelection {
            analyte: self.state.selected_analyte.clone(),
            mode: self.state.mode,
            event: None,
        }
    }

    pub(crate) fn apply_selection(
        &mut self,
        resolved: ResolvedAnalyte,
        event: Option<ModeChangeEvent>,
    ) -> AnalyteSelection {
        debug!("rafe: analyte {} in {}", resolved.name, self.state.mode);
        self.state.selected_analyte = Some(resolved.name);
        self.subscribers.publish(&self.state);
        AnalyteSelection {
            analyte: self.state.selected_analyte.clone(),
            mode: self.state.mode,
            event,
        }
    }

    // ── Calibration ───────────────────────────────────────────

    pub async fn run_calibration(&mut self) -> Result<CalibrationReport> {
        let mode = self.begin_calibration()?;
        settle(CALIBRATION_TIME_MS, self.simulate_latency).await;
        self.finish_calibration(mode)
    }

    pub(crate) fn begin_calibration(&self) -> Result<RafeMode> {
        match self.state.mode {
            RafeMode::Idle => Err(Error::CalibrationUnavailable),
            mode => {
                info!("rafe: calibrating {mode}");
                Ok(mode)
            }
        }
    }

    pub(crate) fn finish_calibration(&mut self, mode: RafeMode) -> Result<CalibrationReport> {
        if self.state.mode != mode {
            warn!("rafe: calibration of {mode} discarded, now in {}", self.state.mode);
            return Err(Error::CalibrationUnavailable);
        }
        let at = self.clock.utc_ms();
        self.state.is_calibrated = true;
        self.state.last_calibration_ms = Some(at);
        self.subscribers.publish(&self.state);
        Ok(CalibrationReport {
            mode,
            calibrated_at_ms: at,
            duration_ms: CALIBRATION_TIME_MS,
        })
    }

    // ── Mode lock ─────────────────────────────────────────────

    pub fn lock_mode(&mut self, owner: &str, reason: &str) -> Result<()> {
        self.lock.acquire(owner, reason, self.clock.now_ms())
    }

    pub fn unlock_mode(&mut self, owner: &str) -> bool {
        self.lock.release(owner, self.clock.now_ms())
    }

    pub fn is_mode_locked(&mut self) -> bool {
        self.lock.is_locked(self.clock.now_ms())
    }

    pub fn mode_lock_status(&self) -> ModeLockStatus {
        self.lock.status(self.clock.now_ms())
    }

    // ── Log & subscriptions ───────────────────────────────────

    /// All retained transitions, oldest first.
    pub fn mode_events(&self) -> Vec<ModeChangeEvent> {
        self.log.recent(None)
    }

    pub(crate) fn event_mark(&self) -> u64 {
        self.log.total_appended()
    }

    pub(crate) fn events_since(&self, mark: u64) -> Vec<ModeChangeEvent> {
        self.log.since(mark)
    }

    /// Listeners receive the full state after every committed change.
    pub fn subscribe(&mut self, listener: impl FnMut(&RafeState) + 'static) -> SubscriptionId {
        self.subscribers.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }
}
