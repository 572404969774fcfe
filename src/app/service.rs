//! Device service — the composition root.
//!
//! [`DeviceService`] owns exactly one [`SafetyGuard`] and one
//! [`RafeController`].  Nothing is global: the caller constructs the
//! service and hands it a clock, and optionally an audit sink.
//!
//! ```text
//!  commands ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!               │        DeviceService          │
//!  telemetry ──▶│  SafetyGuard ◀── RAFE gate    │ ──▶ AuditSink
//!               │  RafeController               │
//!               └──────────────────────────────┘
//! ```
//!
//! RAFE reconfiguration through the service is gated by the guard:
//! `RAFE_RECONFIGURE` is always checked, entering `MODE_GAS_HIGH_Z` also
//! needs `EHD_HIGH_VOLTAGE` for the air intake, and leaving it issues
//! `EHD_OFF`.  Mode changes are split into `begin_*` / `finish_*` halves
//! so the runtime can await the settle time without holding a borrow.

use log::{info, warn};
use serde::Serialize;

use crate::config::SystemConfig;
use crate::error::Result;
use crate::rafe::{
    AnalyteSelection, CalibrationReport, ModeChangeEvent, ModeLockStatus, PendingTransition,
    RafeController, RafeMode, RafeState, ResolvedAnalyte, analyte, settle,
};
use crate::safety::{
    DeviceState, ExecuteOptions, ExecutionOutcome, HardwareCommand, SafetyCheckResult,
    SafetyGuard, SystemLock, TelemetrySample, WatchdogStatus,
};

use super::events::DeviceEvent;
use super::ports::{AuditSink, Clock, EventSink};

// ───────────────────────────────────────────────────────────────
// Gate results
// ───────────────────────────────────────────────────────────────

/// Outcome of a guarded RAFE operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Gated<T> {
    Applied(T),
    /// The guard refused; the RAFE was not touched.
    Denied(SafetyCheckResult),
}

impl<T> Gated<T> {
    pub fn applied(self) -> Option<T> {
        match self {
            Self::Applied(v) => Some(v),
            Self::Denied(_) => None,
        }
    }

    pub fn denial(&self) -> Option<&SafetyCheckResult> {
        match self {
            Self::Applied(_) => None,
            Self::Denied(r) => Some(r),
        }
    }
}

/// A mode change that passed the gate and waits for its settle time.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedModeChange {
    pending: PendingTransition,
    /// The EHD intake was switched on by the gate.
    energised_ehd: bool,
}

impl PreparedModeChange {
    pub fn transition_time_ms(&self) -> u64 {
        self.pending.transition_time_ms
    }
}

/// First half of an analyte selection.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalyteStep {
    /// Nothing to wait for (same mode, or mode-locked).
    Done(AnalyteSelection),
    Transition(PreparedModeChange, ResolvedAnalyte),
    Denied(SafetyCheckResult),
}

/// Read-only view for dashboards and report renderers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSnapshot {
    pub device: DeviceState,
    pub system_lock: SystemLock,
    pub rafe: RafeState,
    pub mode_lock: ModeLockStatus,
}

#[derive(Debug, Clone, Copy)]
struct Marks {
    safety: u64,
    rafe: u64,
}

// ───────────────────────────────────────────────────────────────
// DeviceService
// ───────────────────────────────────────────────────────────────

pub struct DeviceService<C: Clock> {
    safety: SafetyGuard<C>,
    rafe: RafeController<C>,
}

impl<C: Clock + Clone> DeviceService<C> {
    pub fn new(config: &SystemConfig, clock: C) -> Self {
        let safety = SafetyGuard::new(config, clock.clone());
        let rafe = RafeController::new(config, clock);
        info!("DeviceService ready");
        Self { safety, rafe }
    }
}

impl<C: Clock> DeviceService<C> {
    #[must_use]
    pub fn with_audit_sink(mut self, sink: Box<dyn AuditSink>) -> Self {
        self.safety = self.safety.with_audit_sink(sink);
        self
    }

    pub fn safety(&self) -> &SafetyGuard<C> {
        &self.safety
    }

    pub fn rafe(&self) -> &RafeController<C> {
        &self.rafe
    }

    pub fn rafe_mut(&mut self) -> &mut RafeController<C> {
        &mut self.rafe
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot {
            device: self.safety.device_state(),
            system_lock: self.safety.system_lock(),
            rafe: self.rafe.state(),
            mode_lock: self.rafe.mode_lock_status(),
        }
    }

    // ── Safety passthroughs ───────────────────────────────────

    pub fn execute(
        &mut self,
        cmd: HardwareCommand,
        opts: &ExecuteOptions,
        sink: &mut impl EventSink,
    ) -> ExecutionOutcome {
        let marks = self.marks();
        let outcome = self.safety.execute_hardware_command(cmd, opts);
        self.flush(marks, sink);
        outcome
    }

    pub fn heartbeat(&mut self) {
        self.safety.send_heartbeat();
    }

    pub fn watchdog_tick(&mut self, sink: &mut impl EventSink) -> WatchdogStatus {
        let marks = self.marks();
        let status = self.safety.watchdog_tick();
        self.flush(marks, sink);
        status
    }

    pub fn update_telemetry(
        &mut self,
        sample: TelemetrySample,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        let marks = self.marks();
        let result = self.safety.update_telemetry(sample);
        self.flush(marks, sink);
        result
    }

    pub fn unlock(&mut self, password: &str, admin_id: &str, sink: &mut impl EventSink) -> bool {
        let marks = self.marks();
        let ok = self.safety.unlock(password, admin_id);
        self.flush(marks, sink);
        ok
    }

    // ── Gated RAFE: mode changes ──────────────────────────────

    /// Plan `mode` and clear it with the guard.  `Applied(None)` means the
    /// mode lock is held and nothing happens.
    pub fn begin_mode_change(
        &mut self,
        mode: RafeMode,
        sink: &mut impl EventSink,
    ) -> Gated<Option<PreparedModeChange>> {
        let Some(pending) = self.rafe.plan_transition(mode) else {
            return Gated::Applied(None);
        };
        let marks = self.marks();
        let gate = self.gate(&pending);
        self.flush(marks, sink);
        match gate {
            Ok(energised_ehd) => Gated::Applied(Some(PreparedModeChange {
                pending,
                energised_ehd,
            })),
            Err(denial) => Gated::Denied(denial),
        }
    }

    /// Commit after the settle time and tidy up the EHD intake.
    pub fn finish_mode_change(
        &mut self,
        prepared: PreparedModeChange,
        sink: &mut impl EventSink,
    ) -> Option<ModeChangeEvent> {
        let marks = self.marks();
        let from = prepared.pending.from;
        let event = self.rafe.commit_transition(prepared.pending);
        let leaving_gas = event.is_some()
            && from == RafeMode::GasHighZ
            && self.rafe.mode() != RafeMode::GasHighZ;
        let stranded_ehd = event.is_none() && prepared.energised_ehd;
        if leaving_gas || stranded_ehd {
            let r = self.safety.check_command(HardwareCommand::EhdOff);
            if !r.allowed {
                warn!("EHD_OFF after mode change refused: {}", r.reason);
            }
        }
        self.flush(marks, sink);
        event
    }

    pub async fn set_mode(
        &mut self,
        mode: RafeMode,
        sink: &mut impl EventSink,
    ) -> Gated<Option<ModeChangeEvent>> {
        match self.begin_mode_change(mode, sink) {
            Gated::Applied(Some(prepared)) => {
                settle(prepared.transition_time_ms(), self.rafe.simulate_latency()).await;
                Gated::Applied(self.finish_mode_change(prepared, sink))
            }
            Gated::Applied(None) => Gated::Applied(None),
            Gated::Denied(r) => Gated::Denied(r),
        }
    }

    // ── Gated RAFE: analytes ──────────────────────────────────

    pub fn begin_analyte_selection(
        &mut self,
        analyte: &str,
        sink: &mut impl EventSink,
    ) -> AnalyteStep {
        if self.rafe.is_mode_locked() {
            return AnalyteStep::Done(self.rafe.current_selection());
        }
        let resolved = analyte::resolve(analyte);
        if resolved.mode == self.rafe.mode() {
            let selection = self.rafe.apply_selection(resolved, None);
            emit_selection(&selection, sink);
            return AnalyteStep::Done(selection);
        }
        match self.begin_mode_change(resolved.mode, sink) {
            Gated::Applied(Some(prepared)) => AnalyteStep::Transition(prepared, resolved),
            Gated::Applied(None) => AnalyteStep::Done(self.rafe.current_selection()),
            Gated::Denied(r) => AnalyteStep::Denied(r),
        }
    }

    pub fn finish_analyte_selection(
        &mut self,
        prepared: PreparedModeChange,
        resolved: ResolvedAnalyte,
        sink: &mut impl EventSink,
    ) -> AnalyteSelection {
        match self.finish_mode_change(prepared, sink) {
            Some(event) => {
                let selection = self.rafe.apply_selection(resolved, Some(event));
                emit_selection(&selection, sink);
                selection
            }
            None => self.rafe.current_selection(),
        }
    }

    pub async fn select_target_analyte(
        &mut self,
        analyte: &str,
        sink: &mut impl EventSink,
    ) -> Gated<AnalyteSelection> {
        match self.begin_analyte_selection(analyte, sink) {
            AnalyteStep::Done(selection) => Gated::Applied(selection),
            AnalyteStep::Transition(prepared, resolved) => {
                settle(prepared.transition_time_ms(), self.rafe.simulate_latency()).await;
                Gated::Applied(self.finish_analyte_selection(prepared, resolved, sink))
            }
            AnalyteStep::Denied(r) => Gated::Denied(r),
        }
    }

    // ── Calibration ───────────────────────────────────────────

    pub fn begin_calibration(&self) -> Result<RafeMode> {
        self.rafe.begin_calibration()
    }

    pub fn finish_calibration(
        &mut self,
        mode: RafeMode,
        sink: &mut impl EventSink,
    ) -> Result<CalibrationReport> {
        let report = self.rafe.finish_calibration(mode)?;
        sink.emit(&DeviceEvent::Calibrated(report.clone()));
        Ok(report)
    }

    pub async fn run_calibration(&mut self, sink: &mut impl EventSink) -> Result<CalibrationReport> {
        let mode = self.begin_calibration()?;
        settle(crate::rafe::CALIBRATION_TIME_MS, self.rafe.simulate_latency()).await;
        self.finish_calibration(mode, sink)
    }

    // ── Internal ──────────────────────────────────────────────

    /// Returns whether the EHD intake was switched on.
    fn gate(&mut self, pending: &PendingTransition) -> core::result::Result<bool, SafetyCheckResult> {
        let r = self.safety.check_command(HardwareCommand::RafeReconfigure);
        if !r.allowed {
            warn!("RAFE {} → {} blocked: {}", pending.from, pending.to, r.reason);
            return Err(r);
        }
        if pending.to == RafeMode::GasHighZ && pending.from != RafeMode::GasHighZ {
            let r = self.safety.check_command(HardwareCommand::EhdHighVoltage);
            if !r.allowed {
                warn!("RAFE gas mode blocked, EHD intake refused: {}", r.reason);
                return Err(r);
            }
            return Ok(true);
        }
        Ok(false)
    }

    fn marks(&self) -> Marks {
        Marks {
            safety: self.safety.event_mark(),
            rafe: self.rafe.event_mark(),
        }
    }

    fn flush(&self, marks: Marks, sink: &mut impl EventSink) {
        for e in self.safety.events_since(marks.safety) {
            sink.emit(&DeviceEvent::Safety(e));
        }
        for e in self.rafe.events_since(marks.rafe) {
            sink.emit(&DeviceEvent::ModeChanged(e));
        }
    }
}

fn emit_selection(selection: &AnalyteSelection, sink: &mut impl EventSink) {
    if let Some(analyte) = &selection.analyte {
        sink.emit(&DeviceEvent::AnalyteSelected {
            analyte: analyte.clone(),
            mode: selection.mode,
        });
    }
}
