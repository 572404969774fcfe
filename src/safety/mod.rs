//! Hardware command interlock (the "HAL lock").
//!
//! Every physical actuation passes through [`SafetyGuard`].  The guard
//! owns the device telemetry snapshot, the heartbeat watchdog, the system
//! lock and the bounded safety log.
//!
//! ## Evaluation
//!
//! 1. System locked and the command is not `EMERGENCY_STOP` ⇒ deny
//!    `CRITICAL`.
//! 2. Run all six checks in [`checks`]; none short-circuits.
//! 3. The most severe denial wins (not the first one).
//! 4. A `CRITICAL` winner triggers an emergency stop, which locks the
//!    system until an admin [`unlock`](SafetyGuard::unlock).
//! 5. Otherwise, if nothing denies, the command's side effects are applied
//!    to the device state and the continuous-operation timers.
//!
//! Every evaluation is logged with a full device snapshot.

pub mod checks;
pub mod command;
pub mod credential;
pub mod device;
pub mod event;
pub mod limits;
pub mod prediction;
pub mod verdict;
pub mod watchdog;

pub use command::HardwareCommand;
pub use device::{ContinuousTimers, DeviceState, TelemetrySample};
pub use event::{EventOrigin, SafetyEvent, StopReason};
pub use prediction::AiPrediction;
pub use verdict::{CheckKind, SafetyCheckResult, SafetyLevel};
pub use watchdog::WatchdogStatus;

use log::{debug, error, info, warn};
use serde::Serialize;

use crate::app::ports::{AuditRecord, AuditSink, Clock};
use crate::config::SystemConfig;
use crate::error::Result;
use crate::events::{SubscriptionId, Subscribers};
use crate::journal::{DEFAULT_JOURNAL_CAPACITY, Journal};
use checks::CheckContext;
use credential::UnlockSecret;
use limits::{
    BATTERY_TEMP_MAX_C, BATTERY_TEMP_MIN_C, MAX_CONTINUOUS_HIGH_VOLTAGE_MS, MAX_CONTINUOUS_MOTOR_MS,
};
use watchdog::HeartbeatWatchdog;

const FORCE_PREFIX: &str = "FORCE OVERRIDE: ";

/// Options for [`SafetyGuard::execute_hardware_command`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Override a non-critical denial.  Ignored without `admin_id`.
    pub force: bool,
    pub admin_id: Option<String>,
}

impl ExecuteOptions {
    pub fn forced_by(admin_id: impl Into<String>) -> Self {
        Self {
            force: true,
            admin_id: Some(admin_id.into()),
        }
    }

    fn override_admin(&self) -> Option<&str> {
        if self.force {
            self.admin_id.as_deref().filter(|id| !id.is_empty())
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionOutcome {
    /// Side effects were applied.
    pub success: bool,
    pub result: SafetyCheckResult,
}

/// `{locked, reason}`; only [`SafetyGuard::unlock`] clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SystemLock {
    pub locked: bool,
    pub reason: Option<String>,
}

pub struct SafetyGuard<C: Clock> {
    clock: C,
    state: DeviceState,
    timers: ContinuousTimers,
    watchdog: HeartbeatWatchdog,
    lock: SystemLock,
    secret: UnlockSecret,
    log: Journal<SafetyEvent>,
    next_event_id: u64,
    subscribers: Subscribers<SafetyEvent>,
    audit: Option<Box<dyn AuditSink>>,
    audit_user_id: String,
    firmware_version: String,
}

impl<C: Clock> SafetyGuard<C> {
    pub fn new(config: &SystemConfig, clock: C) -> Self {
        let now = clock.now_ms();
        let secret = UnlockSecret::new(config.override_key.as_deref());
        if !secret.is_configured() {
            warn!("safety: no override key configured, system lock cannot be cleared");
        }
        info!("safety: guard online (fw {})", config.firmware_version);
        Self {
            state: DeviceState::initial(&config.firmware_version, now),
            timers: ContinuousTimers::default(),
            watchdog: HeartbeatWatchdog::new(now),
            lock: SystemLock::default(),
            secret,
            log: Journal::with_capacity(DEFAULT_JOURNAL_CAPACITY),
            next_event_id: 1,
            subscribers: Subscribers::new(),
            audit: None,
            audit_user_id: config.audit_user_id.clone(),
            firmware_version: config.firmware_version.clone(),
            clock,
        }
    }

    /// Attach the audit-chain collaborator.
    #[must_use]
    pub fn with_audit_sink(mut self, sink: Box<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    // ── Commands ──────────────────────────────────────────────

    /// Evaluate and, if allowed, apply `cmd`.
    pub fn check_command(&mut self, cmd: HardwareCommand) -> SafetyCheckResult {
        self.execute_hardware_command(cmd, &ExecuteOptions::default())
            .result
    }

    pub fn execute_hardware_command(
        &mut self,
        cmd: HardwareCommand,
        opts: &ExecuteOptions,
    ) -> ExecutionOutcome {
        if cmd == HardwareCommand::EmergencyStop {
            let result = self.emergency_stop(StopReason::Requested);
            return ExecutionOutcome {
                success: true,
                result,
            };
        }

        if self.lock.locked {
            let reason = self.lock.reason.as_deref().unwrap_or("unspecified");
            let mut result = SafetyCheckResult::deny(
                CheckKind::SystemLock,
                SafetyLevel::Critical,
                format!("System locked: {reason}"),
            )
            .with_action("Admin unlock required");
            // Already stopped; do not stop again.
            result.emergency_stop = false;
            warn!("safety: {cmd} refused, system locked");
            self.record(EventOrigin::Command(cmd), result.clone(), Vec::new(), None);
            return ExecutionOutcome {
                success: false,
                result,
            };
        }

        let now = self.clock.now_ms();
        let verdicts = checks::run_all(&CheckContext {
            command: cmd,
            state: &self.state,
            timers: &self.timers,
            now_ms: now,
        });

        let Some(worst) = verdict::most_severe(&verdicts).cloned() else {
            let result = verdicts
                .iter()
                .find(|r| r.level == SafetyLevel::Caution)
                .cloned()
                .unwrap_or_else(|| SafetyCheckResult::safe(format!("{cmd} permitted")));
            self.apply(cmd, now);
            debug!("safety: {cmd} allowed ({})", result.level);
            let event = self.record(EventOrigin::Command(cmd), result.clone(), Vec::new(), None);
            if cmd == HardwareCommand::FirmwareUpdate {
                self.audit_event("FIRMWARE_UPDATE_ALLOWED", &event, None);
            }
            return ExecutionOutcome {
                success: true,
                result,
            };
        };

        let suppressed: Vec<SafetyCheckResult> = verdicts
            .iter()
            .filter(|r| r.is_denial() && **r != worst)
            .cloned()
            .collect();

        if worst.level == SafetyLevel::Critical {
            error!("safety: {cmd} DENIED [{}] {}", worst.level, worst.reason);
            let event = self.record(EventOrigin::Command(cmd), worst.clone(), suppressed, None);
            self.audit_event("CRITICAL_DENIAL", &event, None);
            self.emergency_stop(StopReason::CriticalDenial(worst.reason.clone()));
            return ExecutionOutcome {
                success: false,
                result: worst,
            };
        }

        if let Some(admin) = opts.override_admin().map(str::to_string) {
            let mut result = worst;
            result.allowed = true;
            result.reason = format!("{FORCE_PREFIX}{}", result.reason);
            warn!("safety: {cmd} forced by {admin}: {}", result.reason);
            self.apply(cmd, now);
            let event = self.record(
                EventOrigin::Command(cmd),
                result.clone(),
                suppressed,
                Some(admin.clone()),
            );
            self.audit_event("FORCE_OVERRIDE", &event, Some(&admin));
            return ExecutionOutcome {
                success: true,
                result,
            };
        }

        warn!("safety: {cmd} DENIED [{}] {}", worst.level, worst.reason);
        let event = self.record(EventOrigin::Command(cmd), worst.clone(), suppressed, None);
        if cmd == HardwareCommand::FirmwareUpdate {
            self.audit_event("FIRMWARE_UPDATE_DENIED", &event, None);
        }
        ExecutionOutcome {
            success: false,
            result: worst,
        }
    }

    fn apply(&mut self, cmd: HardwareCommand, now_ms: u64) {
        self.state.apply(cmd);
        self.timers.on_allowed(cmd, now_ms);
    }

    // ── Emergency stop & lock ─────────────────────────────────

    /// De-energise everything, lock the system and log the stop.
    pub fn emergency_stop(&mut self, reason: StopReason) -> SafetyCheckResult {
        error!("safety: EMERGENCY STOP ({reason})");
        self.state.apply(HardwareCommand::EmergencyStop);
        self.timers.clear();
        // The first stop owns the lock reason and the audit record.
        let first_stop = !self.lock.locked;
        if first_stop {
            self.lock = SystemLock {
                locked: true,
                reason: Some(reason.to_string()),
            };
        } else {
            info!(
                "safety: already locked ({}), reason kept",
                self.lock.reason.as_deref().unwrap_or("unspecified")
            );
        }

        let result = SafetyCheckResult {
            allowed: true,
            level: SafetyLevel::Critical,
            reason: format!("Emergency stop: {reason}"),
            required_action: Some("Admin unlock required".into()),
            human_verification_required: false,
            emergency_stop: true,
            check: None,
        };
        let event = self.record(EventOrigin::EmergencyStop(reason), result.clone(), Vec::new(), None);
        if first_stop {
            self.audit_event("EMERGENCY_STOP", &event, None);
        }
        result
    }

    /// Clear the system lock if `password` matches the override key.
    pub fn unlock(&mut self, password: &str, admin_id: &str) -> bool {
        if !self.secret.verify(password) {
            warn!("safety: unlock rejected for {admin_id}");
            return false;
        }
        let previous = self.lock.reason.take();
        self.lock.locked = false;
        // A host that is still silent trips the watchdog again.
        self.watchdog.rearm();
        warn!("safety: system unlocked by {admin_id}");

        let result = SafetyCheckResult {
            level: SafetyLevel::Warning,
            ..SafetyCheckResult::safe(format!("System unlocked by admin {admin_id}"))
        };
        let event = self.record(
            EventOrigin::Unlock {
                admin_id: admin_id.to_string(),
            },
            result,
            Vec::new(),
            None,
        );
        self.audit_event_with(
            "SYSTEM_UNLOCK",
            &event,
            Some(admin_id),
            previous,
            Some("unlocked".into()),
        );
        true
    }

    pub fn is_locked(&self) -> bool {
        self.lock.locked
    }

    pub fn lock_reason(&self) -> Option<&str> {
        self.lock.reason.as_deref()
    }

    pub fn system_lock(&self) -> SystemLock {
        self.lock.clone()
    }

    // ── Heartbeat watchdog ────────────────────────────────────

    pub fn send_heartbeat(&mut self) {
        let now = self.clock.now_ms();
        self.watchdog.feed(now);
        self.state.last_heartbeat_ms = self.watchdog.last_fed_ms();
    }

    /// Poll the watchdog; a stale heartbeat runs the emergency stop.
    /// Actuators that have outlasted their duty limit are switched off.
    pub fn watchdog_tick(&mut self) -> WatchdogStatus {
        let now = self.clock.now_ms();
        let status = self.watchdog.poll(now);
        if let WatchdogStatus::Tripped { .. } = status {
            self.emergency_stop(StopReason::HeartbeatTimeout);
        }
        self.enforce_duty_limits(now);
        status
    }

    fn enforce_duty_limits(&mut self, now_ms: u64) {
        let limits = [
            (
                HardwareCommand::EhdHighVoltage,
                HardwareCommand::EhdOff,
                self.timers.high_voltage.elapsed(now_ms),
                MAX_CONTINUOUS_HIGH_VOLTAGE_MS,
            ),
            (
                HardwareCommand::MotorStart,
                HardwareCommand::MotorStop,
                self.timers.motor.elapsed(now_ms),
                MAX_CONTINUOUS_MOTOR_MS,
            ),
        ];
        for (running, stop, run_ms, max_ms) in limits {
            if run_ms <= max_ms {
                continue;
            }
            self.apply(stop, now_ms);
            let result = SafetyCheckResult::deny(
                CheckKind::ContinuousOperation,
                SafetyLevel::Warning,
                format!(
                    "{running} cut off after {}s (max {}s)",
                    run_ms / 1000,
                    max_ms / 1000
                ),
            )
            .with_action("Let the actuator rest before restarting");
            warn!("safety: {}", result.reason);
            self.record(EventOrigin::DutyLimit(running), result, Vec::new(), None);
        }
    }

    // ── Telemetry ─────────────────────────────────────────────

    pub fn device_state(&self) -> DeviceState {
        self.state.clone()
    }

    /// Merge a sensor reading into the device state.
    pub fn update_telemetry(&mut self, sample: TelemetrySample) -> Result<()> {
        sample.validate()?;
        sample.apply_to(&mut self.state);

        let t = self.state.battery_temp_c;
        if self.state.is_charging && !(BATTERY_TEMP_MIN_C..=BATTERY_TEMP_MAX_C).contains(&t) {
            self.state.apply(HardwareCommand::ChargingStop);
            let result = SafetyCheckResult::deny(
                CheckKind::BatteryTemperature,
                SafetyLevel::Danger,
                format!("Charging stopped: battery at {t:.1}°C"),
            )
            .with_action("Let the battery return to its operating range");
            warn!("safety: {}", result.reason);
            self.record(EventOrigin::Telemetry, result, Vec::new(), None);
        }
        Ok(())
    }

    /// Restore power-on telemetry and restart the heartbeat period.
    /// The system lock is kept.
    pub fn reinitialize(&mut self) {
        let now = self.clock.now_ms();
        self.state = DeviceState::initial(&self.firmware_version, now);
        self.timers.clear();
        self.watchdog.reset(now);
        info!(
            "safety: re-initialised (locked: {})",
            if self.lock.locked { "yes" } else { "no" }
        );
    }

    // ── AI predictions ────────────────────────────────────────

    pub fn validate_ai_prediction(&self, prediction: &AiPrediction) -> SafetyCheckResult {
        let result = prediction::validate_ai_prediction(prediction);
        if result.is_denial() {
            info!("safety: prediction held back: {}", result.reason);
        }
        result
    }

    // ── Log & subscriptions ───────────────────────────────────

    /// Most recent `limit` events, oldest first.
    pub fn event_log(&self, limit: Option<usize>) -> Vec<SafetyEvent> {
        self.log.recent(limit)
    }

    pub(crate) fn event_mark(&self) -> u64 {
        self.log.total_appended()
    }

    pub(crate) fn events_since(&self, mark: u64) -> Vec<SafetyEvent> {
        self.log.since(mark)
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&SafetyEvent) + 'static) -> SubscriptionId {
        self.subscribers.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    fn record(
        &mut self,
        origin: EventOrigin,
        result: SafetyCheckResult,
        suppressed: Vec<SafetyCheckResult>,
        forced_by: Option<String>,
    ) -> SafetyEvent {
        let event = SafetyEvent {
            id: self.next_event_id,
            timestamp_utc_ms: self.clock.utc_ms(),
            origin,
            device_state: self.state.clone(),
            result,
            suppressed,
            forced_by,
        };
        self.next_event_id += 1;
        self.log.push(event.clone());
        self.subscribers.publish(&event);
        event
    }

    // ── Audit ─────────────────────────────────────────────────

    fn audit_event(&mut self, action: &str, event: &SafetyEvent, user: Option<&str>) {
        self.audit_event_with(action, event, user, None, None);
    }

    fn audit_event_with(
        &mut self,
        action: &str,
        event: &SafetyEvent,
        user: Option<&str>,
        old_val: Option<String>,
        new_val: Option<String>,
    ) {
        let Some(sink) = self.audit.as_mut() else {
            return;
        };
        let data_record = serde_json::to_value(event).unwrap_or_else(|e| {
            warn!("audit: could not serialise event {}: {e}", event.id);
            serde_json::Value::Null
        });
        let record = AuditRecord {
            user_id: user.unwrap_or(&self.audit_user_id).to_string(),
            action_type: action.to_string(),
            old_val,
            new_val,
            reason: event.result.reason.clone(),
            record_type: "safety_event".into(),
            record_id: event.id.to_string(),
            data_record,
        };
        match sink.append(record) {
            Ok(receipt) => debug!("audit: {action} stored as #{}", receipt.sequence),
            Err(e) => error!("audit: {action} for event {} not stored: {e}", event.id),
        }
    }
}
