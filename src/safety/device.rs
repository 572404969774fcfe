//! Device telemetry snapshot owned by the safety guard.
//!
//! Sensor-sourced fields arrive through [`TelemetrySample`]; actuator
//! fields (voltage, current, motor, heater, charging) change **only** as
//! side effects of allowed commands or of an emergency stop.

use serde::{Deserialize, Serialize};

use super::command::HardwareCommand;
use super::limits::{
    CRITICAL_ERROR_PREFIXES, EHD_HIGH_CURRENT_MA, EHD_HIGH_VOLTAGE_V, EHD_LOW_CURRENT_MA,
    EHD_LOW_VOLTAGE_V, EHD_MEDIUM_CURRENT_MA, EHD_MEDIUM_VOLTAGE_V,
};
use crate::error::{Error, Result};

/// A point-in-time snapshot of everything the checks look at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    pub skin_contact: bool,
    pub battery_temp_c: f64,
    pub battery_level_percent: f64,
    pub device_temp_c: f64,
    pub current_voltage_v: f64,
    pub current_current_ma: f64,
    pub motor_running: bool,
    pub heater_active: bool,
    pub firmware_version: String,
    /// Monotonic clock reading of the last heartbeat.
    pub last_heartbeat_ms: u64,
    pub error_codes: Vec<String>,
    pub is_charging: bool,
    pub wearable_attached: bool,
}

impl DeviceState {
    /// Safe power-on defaults: idle, no contact, room temperature.
    pub fn initial(firmware_version: &str, now_ms: u64) -> Self {
        Self {
            skin_contact: false,
            battery_temp_c: 25.0,
            battery_level_percent: 100.0,
            device_temp_c: 25.0,
            current_voltage_v: 0.0,
            current_current_ma: 0.0,
            motor_running: false,
            heater_active: false,
            firmware_version: firmware_version.to_string(),
            last_heartbeat_ms: now_ms,
            error_codes: Vec::new(),
            is_charging: false,
            wearable_attached: false,
        }
    }

    /// Zero every actuator output.
    pub(crate) fn de_energise(&mut self) {
        self.current_voltage_v = 0.0;
        self.current_current_ma = 0.0;
        self.motor_running = false;
        self.heater_active = false;
    }

    /// Apply the physical side effect of an allowed command.
    pub(crate) fn apply(&mut self, cmd: HardwareCommand) {
        match cmd {
            HardwareCommand::EhdHighVoltage => {
                self.current_voltage_v = EHD_HIGH_VOLTAGE_V;
                self.current_current_ma = EHD_HIGH_CURRENT_MA;
            }
            HardwareCommand::EhdMediumVoltage => {
                self.current_voltage_v = EHD_MEDIUM_VOLTAGE_V;
                self.current_current_ma = EHD_MEDIUM_CURRENT_MA;
            }
            HardwareCommand::EhdLowVoltage => {
                self.current_voltage_v = EHD_LOW_VOLTAGE_V;
                self.current_current_ma = EHD_LOW_CURRENT_MA;
            }
            HardwareCommand::EhdOff => {
                self.current_voltage_v = 0.0;
                self.current_current_ma = 0.0;
            }
            HardwareCommand::MotorStart => self.motor_running = true,
            HardwareCommand::MotorStop => self.motor_running = false,
            HardwareCommand::HeaterOn => self.heater_active = true,
            HardwareCommand::HeaterOff => self.heater_active = false,
            HardwareCommand::ChargingStart => self.is_charging = true,
            HardwareCommand::ChargingStop => self.is_charging = false,
            HardwareCommand::SetIdle => self.de_energise(),
            HardwareCommand::EmergencyStop => {
                self.de_energise();
                self.is_charging = false;
            }
            // Routing and flashing have no telemetry-visible effect here.
            HardwareCommand::FirmwareUpdate | HardwareCommand::RafeReconfigure => {}
        }
    }
}

pub(crate) fn is_critical_code(code: &str) -> bool {
    CRITICAL_ERROR_PREFIXES.iter().any(|p| code.starts_with(p))
}

// ---------------------------------------------------------------------------
// Telemetry ingestion
// ---------------------------------------------------------------------------

/// Partial sensor update.  `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySample {
    pub skin_contact: Option<bool>,
    pub battery_temp_c: Option<f64>,
    pub battery_level_percent: Option<f64>,
    pub device_temp_c: Option<f64>,
    pub wearable_attached: Option<bool>,
    pub firmware_version: Option<String>,
    /// Replaces the full error-code list when present.
    pub error_codes: Option<Vec<String>>,
}

impl TelemetrySample {
    /// Reject NaN / infinite readings before they reach the state.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("battery_temp_c", self.battery_temp_c),
            ("battery_level_percent", self.battery_level_percent),
            ("device_temp_c", self.device_temp_c),
        ];
        for (name, value) in fields {
            if value.is_some_and(|v| !v.is_finite()) {
                return Err(Error::InvalidTelemetry(name));
            }
        }
        Ok(())
    }

    pub(crate) fn apply_to(self, state: &mut DeviceState) {
        if let Some(v) = self.skin_contact {
            state.skin_contact = v;
        }
        if let Some(v) = self.battery_temp_c {
            state.battery_temp_c = v;
        }
        if let Some(v) = self.battery_level_percent {
            state.battery_level_percent = v.clamp(0.0, 100.0);
        }
        if let Some(v) = self.device_temp_c {
            state.device_temp_c = v;
        }
        if let Some(v) = self.wearable_attached {
            state.wearable_attached = v;
        }
        if let Some(v) = self.firmware_version {
            state.firmware_version = v;
        }
        if let Some(v) = self.error_codes {
            state.error_codes = v;
        }
    }
}

// ---------------------------------------------------------------------------
// Continuous-operation timers
// ---------------------------------------------------------------------------

/// How long a latched actuator has been energised.
///
/// The run starts on the first allowed issue and only ends when the
/// actuator is switched off; reissuing the command does not restart it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunTimer {
    started_at_ms: Option<u64>,
}

impl RunTimer {
    /// Length of the live run at `now_ms`, zero when switched off.
    pub fn elapsed(&self, now_ms: u64) -> u64 {
        self.started_at_ms
            .map_or(0, |start| now_ms.saturating_sub(start))
    }

    /// Record an allowed issue of the command.
    pub fn record_issue(&mut self, now_ms: u64) {
        self.started_at_ms.get_or_insert(now_ms);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_running(&self) -> bool {
        self.started_at_ms.is_some()
    }
}

/// Timers for the two duty-limited actuators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContinuousTimers {
    pub high_voltage: RunTimer,
    pub motor: RunTimer,
}

impl ContinuousTimers {
    /// Update the timers after `cmd` has been allowed.
    pub fn on_allowed(&mut self, cmd: HardwareCommand, now_ms: u64) {
        match cmd {
            HardwareCommand::EhdHighVoltage => self.high_voltage.record_issue(now_ms),
            HardwareCommand::EhdMediumVoltage
            | HardwareCommand::EhdLowVoltage
            | HardwareCommand::EhdOff => self.high_voltage.clear(),
            HardwareCommand::MotorStart => self.motor.record_issue(now_ms),
            HardwareCommand::MotorStop => self.motor.clear(),
            HardwareCommand::SetIdle | HardwareCommand::EmergencyStop => self.clear(),
            _ => {}
        }
    }

    pub fn clear(&mut self) {
        self.high_voltage.clear();
        self.motor.clear();
    }
}
