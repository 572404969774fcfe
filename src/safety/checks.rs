//! The six independent checks run against every hardware command.
//!
//! Each check is a pure function of the command, the current
//! [`DeviceState`] and the continuous-operation timers.  None of them
//! short-circuits the others: the guard collects all six verdicts and
//! escalates to the most severe denial.
//!
//! `EmergencyStop` is exempt from every check.

use super::command::HardwareCommand;
use super::device::{ContinuousTimers, DeviceState, is_critical_code};
use super::limits::{
    BATTERY_CRITICAL_PERCENT, BATTERY_LOW_PERCENT, BATTERY_TEMP_MARGIN_C, BATTERY_TEMP_MAX_C,
    BATTERY_TEMP_MIN_C, DEVICE_TEMP_CRITICAL_C, DEVICE_TEMP_HEATER_MAX_C,
    MAX_CONTINUOUS_HIGH_VOLTAGE_MS, MAX_CONTINUOUS_MOTOR_MS, SKIN_SAFE_VOLTAGE_V,
};
use super::verdict::{CheckKind, SafetyCheckResult, SafetyLevel};

/// Everything a check may look at.
#[derive(Debug, Clone, Copy)]
pub struct CheckContext<'a> {
    pub command: HardwareCommand,
    pub state: &'a DeviceState,
    pub timers: &'a ContinuousTimers,
    pub now_ms: u64,
}

/// Run the full battery in a fixed order.
pub fn run_all(ctx: &CheckContext<'_>) -> [SafetyCheckResult; 6] {
    [
        skin_contact(ctx),
        battery_temperature(ctx),
        device_temperature(ctx),
        battery_level(ctx),
        continuous_operation(ctx),
        error_codes(ctx),
    ]
}

fn exempt(ctx: &CheckContext<'_>, check: CheckKind) -> Option<SafetyCheckResult> {
    (ctx.command == HardwareCommand::EmergencyStop).then(|| SafetyCheckResult {
        check: Some(check),
        ..SafetyCheckResult::safe("emergency stop is always permitted")
    })
}

// ── Skin contact ─────────────────────────────────────────────────

pub fn skin_contact(ctx: &CheckContext<'_>) -> SafetyCheckResult {
    const CHECK: CheckKind = CheckKind::SkinContact;
    if let Some(r) = exempt(ctx, CHECK) {
        return r;
    }
    let s = ctx.state;

    if ctx.command.is_high_voltage() && s.skin_contact {
        return SafetyCheckResult::deny(
            CHECK,
            SafetyLevel::Critical,
            "High voltage requested while the device is in skin contact",
        )
        .with_action("Remove the device from skin before enabling the EHD intake");
    }

    if ctx.command.is_medium_voltage() && s.skin_contact && s.current_voltage_v > SKIN_SAFE_VOLTAGE_V {
        return SafetyCheckResult::deny(
            CHECK,
            SafetyLevel::Danger,
            format!(
                "Measured {:.1} V exceeds the {SKIN_SAFE_VOLTAGE_V:.0} V skin-safe ceiling during skin contact",
                s.current_voltage_v
            ),
        )
        .with_action("Discharge the electrodes or break skin contact");
    }

    SafetyCheckResult {
        check: Some(CHECK),
        ..SafetyCheckResult::safe("Skin contact check passed")
    }
}

// ── Battery temperature ──────────────────────────────────────────

pub fn battery_temperature(ctx: &CheckContext<'_>) -> SafetyCheckResult {
    const CHECK: CheckKind = CheckKind::BatteryTemperature;
    if let Some(r) = exempt(ctx, CHECK) {
        return r;
    }
    let t = ctx.state.battery_temp_c;
    let sensitive = ctx.command.is_charging() || ctx.command.is_high_power();

    if sensitive && !(BATTERY_TEMP_MIN_C..=BATTERY_TEMP_MAX_C).contains(&t) {
        return SafetyCheckResult::deny(
            CHECK,
            SafetyLevel::Danger,
            format!(
                "Battery temperature {t:.1}°C outside {BATTERY_TEMP_MIN_C:.0}–{BATTERY_TEMP_MAX_C:.0}°C"
            ),
        )
        .with_action("Let the battery return to its operating range");
    }

    if sensitive
        && (t < BATTERY_TEMP_MIN_C + BATTERY_TEMP_MARGIN_C
            || t > BATTERY_TEMP_MAX_C - BATTERY_TEMP_MARGIN_C)
    {
        return SafetyCheckResult::advisory(
            CHECK,
            format!("Battery temperature {t:.1}°C is near its limit"),
        );
    }

    SafetyCheckResult {
        check: Some(CHECK),
        ..SafetyCheckResult::safe("Battery temperature nominal")
    }
}

// ── Device temperature ───────────────────────────────────────────

pub fn device_temperature(ctx: &CheckContext<'_>) -> SafetyCheckResult {
    const CHECK: CheckKind = CheckKind::DeviceTemperature;
    if let Some(r) = exempt(ctx, CHECK) {
        return r;
    }
    let t = ctx.state.device_temp_c;

    if t > DEVICE_TEMP_CRITICAL_C {
        return SafetyCheckResult::deny(
            CHECK,
            SafetyLevel::Critical,
            format!("Device temperature {t:.1}°C exceeds {DEVICE_TEMP_CRITICAL_C:.0}°C"),
        )
        .with_action("Allow the device to cool, then request an admin unlock");
    }

    if ctx.command == HardwareCommand::HeaterOn && t > DEVICE_TEMP_HEATER_MAX_C {
        return SafetyCheckResult::deny(
            CHECK,
            SafetyLevel::Warning,
            format!("Heater blocked: device at {t:.1}°C (max {DEVICE_TEMP_HEATER_MAX_C:.0}°C)"),
        )
        .with_action("Wait for the device to cool below the heater limit");
    }

    SafetyCheckResult {
        check: Some(CHECK),
        ..SafetyCheckResult::safe("Device temperature nominal")
    }
}

// ── Battery level ────────────────────────────────────────────────

pub fn battery_level(ctx: &CheckContext<'_>) -> SafetyCheckResult {
    const CHECK: CheckKind = CheckKind::BatteryLevel;
    if let Some(r) = exempt(ctx, CHECK) {
        return r;
    }
    let level = ctx.state.battery_level_percent;

    if level < BATTERY_CRITICAL_PERCENT && !ctx.command.is_low_battery_exempt() {
        return SafetyCheckResult::deny(
            CHECK,
            SafetyLevel::Danger,
            format!("Battery critically low ({level:.0}%): only stop, charge or idle permitted"),
        )
        .with_action("Connect the charger");
    }

    if level < BATTERY_LOW_PERCENT {
        if ctx.command.is_high_power() {
            return SafetyCheckResult::deny(
                CHECK,
                SafetyLevel::Warning,
                format!("Battery low ({level:.0}%): high-power commands disabled"),
            )
            .with_action("Charge above 20% to re-enable high-power functions");
        }
        return SafetyCheckResult::advisory(CHECK, format!("Battery low ({level:.0}%)"));
    }

    SafetyCheckResult {
        check: Some(CHECK),
        ..SafetyCheckResult::safe("Battery level sufficient")
    }
}

// ── Continuous operation ─────────────────────────────────────────

pub fn continuous_operation(ctx: &CheckContext<'_>) -> SafetyCheckResult {
    const CHECK: CheckKind = CheckKind::ContinuousOperation;
    if let Some(r) = exempt(ctx, CHECK) {
        return r;
    }

    if ctx.command == HardwareCommand::EhdHighVoltage {
        let run = ctx.timers.high_voltage.elapsed(ctx.now_ms);
        if run > MAX_CONTINUOUS_HIGH_VOLTAGE_MS {
            return SafetyCheckResult::deny(
                CHECK,
                SafetyLevel::Warning,
                format!(
                    "High voltage continuously on for {}s (max {}s)",
                    run / 1000,
                    MAX_CONTINUOUS_HIGH_VOLTAGE_MS / 1000
                ),
            )
            .with_action("Switch the EHD intake off before restarting");
        }
    }

    if ctx.command == HardwareCommand::MotorStart {
        let run = ctx.timers.motor.elapsed(ctx.now_ms);
        if run > MAX_CONTINUOUS_MOTOR_MS {
            return SafetyCheckResult::deny(
                CHECK,
                SafetyLevel::Warning,
                format!(
                    "Motor continuously running for {}s (max {}s)",
                    run / 1000,
                    MAX_CONTINUOUS_MOTOR_MS / 1000
                ),
            )
            .with_action("Stop the motor and let it rest");
        }
    }

    SafetyCheckResult {
        check: Some(CHECK),
        ..SafetyCheckResult::safe("Duty cycle within limits")
    }
}

// ── Error codes ──────────────────────────────────────────────────

pub fn error_codes(ctx: &CheckContext<'_>) -> SafetyCheckResult {
    const CHECK: CheckKind = CheckKind::ErrorCodes;
    if let Some(r) = exempt(ctx, CHECK) {
        return r;
    }
    let codes = &ctx.state.error_codes;

    let critical: Vec<&str> = codes
        .iter()
        .map(String::as_str)
        .filter(|c| is_critical_code(c))
        .collect();
    if !critical.is_empty() {
        return SafetyCheckResult::deny(
            CHECK,
            SafetyLevel::Danger,
            format!("Critical error codes outstanding: {}", critical.join(", ")),
        )
        .with_action("Resolve the faults; only EMERGENCY_STOP is accepted meanwhile");
    }

    if !codes.is_empty() {
        return SafetyCheckResult::advisory(
            CHECK,
            format!("Non-critical error codes present: {}", codes.join(", ")),
        );
    }

    SafetyCheckResult {
        check: Some(CHECK),
        ..SafetyCheckResult::safe("No error codes")
    }
}
