//! Hardware commands accepted by the HAL lock.
//!
//! Every physical actuation is one of these variants.  Classification
//! helpers (`is_high_power`, `is_low_battery_exempt`, …) drive the check
//! battery; they are exhaustive matches so adding a command forces a
//! decision in each of them.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HardwareCommand {
    /// EHD (ionic wind) intake at full kilovolt drive.
    EhdHighVoltage,
    /// EHD intake at reduced drive.
    EhdMediumVoltage,
    /// EHD electrode bias only.
    EhdLowVoltage,
    EhdOff,
    MotorStart,
    MotorStop,
    HeaterOn,
    HeaterOff,
    ChargingStart,
    ChargingStop,
    FirmwareUpdate,
    /// Re-route the analog front-end switch matrix.
    RafeReconfigure,
    /// De-energise every actuator without locking.
    SetIdle,
    EmergencyStop,
}

impl HardwareCommand {
    pub const ALL: [Self; 14] = [
        Self::EhdHighVoltage,
        Self::EhdMediumVoltage,
        Self::EhdLowVoltage,
        Self::EhdOff,
        Self::MotorStart,
        Self::MotorStop,
        Self::HeaterOn,
        Self::HeaterOff,
        Self::ChargingStart,
        Self::ChargingStop,
        Self::FirmwareUpdate,
        Self::RafeReconfigure,
        Self::SetIdle,
        Self::EmergencyStop,
    ];

    /// Wire name, e.g. `EHD_HIGH_VOLTAGE`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EhdHighVoltage => "EHD_HIGH_VOLTAGE",
            Self::EhdMediumVoltage => "EHD_MEDIUM_VOLTAGE",
            Self::EhdLowVoltage => "EHD_LOW_VOLTAGE",
            Self::EhdOff => "EHD_OFF",
            Self::MotorStart => "MOTOR_START",
            Self::MotorStop => "MOTOR_STOP",
            Self::HeaterOn => "HEATER_ON",
            Self::HeaterOff => "HEATER_OFF",
            Self::ChargingStart => "CHARGING_START",
            Self::ChargingStop => "CHARGING_STOP",
            Self::FirmwareUpdate => "FIRMWARE_UPDATE",
            Self::RafeReconfigure => "RAFE_RECONFIGURE",
            Self::SetIdle => "SET_IDLE",
            Self::EmergencyStop => "EMERGENCY_STOP",
        }
    }

    pub const fn is_high_voltage(self) -> bool {
        matches!(self, Self::EhdHighVoltage)
    }

    pub const fn is_medium_voltage(self) -> bool {
        matches!(self, Self::EhdMediumVoltage)
    }

    pub const fn is_charging(self) -> bool {
        matches!(self, Self::ChargingStart)
    }

    /// Commands that draw significant current from the battery.
    pub const fn is_high_power(self) -> bool {
        match self {
            Self::EhdHighVoltage
            | Self::EhdMediumVoltage
            | Self::MotorStart
            | Self::HeaterOn
            | Self::FirmwareUpdate => true,
            Self::EhdLowVoltage
            | Self::EhdOff
            | Self::MotorStop
            | Self::HeaterOff
            | Self::ChargingStart
            | Self::ChargingStop
            | Self::RafeReconfigure
            | Self::SetIdle
            | Self::EmergencyStop => false,
        }
    }

    /// Stop / charge / idle commands that remain available on a nearly
    /// empty battery.
    pub const fn is_low_battery_exempt(self) -> bool {
        match self {
            Self::EhdOff
            | Self::MotorStop
            | Self::HeaterOff
            | Self::ChargingStart
            | Self::ChargingStop
            | Self::SetIdle
            | Self::EmergencyStop => true,
            Self::EhdHighVoltage
            | Self::EhdMediumVoltage
            | Self::EhdLowVoltage
            | Self::MotorStart
            | Self::HeaterOn
            | Self::FirmwareUpdate
            | Self::RafeReconfigure => false,
        }
    }
}

impl fmt::Display for HardwareCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HardwareCommand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::UnknownCommand(s.to_string()))
    }
}
