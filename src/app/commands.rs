//! Inbound commands to the device runtime.
//!
//! These represent actions requested by the outside world (UI, BLE
//! bridge, test harness) that the [`DeviceRuntime`](super::runtime::DeviceRuntime)
//! feeds into the [`DeviceService`](super::service::DeviceService).

use crate::rafe::RafeMode;
use crate::safety::{ExecuteOptions, HardwareCommand, TelemetrySample};

#[derive(Debug, Clone)]
pub enum RuntimeCommand {
    Hardware {
        command: HardwareCommand,
        options: ExecuteOptions,
    },
    Heartbeat,
    Telemetry(TelemetrySample),
    SetMode(RafeMode),
    SelectAnalyte(String),
    Calibrate,
    Unlock {
        password: String,
        admin_id: String,
    },
}

impl RuntimeCommand {
    pub fn hardware(command: HardwareCommand) -> Self {
        Self::Hardware {
            command,
            options: ExecuteOptions::default(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Hardware { .. } => "hardware",
            Self::Heartbeat => "heartbeat",
            Self::Telemetry(_) => "telemetry",
            Self::SetMode(_) => "set_mode",
            Self::SelectAnalyte(_) => "select_analyte",
            Self::Calibrate => "calibrate",
            Self::Unlock { .. } => "unlock",
        }
    }
}
