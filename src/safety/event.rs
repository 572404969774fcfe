//! Safety event log entries.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::command::HardwareCommand;
use super::device::DeviceState;
use super::verdict::SafetyCheckResult;

/// What caused a log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum EventOrigin {
    Command(HardwareCommand),
    EmergencyStop(StopReason),
    Unlock { admin_id: String },
    Telemetry,
    /// An actuator was switched off after outlasting its duty limit.
    DutyLimit(HardwareCommand),
}

impl fmt::Display for EventOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command(cmd) => write!(f, "{cmd}"),
            Self::EmergencyStop(reason) => write!(f, "EMERGENCY_STOP({reason})"),
            Self::Unlock { admin_id } => write!(f, "UNLOCK({admin_id})"),
            Self::Telemetry => f.write_str("TELEMETRY"),
            Self::DutyLimit(cmd) => write!(f, "DUTY_LIMIT({cmd})"),
        }
    }
}

/// Why an emergency stop ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    HeartbeatTimeout,
    /// A critical check denied a command.
    CriticalDenial(String),
    /// Explicit `EMERGENCY_STOP` command or operator request.
    Requested,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HeartbeatTimeout => f.write_str("HEARTBEAT_TIMEOUT"),
            Self::CriticalDenial(reason) => write!(f, "CRITICAL: {reason}"),
            Self::Requested => f.write_str("REQUESTED"),
        }
    }
}

/// One entry in the append-only safety log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyEvent {
    /// Monotonic per-guard sequence number.
    pub id: u64,
    pub timestamp_utc_ms: u64,
    pub origin: EventOrigin,
    /// Full device snapshot taken when the entry was written.
    pub device_state: DeviceState,
    pub result: SafetyCheckResult,
    /// Less severe denials from the same evaluation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suppressed: Vec<SafetyCheckResult>,
    /// Admin who forced a non-critical denial through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forced_by: Option<String>,
}

impl SafetyEvent {
    pub fn command(&self) -> Option<HardwareCommand> {
        match self.origin {
            EventOrigin::Command(cmd) => Some(cmd),
            _ => None,
        }
    }

    pub fn is_emergency_stop(&self) -> bool {
        matches!(self.origin, EventOrigin::EmergencyStop(_))
    }
}
