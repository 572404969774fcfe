//! Unified error types for the biosense control core.
//!
//! Safety denials are **not** errors: every hardware command returns a
//! [`SafetyCheckResult`](crate::safety::SafetyCheckResult) whose `allowed`
//! flag carries the outcome.  This enum is reserved for genuine failures
//! (malformed telemetry, unparsable names, lock contention, sink faults).

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A telemetry reading was NaN or infinite.  Carries the field name.
    InvalidTelemetry(&'static str),
    /// A hardware command name did not match any known command.
    UnknownCommand(String),
    /// A RAFE mode name did not match any known mode.
    UnknownMode(String),
    /// The RAFE mode lock is held by another owner.
    ModeLockHeld { owner: String },
    /// Calibration was requested in a mode that has nothing to calibrate.
    CalibrationUnavailable,
    /// The audit collaborator rejected or failed to store a record.
    Audit(AuditError),
    /// Configuration is invalid or could not be loaded.
    Config(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTelemetry(field) => write!(f, "telemetry: non-finite value for {field}"),
            Self::UnknownCommand(name) => write!(f, "unknown hardware command: {name}"),
            Self::UnknownMode(name) => write!(f, "unknown RAFE mode: {name}"),
            Self::ModeLockHeld { owner } => write!(f, "mode lock held by {owner}"),
            Self::CalibrationUnavailable => write!(f, "calibration unavailable in idle mode"),
            Self::Audit(e) => write!(f, "audit: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Audit sink errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditError {
    /// The sink is not reachable (storage offline, collaborator down).
    Unavailable,
    /// The record was refused (schema or chain validation failed).
    Rejected,
}

impl fmt::Display for AuditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "sink unavailable"),
            Self::Rejected => write!(f, "record rejected"),
        }
    }
}

impl From<AuditError> for Error {
    fn from(e: AuditError) -> Self {
        Self::Audit(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Config(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
