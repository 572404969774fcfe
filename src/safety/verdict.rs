//! Severity levels and check verdicts.
//!
//! Denials are values, not errors.  A caller that ignores the returned
//! [`SafetyCheckResult`] still cannot actuate hardware: side effects are
//! applied by the guard itself, and only when `allowed` is true.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Totally ordered severity.  The derive order **is** the escalation
/// order used to pick the winning denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SafetyLevel {
    /// Informational.
    Safe,
    /// Advisory; the command proceeds unless another check denies.
    Caution,
    /// Denied, recoverable by operator action.
    Warning,
    /// Denied, needs a corrective state change before retrying.
    Danger,
    /// Denied and forces an emergency stop that locks the system.
    Critical,
}

impl fmt::Display for SafetyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Safe => "SAFE",
            Self::Caution => "CAUTION",
            Self::Warning => "WARNING",
            Self::Danger => "DANGER",
            Self::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// Which of the six independent checks produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    SystemLock,
    SkinContact,
    BatteryTemperature,
    DeviceTemperature,
    BatteryLevel,
    ContinuousOperation,
    ErrorCodes,
    AiPrediction,
}

/// Outcome of a single check or of a full command evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyCheckResult {
    pub allowed: bool,
    pub level: SafetyLevel,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_action: Option<String>,
    #[serde(default)]
    pub human_verification_required: bool,
    #[serde(default)]
    pub emergency_stop: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<CheckKind>,
}

impl SafetyCheckResult {
    pub fn safe(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            level: SafetyLevel::Safe,
            reason: reason.into(),
            required_action: None,
            human_verification_required: false,
            emergency_stop: false,
            check: None,
        }
    }

    /// Allowed, but worth surfacing to the operator.
    pub fn advisory(check: CheckKind, reason: impl Into<String>) -> Self {
        Self {
            level: SafetyLevel::Caution,
            check: Some(check),
            ..Self::safe(reason)
        }
    }

    pub fn deny(check: CheckKind, level: SafetyLevel, reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            level,
            reason: reason.into(),
            required_action: None,
            human_verification_required: false,
            emergency_stop: level == SafetyLevel::Critical,
            check: Some(check),
        }
    }

    #[must_use]
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.required_action = Some(action.into());
        self
    }

    #[must_use]
    pub fn with_human_verification(mut self) -> Self {
        self.human_verification_required = true;
        self
    }

    pub fn is_denial(&self) -> bool {
        !self.allowed
    }
}

impl fmt::Display for SafetyCheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.allowed { "ALLOW" } else { "DENY" };
        write!(f, "{verdict} [{}] {}", self.level, self.reason)
    }
}

/// Pick the most severe denial.  Ties keep the first one, so check order
/// only matters between equally severe denials.
pub fn most_severe(results: &[SafetyCheckResult]) -> Option<&SafetyCheckResult> {
    results
        .iter()
        .filter(|r| r.is_denial())
        .fold(None, |best: Option<&SafetyCheckResult>, r| match best {
            Some(b) if b.level >= r.level => Some(b),
            _ => Some(r),
        })
}
