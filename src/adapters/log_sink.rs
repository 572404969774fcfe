//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing device events through the `log`
//! facade.  This replaces any ad-hoc console output: the core itself
//! never prints.

use log::{error, info, warn};

use crate::app::events::DeviceEvent;
use crate::app::ports::EventSink;
use crate::safety::SafetyLevel;

/// Adapter that logs every [`DeviceEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &DeviceEvent) {
        match event {
            DeviceEvent::Safety(e) => {
                let r = &e.result;
                let forced = e
                    .forced_by
                    .as_deref()
                    .map(|a| format!(" forced_by={a}"))
                    .unwrap_or_default();
                match r.level {
                    SafetyLevel::Critical => error!(
                        "SAFETY #{} | {} | {} | {}{}",
                        e.id, e.origin, r.level, r.reason, forced
                    ),
                    SafetyLevel::Warning | SafetyLevel::Danger => warn!(
                        "SAFETY #{} | {} | {} | {}{}",
                        e.id, e.origin, r.level, r.reason, forced
                    ),
                    SafetyLevel::Safe | SafetyLevel::Caution => info!(
                        "SAFETY #{} | {} | {} | {}{}",
                        e.id, e.origin, r.level, r.reason, forced
                    ),
                }
            }
            DeviceEvent::ModeChanged(m) => {
                let changes: Vec<String> =
                    m.switch_changes.iter().map(ToString::to_string).collect();
                info!(
                    "RAFE | {} -> {} | {} ms | [{}]",
                    m.previous_mode,
                    m.new_mode,
                    m.transition_time_ms,
                    changes.join(", ")
                );
            }
            DeviceEvent::AnalyteSelected { analyte, mode } => {
                info!("RAFE | analyte={analyte} mode={mode}");
            }
            DeviceEvent::Calibrated(c) => {
                info!("RAFE | calibrated {} at {}", c.mode, c.calibrated_at_ms);
            }
            DeviceEvent::CommandFailed { command, error } => {
                warn!("CMD | {command} failed: {error}");
            }
        }
    }
}
