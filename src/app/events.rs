//! Outbound device events.
//!
//! The [`DeviceService`](super::service::DeviceService) emits these through
//! the [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log lines, a dashboard feed, a test
//! recorder.

use serde::Serialize;

use crate::error::Error;
use crate::rafe::{CalibrationReport, ModeChangeEvent, RafeMode};
use crate::safety::SafetyEvent;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum DeviceEvent {
    /// A new entry in the safety log.
    Safety(SafetyEvent),
    /// A committed RAFE mode transition.
    ModeChanged(ModeChangeEvent),
    AnalyteSelected { analyte: String, mode: RafeMode },
    Calibrated(CalibrationReport),
    /// A runtime command failed outright (not a safety denial).
    CommandFailed {
        command: &'static str,
        #[serde(serialize_with = "serialize_display")]
        error: Error,
    },
}

fn serialize_display<S: serde::Serializer>(e: &Error, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(e)
}
