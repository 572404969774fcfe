//! Port traits — the hexagonal boundary between the control core and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ SafetyGuard / RafeController / DeviceService
//! ```
//!
//! Driven adapters (clocks, event sinks, the audit chain) implement these
//! traits.  The domain consumes them through generics or boxed trait
//! objects, so nothing in the core touches a real timer, logger or
//! database directly.
//!
//! ## Security notes
//!
//! - **AuditSink** is write-only from the core's point of view.  The
//!   hash chain itself lives in the collaborator.
//! - A failing audit sink never changes a safety verdict.

use serde::Serialize;

use super::events::DeviceEvent;
use crate::error::AuditError;

// ───────────────────────────────────────────────────────────────
// Clock port (driven adapter: timer → domain)
// ───────────────────────────────────────────────────────────────

/// Time source for heartbeats, continuous-operation timers and event
/// timestamps.
pub trait Clock {
    /// Monotonic milliseconds since an arbitrary origin.
    fn now_ms(&self) -> u64;

    /// Wall-clock milliseconds since the Unix epoch (event timestamps only).
    fn utc_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / dashboard)
// ───────────────────────────────────────────────────────────────

/// The service emits structured [`DeviceEvent`]s through this port.
/// Adapters decide where they go (log lines, a dashboard feed, a test
/// recorder).
pub trait EventSink {
    fn emit(&mut self, event: &DeviceEvent);
}

// ───────────────────────────────────────────────────────────────
// Audit port (collaborator boundary: tamper-evident audit chain)
// ───────────────────────────────────────────────────────────────

/// One entry handed to the audit chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    pub user_id: String,
    pub action_type: String,
    pub old_val: Option<String>,
    pub new_val: Option<String>,
    pub reason: String,
    pub record_type: String,
    pub record_id: String,
    /// Full context (device snapshot, verdict) as JSON.
    pub data_record: serde_json::Value,
}

/// Acknowledgement returned by the audit chain after appending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditReceipt {
    /// Position of the record in the chain.
    pub sequence: u64,
    /// Hex digest of the chained record, as computed by the collaborator.
    pub hash: String,
}

/// Write-only sink for safety-relevant events.
pub trait AuditSink {
    fn append(&mut self, record: AuditRecord) -> Result<AuditReceipt, AuditError>;
}
