//! Application core.
//!
//! [`service::DeviceService`] composes the safety guard and the RAFE
//! controller; [`runtime::DeviceRuntime`] drives it from a command inbox
//! and a watchdog timer.  Everything outside the process (clock, event
//! consumers, audit trail) is reached through the **port traits** in
//! [`ports`], so the whole layer runs in tests without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod runtime;
pub mod service;
