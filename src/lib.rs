//! Biosense control core.
//!
//! Two cooperating components sit between the host software and the
//! sensing hardware of a handheld biosensing device:
//!
//! * [`safety::SafetyGuard`] gates every hardware command, runs the
//!   heartbeat watchdog and latches the system lock after an emergency
//!   stop.
//! * [`rafe::RafeController`] reconfigures the analog front end between
//!   measurement modes by switching an 8-way switch matrix.
//!
//! [`app::service::DeviceService`] wires the two together and
//! [`app::runtime::DeviceRuntime`] runs them on a single-threaded
//! executor.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod journal;
pub mod rafe;
pub mod safety;

pub use app::service::DeviceService;
pub use config::SystemConfig;
pub use error::{Error, Result};
pub use rafe::{RafeController, RafeMode};
pub use safety::{HardwareCommand, SafetyGuard};
