//! Integration test driver for the `tests/integration/` submodules.
//!
//! Each `mod` below exercises one layer against the in-memory adapters
//! and a [`ManualClock`](biosense::adapters::time::ManualClock).  Nothing
//! here needs real hardware; the runtime tests use real timers.

mod guard_tests;
mod mock_sinks;
mod rafe_tests;
mod runtime_tests;
