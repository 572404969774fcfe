//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements | Connects to                      |
//! |------------|------------|----------------------------------|
//! | `audit`    | AuditSink  | JSON log lines / in-memory chain |
//! | `log_sink` | EventSink  | `log` facade                     |
//! | `time`     | Clock      | `std::time` / manual test clock  |

pub mod audit;
pub mod log_sink;
pub mod time;
