//! Hard-coded safety thresholds.
//!
//! These are deliberately `const` rather than [`SystemConfig`] fields so a
//! compromised configuration channel cannot widen them.
//!
//! [`SystemConfig`]: crate::config::SystemConfig

// ── Skin contact / voltage ───────────────────────────────────────

/// Highest electrode voltage (V) allowed while the device touches skin.
pub const SKIN_SAFE_VOLTAGE_V: f64 = 12.0;

/// EHD drive levels applied as command side effects.
pub const EHD_HIGH_VOLTAGE_V: f64 = 3_500.0;
pub const EHD_HIGH_CURRENT_MA: f64 = 0.15;
pub const EHD_MEDIUM_VOLTAGE_V: f64 = 24.0;
pub const EHD_MEDIUM_CURRENT_MA: f64 = 2.0;
pub const EHD_LOW_VOLTAGE_V: f64 = 5.0;
pub const EHD_LOW_CURRENT_MA: f64 = 0.5;

// ── Battery ──────────────────────────────────────────────────────

pub const BATTERY_TEMP_MIN_C: f64 = 0.0;
pub const BATTERY_TEMP_MAX_C: f64 = 45.0;
/// Distance from either battery limit that produces a caution advisory.
pub const BATTERY_TEMP_MARGIN_C: f64 = 5.0;

/// Below this only stop / charge / idle commands are accepted.
pub const BATTERY_CRITICAL_PERCENT: f64 = 5.0;
/// Below this high-power commands are refused.
pub const BATTERY_LOW_PERCENT: f64 = 20.0;

// ── Device temperature ───────────────────────────────────────────

/// Above this every command is refused and the device is stopped.
pub const DEVICE_TEMP_CRITICAL_C: f64 = 50.0;
/// Above this the heater may not be switched on.
pub const DEVICE_TEMP_HEATER_MAX_C: f64 = 40.0;

// ── Continuous operation ─────────────────────────────────────────

pub const MAX_CONTINUOUS_HIGH_VOLTAGE_MS: u64 = 30_000;
pub const MAX_CONTINUOUS_MOTOR_MS: u64 = 60_000;

// ── Error codes ──────────────────────────────────────────────────

pub const CRITICAL_ERROR_PREFIXES: [&str; 2] = ["CRIT_", "FATAL_"];

// ── Watchdog ─────────────────────────────────────────────────────

pub const WATCHDOG_TICK_MS: u64 = 500;
pub const HEARTBEAT_TIMEOUT_MS: u64 = 2_000;

// ── AI prediction gate ───────────────────────────────────────────

pub const MIN_PREDICTION_CONFIDENCE: f64 = 0.7;
