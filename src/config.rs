//! System configuration parameters
//!
//! Only operational knobs live here.  Safety thresholds (temperatures,
//! battery levels, voltage ceilings, watchdog timing) are compile-time
//! constants in [`crate::safety::limits`] and cannot be changed at runtime.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Environment variable holding the admin override shared secret.
pub const OVERRIDE_KEY_ENV: &str = "SAFETY_OVERRIDE_KEY";
/// Optional mode-lock lease in milliseconds (unset = locks never expire).
pub const MODE_LOCK_LEASE_ENV: &str = "BIOSENSE_MODE_LOCK_LEASE_MS";
/// `0`/`false` disables the simulated RAFE settle and calibration delays.
pub const SIMULATE_LATENCY_ENV: &str = "BIOSENSE_SIMULATE_LATENCY";
/// User id stamped on audit records written by the core.
pub const AUDIT_USER_ENV: &str = "BIOSENSE_AUDIT_USER";

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    // --- Admin unlock ---
    /// Shared secret compared against the `unlock()` password.
    /// `None` means the system lock can never be cleared.
    #[serde(skip_serializing)]
    pub override_key: Option<String>,

    // --- RAFE ---
    /// Mode-lock lease.  `None` keeps a lock until its owner releases it.
    pub mode_lock_lease_ms: Option<u64>,
    /// Actually sleep for the simulated settle / calibration time.
    /// The reported `transition_time_ms` is unaffected.
    pub simulate_latency: bool,

    // --- Audit ---
    /// User id recorded on audit entries the core writes on its own behalf.
    pub audit_user_id: String,
    /// Firmware version reported in the initial device state.
    pub firmware_version: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            override_key: None,

            mode_lock_lease_ms: None,
            simulate_latency: true,

            audit_user_id: "system".into(),
            firmware_version: "1.0.0".into(),
        }
    }
}

impl SystemConfig {
    /// Defaults plus process environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Parse a JSON document; missing fields fall back to defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup (the environment in
    /// production, a map in tests).
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(OVERRIDE_KEY_ENV)
            && !key.is_empty()
        {
            self.override_key = Some(key);
        }

        if let Some(lease) = lookup(MODE_LOCK_LEASE_ENV) {
            match lease.trim().parse::<u64>() {
                Ok(0) => self.mode_lock_lease_ms = None,
                Ok(ms) => self.mode_lock_lease_ms = Some(ms),
                Err(_) => log::warn!("ignoring invalid {MODE_LOCK_LEASE_ENV}={lease:?}"),
            }
        }

        if let Some(flag) = lookup(SIMULATE_LATENCY_ENV) {
            match flag.trim().to_ascii_lowercase().as_str() {
                "0" | "false" | "off" | "no" => self.simulate_latency = false,
                "1" | "true" | "on" | "yes" => self.simulate_latency = true,
                _ => log::warn!("ignoring invalid {SIMULATE_LATENCY_ENV}={flag:?}"),
            }
        }

        if let Some(user) = lookup(AUDIT_USER_ENV)
            && !user.is_empty()
        {
            self.audit_user_id = user;
        }
    }
}
