//! Owner-scoped RAFE mode lock.
//!
//! Independent of the safety guard's system lock.  While held, mode
//! changes and analyte selections are silent no-ops.  Without a lease a
//! lock is held until its owner releases it; with a lease it lapses on
//! the first access after expiry.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Holder {
    owner: String,
    reason: String,
    locked_at_ms: u64,
}

/// Snapshot for callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeLockStatus {
    pub locked: bool,
    pub owner: Option<String>,
    pub reason: Option<String>,
    pub locked_at_ms: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct ModeLock {
    holder: Option<Holder>,
    lease_ms: Option<u64>,
}

impl ModeLock {
    pub fn new(lease_ms: Option<u64>) -> Self {
        Self {
            holder: None,
            lease_ms,
        }
    }

    /// Take the lock, or refresh the reason if `owner` already holds it.
    pub fn acquire(&mut self, owner: &str, reason: &str, now_ms: u64) -> Result<()> {
        self.expire(now_ms);
        match &mut self.holder {
            Some(h) if h.owner != owner => {
                warn!("rafe: mode lock request by {owner} refused, held by {}", h.owner);
                Err(Error::ModeLockHeld {
                    owner: h.owner.clone(),
                })
            }
            Some(h) => {
                h.reason = reason.to_string();
                Ok(())
            }
            None => {
                info!("rafe: mode locked by {owner}: {reason}");
                self.holder = Some(Holder {
                    owner: owner.to_string(),
                    reason: reason.to_string(),
                    locked_at_ms: now_ms,
                });
                Ok(())
            }
        }
    }

    /// Release if `owner` holds the lock.  Other owners are ignored.
    pub fn release(&mut self, owner: &str, now_ms: u64) -> bool {
        self.expire(now_ms);
        match &self.holder {
            Some(h) if h.owner == owner => {
                info!("rafe: mode lock released by {owner}");
                self.holder = None;
                true
            }
            Some(h) => {
                warn!("rafe: {owner} tried to release mode lock held by {}", h.owner);
                false
            }
            None => false,
        }
    }

    pub fn is_locked(&mut self, now_ms: u64) -> bool {
        self.expire(now_ms);
        self.holder.is_some()
    }

    /// Read-only view; a lapsed lease reads as unlocked.
    pub fn status(&self, now_ms: u64) -> ModeLockStatus {
        match self.live_holder(now_ms) {
            Some(h) => ModeLockStatus {
                locked: true,
                owner: Some(h.owner.clone()),
                reason: Some(h.reason.clone()),
                locked_at_ms: Some(h.locked_at_ms),
            },
            None => ModeLockStatus::default(),
        }
    }

    fn live_holder(&self, now_ms: u64) -> Option<&Holder> {
        self.holder
            .as_ref()
            .filter(|h| !self.lease_ms.is_some_and(|lease| lease_lapsed(h, lease, now_ms)))
    }

    fn expire(&mut self, now_ms: u64) {
        let (Some(lease), Some(h)) = (self.lease_ms, &self.holder) else {
            return;
        };
        if lease_lapsed(h, lease, now_ms) {
            info!("rafe: mode lock of {} lapsed after {lease} ms", h.owner);
            self.holder = None;
        }
    }
}

fn lease_lapsed(holder: &Holder, lease_ms: u64, now_ms: u64) -> bool {
    now_ms.saturating_sub(holder.locked_at_ms) >= lease_ms
}
