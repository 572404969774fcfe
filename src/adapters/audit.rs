//! Audit sink adapters.
//!
//! The real tamper-evident chain is an external collaborator.  These
//! adapters stand in for it:
//!
//! - [`LogAuditSink`] writes each record as one JSON log line.
//! - [`MemoryAuditSink`] keeps records in memory and chains them with
//!   SHA-256 (`hash_n = H(hash_{n-1} || json_n)`), which is enough for
//!   tests and local replay.

use std::cell::RefCell;
use std::rc::Rc;

use log::info;

use crate::app::ports::{AuditReceipt, AuditRecord, AuditSink};
use crate::error::AuditError;

fn hex(bytes: &[u8]) -> String {
    use core::fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

#[derive(Debug, Default)]
pub struct LogAuditSink {
    sequence: u64,
}

impl LogAuditSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditSink for LogAuditSink {
    fn append(&mut self, record: AuditRecord) -> Result<AuditReceipt, AuditError> {
        let json = serde_json::to_string(&record).map_err(|_| AuditError::Rejected)?;
        self.sequence += 1;
        info!("AUDIT #{} {json}", self.sequence);
        Ok(AuditReceipt {
            sequence: self.sequence,
            hash: hex(&hmac_sha256::Hash::hash(json.as_bytes())),
        })
    }
}

/// One stored entry of [`MemoryAuditSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChainedRecord {
    pub record: AuditRecord,
    pub hash: [u8; 32],
}

#[derive(Debug, Default)]
struct Chain {
    entries: Vec<ChainedRecord>,
    offline: bool,
}

/// In-memory hash-chained sink.  Clones share one chain so a test can
/// keep a handle after boxing the sink into the guard.
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditSink {
    chain: Rc<RefCell<Chain>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.chain
            .borrow()
            .entries
            .iter()
            .map(|e| e.record.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.chain.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Simulate the collaborator going away.
    pub fn set_offline(&self, offline: bool) {
        self.chain.borrow_mut().offline = offline;
    }

    /// Recompute every link.  `false` if any record was altered.
    pub fn verify_chain(&self) -> bool {
        let chain = self.chain.borrow();
        let mut prev = [0u8; 32];
        for entry in &chain.entries {
            let Ok(json) = serde_json::to_vec(&entry.record) else {
                return false;
            };
            if link(&prev, &json) != entry.hash {
                return false;
            }
            prev = entry.hash;
        }
        true
    }

    #[cfg(test)]
    fn tamper(&self, index: usize, reason: &str) {
        self.chain.borrow_mut().entries[index].record.reason = reason.into();
    }
}

fn link(prev: &[u8; 32], json: &[u8]) -> [u8; 32] {
    let mut h = hmac_sha256::Hash::new();
    h.update(prev);
    h.update(json);
    h.finalize()
}

impl AuditSink for MemoryAuditSink {
    fn append(&mut self, record: AuditRecord) -> Result<AuditReceipt, AuditError> {
        let mut chain = self.chain.borrow_mut();
        if chain.offline {
            return Err(AuditError::Unavailable);
        }
        let json = serde_json::to_vec(&record).map_err(|_| AuditError::Rejected)?;
        let prev = chain.entries.last().map_or([0u8; 32], |e| e.hash);
        let hash = link(&prev, &json);
        chain.entries.push(ChainedRecord { record, hash });
        Ok(AuditReceipt {
            sequence: chain.entries.len() as u64,
            hash: hex(&hash),
        })
    }
}
