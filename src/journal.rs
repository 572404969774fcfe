//! Bounded, append-only event journal.
//!
//! Both the safety event log and the RAFE transition log keep the most
//! recent N entries.  When full, the oldest entry is evicted (FIFO); an
//! overflow is never an error.

use std::collections::VecDeque;

/// Default capacity shared by the safety and mode-change logs.
pub const DEFAULT_JOURNAL_CAPACITY: usize = 1000;

#[derive(Debug, Clone)]
pub struct Journal<T> {
    entries: VecDeque<T>,
    capacity: usize,
    /// Total appends since creation, including evicted entries.
    appended: u64,
}

impl<T> Journal<T> {
    /// Create a journal holding at most `capacity` entries (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(64)),
            capacity,
            appended: 0,
        }
    }

    /// Append an entry, evicting the oldest when full.
    pub fn push(&mut self, entry: T) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
        self.appended += 1;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries ever appended (monotonic, survives eviction).
    pub fn total_appended(&self) -> u64 {
        self.appended
    }

    pub fn last(&self) -> Option<&T> {
        self.entries.back()
    }

    /// Iterate oldest → newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.entries.iter()
    }
}

impl<T: Clone> Journal<T> {
    /// Copy out the most recent `limit` entries, oldest first.
    /// `None` returns everything.
    pub fn recent(&self, limit: Option<usize>) -> Vec<T> {
        let take = limit.unwrap_or(self.entries.len()).min(self.entries.len());
        let skip = self.entries.len() - take;
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// Entries appended after `total_appended()` returned `mark`.
    /// Anything already evicted is silently skipped.
    pub fn since(&self, mark: u64) -> Vec<T> {
        let fresh = self.appended.saturating_sub(mark);
        let take = usize::try_from(fresh).unwrap_or(usize::MAX).min(self.entries.len());
        self.recent(Some(take))
    }
}

impl<T> Default for Journal<T> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_JOURNAL_CAPACITY)
    }
}
