//! Deduplication ledger
//!
//! A bounded, insertion-ordered set of seen record identifiers plus the
//! high-water mark of processed creation timestamps. Exclusively owned and
//! mutated by the coordinator's event loop; there is no external writer, so
//! no locking lives here.

use std::collections::{HashSet, VecDeque};

/// Bounded set of seen record ids with a monotonic high-water mark
///
/// Dedup keys on the record identifier alone. If the upstream protocol ever
/// reuses an id for a distinct logical update, that update is suppressed;
/// update-class events travel on a separate, non-deduplicated event class
/// precisely so this stays safe.
#[derive(Debug)]
pub struct DedupLedger {
    seen: HashSet<String>,
    /// Insertion order, oldest at the front; drives trimming
    order: VecDeque<String>,
    /// Latest processed record-creation time, Unix milliseconds; 0 = unset
    high_water_mark: i64,
    max_entries: usize,
}

impl DedupLedger {
    /// Create an empty ledger that auto-trims above `max_entries`
    pub fn new(max_entries: usize) -> Self {
        Self {
            seen: HashSet::new(),
            order: VecDeque::new(),
            high_water_mark: 0,
            max_entries,
        }
    }

    /// Record an id and its creation time
    ///
    /// Returns `false` if the id was already present (a duplicate delivery);
    /// the caller suppresses the event in that case. On a fresh id the
    /// high-water mark advances if `created_at` is newer, and the ledger is
    /// trimmed in place if it now exceeds its bound.
    pub fn observe(&mut self, id: &str, created_at: i64) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        self.seen.insert(id.to_string());
        self.order.push_back(id.to_string());
        if created_at > self.high_water_mark {
            self.high_water_mark = created_at;
        }
        if self.order.len() > self.max_entries {
            self.trim(self.max_entries);
        }
        true
    }

    /// Whether `id` has been seen
    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Current number of ids held
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the ledger holds no ids
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Latest processed creation time (Unix milliseconds), 0 if unset
    pub fn high_water_mark(&self) -> i64 {
        self.high_water_mark
    }

    /// Trim the ledger if it exceeds `max_size`
    ///
    /// Retains only the most-recently-inserted `max_size / 2` entries,
    /// discarding the oldest. No-op when the ledger is within bounds. The
    /// high-water mark is untouched: trimming forgets ids, not progress.
    pub fn trim(&mut self, max_size: usize) {
        if self.order.len() <= max_size {
            return;
        }
        let keep = max_size / 2;
        while self.order.len() > keep {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let mut ledger = DedupLedger::new(100);
        assert!(ledger.observe("a", 10));
        assert!(!ledger.observe("a", 10));
        assert!(!ledger.observe("a", 99));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_high_water_mark_is_monotonic() {
        let mut ledger = DedupLedger::new(100);
        ledger.observe("a", 10);
        ledger.observe("b", 30);
        // Out-of-order delivery must not move the mark backwards
        ledger.observe("c", 20);
        assert_eq!(ledger.high_water_mark(), 30);
    }

    #[test]
    fn test_trim_keeps_most_recent_half() {
        let mut ledger = DedupLedger::new(10_000);
        for i in 0..100 {
            ledger.observe(&format!("m-{i}"), i);
        }
        ledger.trim(50);
        assert_eq!(ledger.len(), 25);
        assert!(!ledger.contains("m-0"));
        assert!(!ledger.contains("m-74"));
        assert!(ledger.contains("m-75"));
        assert!(ledger.contains("m-99"));
        // Progress survives trimming
        assert_eq!(ledger.high_water_mark(), 99);
    }

    #[test]
    fn test_trim_is_noop_within_bounds() {
        let mut ledger = DedupLedger::new(100);
        for i in 0..10 {
            ledger.observe(&format!("m-{i}"), i);
        }
        ledger.trim(10);
        assert_eq!(ledger.len(), 10);
    }

    #[test]
    fn test_auto_trim_on_insert() {
        let mut ledger = DedupLedger::new(10);
        for i in 0..11 {
            ledger.observe(&format!("m-{i}"), i);
        }
        // Exceeding the bound trims to the newest half
        assert_eq!(ledger.len(), 5);
        assert!(ledger.contains("m-10"));
        assert!(!ledger.contains("m-0"));
    }
}
