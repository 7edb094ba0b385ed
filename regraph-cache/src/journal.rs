//! Modification journal - freshness bookkeeping for cached values.
//!
//! The journal memoizes the fingerprint of each normalized source record as
//! currently observed, scoped to a generation. A round against the same
//! storage snapshot reuses memoized fingerprints; a new snapshot (or an
//! explicit invalidation) bumps the generation so every check recomputes.
//! The cached denormalized values themselves live elsewhere - flushing or
//! invalidating the journal never drops them.

use crate::key::DescriptorKey;
use chrono::Utc;
use regraph_core::{record_fingerprint, ContentHash, Timestamp};
use serde_json::Value;
use std::collections::HashMap;

/// A memoized observation of a source record's fingerprint.
#[derive(Debug, Clone)]
struct Observation {
    fingerprint: ContentHash,
    generation: u64,
    #[allow(dead_code)]
    // Retained for future staleness reporting.
    observed_at: Timestamp,
}

/// Freshness bookkeeping for cached denormalized values.
#[derive(Debug, Default)]
pub struct ModificationJournal {
    generation: u64,
    observed: HashMap<DescriptorKey, Observation>,
}

impl ModificationJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a recorded dependency fingerprint against the current source
    /// record, memoizing the current fingerprint for this generation.
    pub fn is_fresh(
        &mut self,
        key: &DescriptorKey,
        expected: &ContentHash,
        current: Option<&Value>,
    ) -> bool {
        self.current_fingerprint(key, current) == *expected
    }

    /// Whether a freshness check for this key has already been performed in
    /// the current generation.
    pub fn is_checked(&self, key: &DescriptorKey) -> bool {
        self.observed
            .get(key)
            .is_some_and(|obs| obs.generation == self.generation)
    }

    /// Record a known-current fingerprint, e.g. one computed while resolving.
    pub fn observe(&mut self, key: DescriptorKey, fingerprint: ContentHash) {
        self.observed.insert(
            key,
            Observation {
                fingerprint,
                generation: self.generation,
                observed_at: Utc::now(),
            },
        );
    }

    /// Require revalidation: memoized fingerprints from earlier generations
    /// are no longer trusted, but nothing is dropped.
    pub fn invalidate(&mut self) {
        self.generation += 1;
    }

    /// Drop all bookkeeping.
    pub fn flush(&mut self) {
        self.observed.clear();
        self.generation += 1;
    }

    pub fn len(&self) -> usize {
        self.observed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observed.is_empty()
    }

    fn current_fingerprint(&mut self, key: &DescriptorKey, current: Option<&Value>) -> ContentHash {
        if let Some(obs) = self.observed.get(key) {
            if obs.generation == self.generation {
                return obs.fingerprint;
            }
        }
        let fingerprint = record_fingerprint(current);
        self.observe(key.clone(), fingerprint);
        fingerprint
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use regraph_core::Descriptor;
    use serde_json::json;

    fn key(id: i64) -> DescriptorKey {
        DescriptorKey::for_item(&Descriptor::new(id, "user"))
    }

    #[test]
    fn test_fresh_when_record_unchanged() {
        let mut journal = ModificationJournal::new();
        let record = json!({"id": 1, "type": "user", "attributes": {"name": "Ada"}});
        let expected = record_fingerprint(Some(&record));

        assert!(journal.is_fresh(&key(1), &expected, Some(&record)));
        assert!(journal.is_checked(&key(1)));
    }

    #[test]
    fn test_stale_when_record_changed() {
        let mut journal = ModificationJournal::new();
        let original = json!({"attributes": {"name": "Ada"}});
        let expected = record_fingerprint(Some(&original));

        let changed = json!({"attributes": {"name": "Grace"}});
        assert!(!journal.is_fresh(&key(1), &expected, Some(&changed)));
    }

    #[test]
    fn test_stale_when_record_disappears() {
        let mut journal = ModificationJournal::new();
        let original = json!({"attributes": {}});
        let expected = record_fingerprint(Some(&original));
        assert!(!journal.is_fresh(&key(1), &expected, None));
    }

    #[test]
    fn test_memo_reused_within_generation() {
        let mut journal = ModificationJournal::new();
        let record = json!({"attributes": {"name": "Ada"}});
        let expected = record_fingerprint(Some(&record));

        assert!(journal.is_fresh(&key(1), &expected, Some(&record)));
        // The memoized fingerprint answers even against a changed record
        // until the generation moves on.
        let changed = json!({"attributes": {"name": "Grace"}});
        assert!(journal.is_fresh(&key(1), &expected, Some(&changed)));

        journal.invalidate();
        assert!(!journal.is_checked(&key(1)));
        assert!(!journal.is_fresh(&key(1), &expected, Some(&changed)));
    }

    #[test]
    fn test_flush_drops_bookkeeping() {
        let mut journal = ModificationJournal::new();
        journal.observe(key(1), record_fingerprint(None));
        assert_eq!(journal.len(), 1);

        journal.flush();
        assert!(journal.is_empty());
        assert!(!journal.is_checked(&key(1)));
    }

    #[test]
    fn test_observe_marks_checked() {
        let mut journal = ModificationJournal::new();
        journal.observe(key(2), record_fingerprint(None));
        assert!(journal.is_checked(&key(2)));
        assert!(!journal.is_checked(&key(3)));
    }
}
