//! REGRAPH Cache - Validity-Checked Denormalization Cache
//!
//! Stores the last denormalized value per canonical descriptor key together
//! with enough information to validate it against the current normalized
//! source: the depth bound it was computed under and a fingerprint for every
//! record consulted while producing it.
//!
//! # Design Philosophy
//!
//! Traditional caches hide their staleness, leading to subtle bugs. Here a
//! value is only handed back through the `get_valid_*` family, which judges
//! depth and freshness on every read; the raw `get_item` accessor exists for
//! inspection and skips only the freshness half. The freshness bookkeeping
//! (the [`ModificationJournal`]) is separate state: it can be invalidated or
//! flushed on its own when the source storage is known to have changed while
//! the cached shapes may still be reusable after revalidation.

pub mod entry;
pub mod journal;
pub mod key;

pub use entry::CacheSlot;
pub use journal::ModificationJournal;
pub use key::{DescriptorKey, KeyKind};

use regraph_core::{
    record_fingerprint, Collection, ContentHash, DenormalizedCollection, DepthBound, Descriptor,
    One, SchemaMap,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of validated cache hits.
    pub hits: u64,
    /// Number of misses (absent, depth-unsatisfied, or stale).
    pub misses: u64,
    /// Number of entries currently cached across all kinds.
    pub entry_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Fingerprint of a serializable input reference (one or collection).
fn input_fingerprint<T: Serialize>(input: &T) -> ContentHash {
    record_fingerprint(serde_json::to_value(input).ok().as_ref())
}

/// Validity-checked cache for denormalized items, one-references, and
/// collections, owned by one denormalizer instance.
#[derive(Debug, Default)]
pub struct ValidityCache {
    items: HashMap<DescriptorKey, CacheSlot<Value>>,
    ones: HashMap<DescriptorKey, CacheSlot<Value>>,
    collections: HashMap<DescriptorKey, CacheSlot<DenormalizedCollection>>,
    journal: ModificationJournal,
    default_depth: DepthBound,
    hits: u64,
    misses: u64,
}

impl ValidityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the depth bound assumed when a request does not name one.
    pub fn set_default_max_depth(&mut self, depth: DepthBound) {
        self.default_depth = depth;
    }

    pub fn default_max_depth(&self) -> DepthBound {
        self.default_depth
    }

    /// Begin a new top-level round. When the source snapshot is not known to
    /// be the same one the journal's observations were made against, every
    /// freshness check must recompute.
    pub fn begin_round(&mut self, source_unchanged: bool) {
        if !source_unchanged {
            self.journal.invalidate();
        }
    }

    /// Raw depth-checked lookup, skipping the freshness check.
    pub fn get_item(&self, descriptor: &Descriptor, max_depth: Option<DepthBound>) -> Option<&Value> {
        let requested = max_depth.unwrap_or(self.default_depth);
        self.items
            .get(&DescriptorKey::for_item(descriptor))
            .filter(|slot| slot.satisfies_depth(requested))
            .map(CacheSlot::value)
    }

    /// Whether a freshness check for this descriptor at this depth has
    /// already been performed and is current.
    pub fn is_checked(&self, descriptor: &Descriptor, max_depth: Option<DepthBound>) -> bool {
        let requested = max_depth.unwrap_or(self.default_depth);
        let key = DescriptorKey::for_item(descriptor);
        self.items
            .get(&key)
            .is_some_and(|slot| slot.satisfies_depth(requested))
            && self.journal.is_checked(&key)
    }

    /// Return the cached item iff it is still valid against current storage.
    pub fn get_valid_item(
        &mut self,
        descriptor: &Descriptor,
        max_depth: Option<DepthBound>,
        schema_map: &SchemaMap,
    ) -> Option<Value> {
        let requested = max_depth.unwrap_or(self.default_depth);
        let key = DescriptorKey::for_item(descriptor);
        let Self {
            items, journal, ..
        } = self;
        let result = items
            .get(&key)
            .filter(|slot| {
                slot.satisfies_depth(requested) && deps_fresh(journal, slot.deps(), schema_map)
            })
            .map(|slot| slot.value().clone());
        self.count(result.is_some());
        result
    }

    /// Return the cached combined one-reference value iff it is still valid.
    pub fn get_valid_one(
        &mut self,
        one: &One,
        max_depth: Option<DepthBound>,
        schema_map: &SchemaMap,
    ) -> Option<Value> {
        let requested = max_depth.unwrap_or(self.default_depth);
        let status = one.status.as_ref()?;
        let key = DescriptorKey::for_one(status.id);
        let current_input = input_fingerprint(one);
        let Self { ones, journal, .. } = self;
        let result = ones
            .get(&key)
            .filter(|slot| {
                slot.satisfies_depth(requested)
                    && slot.input_fingerprint() == Some(&current_input)
                    && deps_fresh(journal, slot.deps(), schema_map)
            })
            .map(|slot| slot.value().clone());
        self.count(result.is_some());
        result
    }

    /// Return the cached denormalized collection iff it is still valid.
    pub fn get_valid_collection(
        &mut self,
        collection: &Collection,
        max_depth: Option<DepthBound>,
        schema_map: &SchemaMap,
    ) -> Option<DenormalizedCollection> {
        let requested = max_depth.unwrap_or(self.default_depth);
        let status = collection.status.as_ref()?;
        let key = DescriptorKey::for_collection(status.id);
        let current_input = input_fingerprint(collection);
        let Self {
            collections,
            journal,
            ..
        } = self;
        let result = collections
            .get(&key)
            .filter(|slot| {
                slot.satisfies_depth(requested)
                    && slot.input_fingerprint() == Some(&current_input)
                    && deps_fresh(journal, slot.deps(), schema_map)
            })
            .map(|slot| slot.value().clone());
        self.count(result.is_some());
        result
    }

    /// Store a denormalized item at the given depth and hand the value back.
    pub fn add_item(
        &mut self,
        descriptor: &Descriptor,
        value: Value,
        max_depth: Option<DepthBound>,
        deps: Vec<(Descriptor, ContentHash)>,
    ) -> Value {
        let requested = max_depth.unwrap_or(self.default_depth);
        self.record_observations(&deps);
        self.items.insert(
            DescriptorKey::for_item(descriptor),
            CacheSlot::new(value.clone(), requested, deps),
        );
        value
    }

    /// Store a combined one-reference value keyed by the reference's status.
    ///
    /// A reference without a status has no key to validate against later and
    /// is handed back unstored.
    pub fn add_one(
        &mut self,
        one: &One,
        value: Value,
        max_depth: Option<DepthBound>,
        deps: Vec<(Descriptor, ContentHash)>,
    ) -> Value {
        let Some(status) = one.status.as_ref() else {
            return value;
        };
        let requested = max_depth.unwrap_or(self.default_depth);
        self.record_observations(&deps);
        self.ones.insert(
            DescriptorKey::for_one(status.id),
            CacheSlot::new(value.clone(), requested, deps)
                .with_input_fingerprint(input_fingerprint(one)),
        );
        value
    }

    /// Store a denormalized collection keyed by the collection's status.
    pub fn add_collection(
        &mut self,
        collection: &Collection,
        value: DenormalizedCollection,
        max_depth: Option<DepthBound>,
        deps: Vec<(Descriptor, ContentHash)>,
    ) -> DenormalizedCollection {
        let Some(status) = collection.status.as_ref() else {
            return value;
        };
        let requested = max_depth.unwrap_or(self.default_depth);
        self.record_observations(&deps);
        self.collections.insert(
            DescriptorKey::for_collection(status.id),
            CacheSlot::new(value.clone(), requested, deps)
                .with_input_fingerprint(input_fingerprint(collection)),
        );
        value
    }

    /// Drop every cached value and all freshness bookkeeping.
    pub fn flush(&mut self) {
        debug!(
            entries = self.items.len() + self.ones.len() + self.collections.len(),
            "flushing denormalization cache"
        );
        self.items.clear();
        self.ones.clear();
        self.collections.clear();
        self.journal.flush();
    }

    /// Drop only the freshness bookkeeping; cached values stay and must be
    /// revalidated before reuse.
    pub fn flush_modification_cache(&mut self) {
        debug!("flushing modification journal");
        self.journal.flush();
    }

    /// Invalidate the freshness bookkeeping in place; every subsequent check
    /// recomputes against current storage.
    pub fn invalidate_modification_cache(&mut self) {
        debug!("invalidating modification journal");
        self.journal.invalidate();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entry_count: (self.items.len() + self.ones.len() + self.collections.len()) as u64,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len() + self.ones.len() + self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.ones.is_empty() && self.collections.is_empty()
    }

    fn count(&mut self, hit: bool) {
        if hit {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
    }

    /// Dependencies were fingerprinted against the snapshot of the storing
    /// round; seed the journal so `is_checked` reflects them.
    fn record_observations(&mut self, deps: &[(Descriptor, ContentHash)]) {
        for (descriptor, fingerprint) in deps {
            self.journal
                .observe(DescriptorKey::for_item(descriptor), *fingerprint);
        }
    }
}

fn deps_fresh(
    journal: &mut ModificationJournal,
    deps: &[(Descriptor, ContentHash)],
    schema_map: &SchemaMap,
) -> bool {
    deps.iter().all(|(descriptor, expected)| {
        journal.is_fresh(
            &DescriptorKey::for_item(descriptor),
            expected,
            schema_map.record(descriptor),
        )
    })
}

// =============================================================================
// TESTS
// =============================================================================
