//! Cache entries - denormalized values stamped with the validity metadata
//! needed to judge them against the current normalized source.

use regraph_core::{ContentHash, DepthBound, Descriptor, Timestamp};
use chrono::Utc;

/// A cached denormalized value with its validity metadata.
///
/// An entry is valid for a request iff its depth bound satisfies the
/// requested bound AND every dependency's current fingerprint still matches.
/// One-reference and collection entries additionally record a fingerprint of
/// the input reference itself, so a changed reference (new ids, new status
/// stamp) misses even when every member record is unchanged.
#[derive(Debug, Clone)]
pub struct CacheSlot<T> {
    value: T,
    depth: DepthBound,
    deps: Vec<(Descriptor, ContentHash)>,
    input_fingerprint: Option<ContentHash>,
    cached_at: Timestamp,
}

impl<T> CacheSlot<T> {
    /// Create an item entry from its value, depth bound, and dependencies.
    pub fn new(value: T, depth: DepthBound, deps: Vec<(Descriptor, ContentHash)>) -> Self {
        Self {
            value,
            depth,
            deps,
            input_fingerprint: None,
            cached_at: Utc::now(),
        }
    }

    /// Additionally pin the fingerprint of the input reference, builder-style.
    pub fn with_input_fingerprint(mut self, fingerprint: ContentHash) -> Self {
        self.input_fingerprint = Some(fingerprint);
        self
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn depth(&self) -> DepthBound {
        self.depth
    }

    pub fn deps(&self) -> &[(Descriptor, ContentHash)] {
        &self.deps
    }

    pub fn input_fingerprint(&self) -> Option<&ContentHash> {
        self.input_fingerprint.as_ref()
    }

    pub fn cached_at(&self) -> Timestamp {
        self.cached_at
    }

    /// Whether this entry was computed under a bound at least as permissive
    /// as the requested one.
    pub fn satisfies_depth(&self, requested: DepthBound) -> bool {
        self.depth.satisfies(requested)
    }
}

// =============================================================================
// TESTS
// =============================================================================
