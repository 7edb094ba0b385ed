//! Resolution context - the per-top-level-call mutable state shared across
//! one recursive resolution tree.
//!
//! Every public denormalization operation creates exactly one context and
//! threads it by `&mut` through every frame, including re-entries made by
//! the resolver for nested relationship items. State therefore never leaks
//! across unrelated top-level calls, and "root level" is structural rather
//! than detected from shared instance state.

use regraph_cache::DescriptorKey;
use regraph_core::{ContentHash, Descriptor};
use std::collections::HashSet;

/// Per-top-level-call state: the resolution path (for cycle detection), the
/// loop-suppression set, the incomplete-caching flag, and the dependency
/// fingerprints observed while resolving.
#[derive(Debug, Default)]
pub struct ResolutionContext {
    path: Vec<DescriptorKey>,
    suppressed: HashSet<DescriptorKey>,
    incomplete: bool,
    visited: Vec<(Descriptor, ContentHash)>,
    visited_keys: HashSet<DescriptorKey>,
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the key is an ancestor frame of the current resolution path,
    /// i.e. resolving it again would close a cycle.
    pub fn in_path(&self, key: &DescriptorKey) -> bool {
        self.path.contains(key)
    }

    /// Push a frame onto the resolution path.
    pub fn enter(&mut self, key: DescriptorKey) {
        self.path.push(key);
    }

    /// Pop the innermost frame off the resolution path.
    pub fn leave(&mut self) {
        self.path.pop();
    }

    /// Current nesting depth of the resolution path.
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// Record the fingerprint of a normalized record consulted while
    /// resolving. The first observation of a descriptor wins; within one
    /// top-level call all observations are made against the same snapshot.
    pub fn observe(&mut self, descriptor: &Descriptor, fingerprint: ContentHash) {
        let key = DescriptorKey::for_item(descriptor);
        if self.visited_keys.insert(key) {
            self.visited.push((descriptor.clone(), fingerprint));
        }
    }

    /// Mark a descriptor as unresolvable this round because resolving it
    /// required traversing a cycle.
    pub fn suppress(&mut self, key: DescriptorKey) {
        self.suppressed.insert(key);
    }

    /// Clear a descriptor from the suppression set once it resolved cleanly.
    pub fn clear_suppressed(&mut self, key: &DescriptorKey) {
        self.suppressed.remove(key);
    }

    pub fn has_suppressed(&self) -> bool {
        !self.suppressed.is_empty()
    }

    /// Mark the whole call tree as ineligible for caching: some nested
    /// resolution hit the depth limit, so every value computed this round is
    /// potentially partial.
    pub fn mark_incomplete(&mut self) {
        self.incomplete = true;
    }

    pub fn is_incomplete(&self) -> bool {
        self.incomplete
    }

    /// Snapshot of every `(descriptor, fingerprint)` observed so far. Stored
    /// with cache entries; a conservative superset of the entry's true
    /// dependency subtree.
    pub fn dependencies(&self) -> Vec<(Descriptor, ContentHash)> {
        self.visited.clone()
    }
}

// =============================================================================
// TESTS
// =============================================================================
