//! Storage access - the find-storage accessor and the schema map resolver
//! with its single-slot identity memo.

use regraph_core::{lookup_path, SchemaMap, SchemaPathMap};
use serde_json::Value;
use std::sync::Arc;
use tracing::trace;

/// Zero-argument accessor returning the current state snapshot, called once
/// per top-level call before the schema map is built.
pub type StoreAccessor = Box<dyn Fn() -> Arc<Value>>;

/// The most recently resolved `(snapshot, paths)` pair and its schema map.
#[derive(Debug)]
struct MemoSlot {
    snapshot: Arc<Value>,
    paths: Arc<SchemaPathMap>,
    schema_map: Arc<SchemaMap>,
}

/// Builds schema maps from state snapshots, memoizing only the most recent
/// `(snapshot, path map)` pair by identity.
///
/// A repeated call with the same pair (by `Arc` identity, not by value)
/// returns the prior map without recomputation; any different pair rebuilds
/// and replaces the slot. This bounds recomputation to once per distinct
/// top-level storage snapshot.
#[derive(Debug, Default)]
pub struct SchemaMapResolver {
    memo: Option<MemoSlot>,
}

impl SchemaMapResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the schema map for a snapshot. Returns the map and whether it
    /// was reused from the memo slot.
    ///
    /// A path that is absent from the snapshot yields an empty collection
    /// for its schema.
    pub fn resolve(
        &mut self,
        snapshot: &Arc<Value>,
        paths: &Arc<SchemaPathMap>,
    ) -> (Arc<SchemaMap>, bool) {
        if let Some(slot) = &self.memo {
            if Arc::ptr_eq(&slot.snapshot, snapshot) && Arc::ptr_eq(&slot.paths, paths) {
                trace!("schema map served from memo");
                return (Arc::clone(&slot.schema_map), true);
            }
        }

        let mut schema_map = SchemaMap::new();
        for (schema, path) in paths.iter() {
            let collection = lookup_path(snapshot, path)
                .cloned()
                .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
            schema_map.insert(schema.clone(), collection);
        }
        let schema_map = Arc::new(schema_map);
        self.memo = Some(MemoSlot {
            snapshot: Arc::clone(snapshot),
            paths: Arc::clone(paths),
            schema_map: Arc::clone(&schema_map),
        });
        (schema_map, false)
    }

    /// Drop the memo slot; the next call rebuilds unconditionally.
    pub fn invalidate(&mut self) {
        self.memo = None;
    }
}

// =============================================================================
// TESTS
// =============================================================================
