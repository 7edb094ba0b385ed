//! REGRAPH Test Utilities
//!
//! Centralized test infrastructure for the REGRAPH workspace:
//! - Builders for normalized records, collections, and state snapshots
//! - Status fixtures for items, one-references, and collections
//! - An instrumented resolver wrapper for call-count assertions

// Re-export core types for convenience
pub use regraph_core::{
    Collection, CollectionRef, DenormalizedCollection, DepthBound, Descriptor, One, OneRef,
    RecordId, RegraphError, RegraphResult, SchemaMap, SchemaPathMap, Status, StatusKind,
};

use regraph_core::DepthBudget;
use regraph_denorm::{GraphResolver, NestedResolve, RelationshipWalker, Resolution, ResolutionContext};
use serde_json::{json, Value};
use std::cell::Cell;
use std::sync::Arc;

// ============================================================================
// NORMALIZED RECORD BUILDERS
// ============================================================================

/// Build a normalized JSON-API record with flattened-out attributes.
pub fn record(id: impl Into<RecordId>, schema: &str, attributes: Value) -> Value {
    json!({
        "id": id.into().to_value(),
        "type": schema,
        "attributes": attributes,
    })
}

/// Add a to-one relationship to a normalized record.
pub fn relate_one(record: &mut Value, field: &str, target: &Descriptor) {
    relate(record, field, target.to_value());
}

/// Add a to-many relationship to a normalized record.
pub fn relate_many(record: &mut Value, field: &str, targets: &[Descriptor]) {
    let data: Vec<Value> = targets.iter().map(Descriptor::to_value).collect();
    relate(record, field, Value::Array(data));
}

/// Add an empty (null-data) relationship to a normalized record.
pub fn relate_none(record: &mut Value, field: &str) {
    relate(record, field, Value::Null);
}

fn relate(record: &mut Value, field: &str, data: Value) {
    let Some(object) = record.as_object_mut() else {
        return;
    };
    let relationships = object
        .entry("relationships".to_string())
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    if let Some(relationships) = relationships.as_object_mut() {
        relationships.insert(field.to_string(), json!({ "data": data }));
    }
}

/// Key records by canonical id into a raw collection object.
pub fn collection_of(records: &[Value]) -> Value {
    let mut out = serde_json::Map::new();
    for record in records {
        let id = record
            .get("id")
            .and_then(RecordId::from_value)
            .map(|id| id.canonical())
            .unwrap_or_default();
        out.insert(id, record.clone());
    }
    Value::Object(out)
}

/// Assemble a schema map directly from `(schema, collection)` pairs.
pub fn schema_map_of(collections: &[(&str, Value)]) -> SchemaMap {
    let mut map = SchemaMap::new();
    for (schema, collection) in collections {
        map.insert(*schema, collection.clone());
    }
    map
}

/// Assemble a state snapshot holding each collection at `storage.{schema}`.
pub fn state_with(collections: &[(&str, Value)]) -> Arc<Value> {
    let mut storage = serde_json::Map::new();
    for (schema, collection) in collections {
        storage.insert(schema.to_string(), collection.clone());
    }
    Arc::new(json!({ "storage": Value::Object(storage) }))
}

/// Path map matching [`state_with`]: every schema lives at `storage.{schema}`.
pub fn storage_paths(schemas: &[&str]) -> SchemaPathMap {
    schemas
        .iter()
        .map(|schema| (schema.to_string(), format!("storage.{schema}")))
        .collect()
}

// ============================================================================
// STATUS FIXTURES
// ============================================================================

pub fn item_status(schema: &str) -> Status {
    Status::new(schema, StatusKind::Item)
}

pub fn one_status(schema: &str) -> Status {
    Status::new(schema, StatusKind::One)
}

pub fn collection_status(schema: &str) -> Status {
    Status::new(schema, StatusKind::Collection)
}

// ============================================================================
// INSTRUMENTED RESOLVER
// ============================================================================

/// Resolver wrapper counting `resolve` invocations, for asserting that
/// cache hits never reach the resolver.
#[derive(Debug, Default)]
pub struct CountingResolver<R = RelationshipWalker> {
    inner: R,
    calls: Cell<u64>,
}

impl CountingResolver<RelationshipWalker> {
    /// Wrap the default relationship walker.
    pub fn walker() -> Self {
        Self::new(RelationshipWalker::new())
    }
}

impl<R> CountingResolver<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            calls: Cell::new(0),
        }
    }

    /// Number of `resolve` invocations so far.
    pub fn calls(&self) -> u64 {
        self.calls.get()
    }
}

impl<R: GraphResolver> GraphResolver for CountingResolver<R> {
    fn resolve(
        &self,
        descriptor: &Descriptor,
        schema_map: &SchemaMap,
        budget: DepthBudget,
        ctx: &mut ResolutionContext,
        nested: &dyn NestedResolve,
    ) -> RegraphResult<Resolution> {
        self.calls.set(self.calls.get() + 1);
        self.inner.resolve(descriptor, schema_map, budget, ctx, nested)
    }

    fn merge_item_data(
        &self,
        descriptor: &Descriptor,
        record: &Value,
        relationships: serde_json::Map<String, Value>,
    ) -> RegraphResult<Value> {
        self.inner.merge_item_data(descriptor, record, relationships)
    }

    fn set_depth_limit(&mut self, depth: DepthBound) {
        self.inner.set_depth_limit(depth);
    }
}

// =============================================================================
// TESTS
// =============================================================================
