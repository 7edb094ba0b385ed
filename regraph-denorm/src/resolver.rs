//! Graph resolution - the resolver seam and its default relationship walker.
//!
//! Cycle and depth-limit conditions are expressed as [`Resolution`] variants
//! rather than errors: the walker reports them, the orchestrator recovers.
//! Nested relationship items re-enter the orchestrator through the
//! [`NestedResolve`] seam, so the whole tree shares one resolution context.

use crate::context::ResolutionContext;
use regraph_cache::DescriptorKey;
use regraph_core::{
    clone_status, record_fingerprint, DepthBound, DepthBudget, Descriptor, RegraphResult,
    ResolveError, SchemaMap,
};
use serde_json::Value;
use tracing::trace;

/// Outcome of one resolution attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The descriptor resolved to a (possibly partially) nested object.
    Resolved(Value),
    /// Resolving the descriptor would revisit an ancestor of the current
    /// resolution path.
    Cyclic(Descriptor),
    /// The frame was entered after the depth bound was already consumed.
    TooDeep(Descriptor),
}

/// Re-entry point the orchestrator exposes to resolvers for nested
/// relationship items. Nested calls share the outer call's context.
pub trait NestedResolve {
    /// Resolve a nested relationship item under the given remaining budget.
    fn resolve_nested(
        &self,
        descriptor: &Descriptor,
        schema_map: &SchemaMap,
        budget: DepthBudget,
        ctx: &mut ResolutionContext,
    ) -> RegraphResult<Value>;
}

/// Recursive graph-resolution collaborator.
///
/// Implementations own HOW a normalized record becomes a nested object: which
/// relationship fields to follow and how attribute data is merged. The
/// orchestrator owns caching, recovery, and status propagation.
pub trait GraphResolver {
    /// Resolve one descriptor against the schema map, re-entering through
    /// `nested` for relationship items.
    fn resolve(
        &self,
        descriptor: &Descriptor,
        schema_map: &SchemaMap,
        budget: DepthBudget,
        ctx: &mut ResolutionContext,
        nested: &dyn NestedResolve,
    ) -> RegraphResult<Resolution>;

    /// Merge a record's own data with its resolved relationship fields.
    ///
    /// The default produces `id` + `type` + flattened attributes + one field
    /// per relationship, with the record's status annotation cloned onto the
    /// output.
    fn merge_item_data(
        &self,
        descriptor: &Descriptor,
        record: &Value,
        relationships: serde_json::Map<String, Value>,
    ) -> RegraphResult<Value> {
        let mut out = serde_json::Map::new();
        if let Some(attributes) = record.get("attributes") {
            let attributes =
                attributes
                    .as_object()
                    .ok_or_else(|| ResolveError::MalformedRecord {
                        key: descriptor.to_string(),
                        reason: "attributes is not an object".to_string(),
                    })?;
            for (field, value) in attributes {
                out.insert(field.clone(), value.clone());
            }
        }
        for (field, value) in relationships {
            out.insert(field, value);
        }
        // id and type are authoritative over any colliding attribute.
        out.insert("id".to_string(), descriptor.id.to_value());
        out.insert("type".to_string(), Value::from(descriptor.schema.clone()));

        let mut merged = Value::Object(out);
        clone_status(record, &mut merged);
        Ok(merged)
    }

    /// Informs the resolver of the instance-wide default depth bound.
    fn set_depth_limit(&mut self, _depth: DepthBound) {}
}

/// Default resolver: walks JSON-API `relationships.*.data` descriptors.
#[derive(Debug, Default)]
pub struct RelationshipWalker {
    depth_limit: DepthBound,
}

impl RelationshipWalker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The instance-wide default depth bound this walker was told about.
    pub fn depth_limit(&self) -> DepthBound {
        self.depth_limit
    }

    fn resolve_relationships(
        &self,
        descriptor: &Descriptor,
        record: &Value,
        schema_map: &SchemaMap,
        budget: DepthBudget,
        ctx: &mut ResolutionContext,
        nested: &dyn NestedResolve,
    ) -> RegraphResult<serde_json::Map<String, Value>> {
        let mut resolved = serde_json::Map::new();
        let Some(raw) = record.get("relationships") else {
            return Ok(resolved);
        };
        let relationships = raw.as_object().ok_or_else(|| ResolveError::MalformedRecord {
            key: descriptor.to_string(),
            reason: "relationships is not an object".to_string(),
        })?;

        for (field, payload) in relationships {
            // Links-only relationships carry no data to resolve.
            let Some(data) = payload.get("data") else {
                continue;
            };
            let value = match data {
                Value::Null => Value::Null,
                Value::Object(_) => {
                    self.resolve_related(descriptor, field, data, schema_map, budget, ctx, nested)?
                }
                Value::Array(entries) => {
                    let mut items = Vec::with_capacity(entries.len());
                    for entry in entries {
                        items.push(self.resolve_related(
                            descriptor, field, entry, schema_map, budget, ctx, nested,
                        )?);
                    }
                    Value::Array(items)
                }
                _ => {
                    return Err(ResolveError::MalformedRelationship {
                        key: descriptor.to_string(),
                        field: field.clone(),
                        reason: "data is neither a descriptor, a list, nor null".to_string(),
                    }
                    .into())
                }
            };
            resolved.insert(field.clone(), value);
        }
        Ok(resolved)
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_related(
        &self,
        parent: &Descriptor,
        field: &str,
        data: &Value,
        schema_map: &SchemaMap,
        budget: DepthBudget,
        ctx: &mut ResolutionContext,
        nested: &dyn NestedResolve,
    ) -> RegraphResult<Value> {
        let related =
            Descriptor::from_value(data).ok_or_else(|| ResolveError::MalformedRelationship {
                key: parent.to_string(),
                field: field.to_string(),
                reason: "data is not an {id, type} descriptor".to_string(),
            })?;
        nested.resolve_nested(&related, schema_map, budget.child(), ctx)
    }
}

impl GraphResolver for RelationshipWalker {
    fn resolve(
        &self,
        descriptor: &Descriptor,
        schema_map: &SchemaMap,
        budget: DepthBudget,
        ctx: &mut ResolutionContext,
        nested: &dyn NestedResolve,
    ) -> RegraphResult<Resolution> {
        let key = DescriptorKey::for_item(descriptor);
        if ctx.in_path(&key) {
            trace!(descriptor = %descriptor, "revisited ancestor descriptor");
            return Ok(Resolution::Cyclic(descriptor.clone()));
        }
        if budget.is_spent() {
            trace!(descriptor = %descriptor, "depth bound consumed");
            return Ok(Resolution::TooDeep(descriptor.clone()));
        }

        let record = schema_map.record(descriptor);
        ctx.observe(descriptor, record_fingerprint(record));
        let Some(record) = record else {
            // Unknown record: hand back the bare descriptor.
            return Ok(Resolution::Resolved(descriptor.to_value()));
        };

        ctx.enter(key);
        let walked =
            self.resolve_relationships(descriptor, record, schema_map, budget, ctx, nested);
        ctx.leave();

        let merged = self.merge_item_data(descriptor, record, walked?)?;
        Ok(Resolution::Resolved(merged))
    }

    fn set_depth_limit(&mut self, depth: DepthBound) {
        self.depth_limit = depth;
    }
}

// =============================================================================
// TESTS
// =============================================================================
