//! Descriptor factory - builds `{id, type}` descriptors from raw
//! collections, single references, and primitive ids.
//!
//! The schema is resolved from the input's own status metadata when it
//! carries one; an explicit schema argument is only the fallback. Pure
//! construction, no side effects.

use regraph_core::{
    CollectionRef, Descriptor, OneRef, RegraphResult, ResolveError, SchemaError, Status,
};

/// Descriptors for a collection's members, in input order, together with an
/// independent copy of the collection-level status annotation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescriptorSeq {
    /// One descriptor per input id, input order preserved.
    pub descriptors: Vec<Descriptor>,
    /// Clone of the input collection's status, if it carried one.
    pub status: Option<Status>,
}

/// Build descriptors for every member of a collection.
///
/// The schema comes from the collection's status when present, else from
/// `schema`; with neither the call fails with [`SchemaError::MissingSchema`].
pub fn collection_descriptors(
    collection: &CollectionRef,
    schema: Option<&str>,
) -> RegraphResult<DescriptorSeq> {
    let status = collection.status();
    let schema_name = status
        .map(|s| s.schema.as_str())
        .or(schema)
        .ok_or(SchemaError::MissingSchema)?;
    Ok(DescriptorSeq {
        descriptors: collection
            .ids()
            .iter()
            .map(|id| Descriptor::new(id.clone(), schema_name))
            .collect(),
        status: status.cloned(),
    })
}

/// Build the descriptor for a single reference.
///
/// A primitive id requires an explicit schema. A structured reference takes
/// its schema from its own status (falling back to the explicit argument),
/// and must carry an inner id.
pub fn one_descriptor(one: &OneRef, schema: Option<&str>) -> RegraphResult<Descriptor> {
    match one {
        OneRef::Id(id) => {
            let schema_name = schema.ok_or(SchemaError::MissingSchema)?;
            Ok(Descriptor::new(id.clone(), schema_name))
        }
        OneRef::Annotated(reference) => {
            let schema_name = reference
                .status
                .as_ref()
                .map(|s| s.schema.as_str())
                .or(schema)
                .ok_or(SchemaError::MissingSchema)?;
            let id = reference
                .value
                .clone()
                .ok_or(ResolveError::EmptyReference)?;
            Ok(Descriptor::new(id, schema_name))
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
