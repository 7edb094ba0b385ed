//! Reference shapes - the normalized inputs handed to the denormalizer and
//! the annotated collection output it produces.

use crate::descriptor::RecordId;
use crate::status::Status;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::ops::Deref;

// ============================================================================
// ONE-REFERENCE
// ============================================================================

/// A normalized to-one reference slot.
///
/// The status describes the reference slot itself (e.g. loading or error
/// state), which is distinct from the status of the item it points at.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct One {
    /// Id of the referenced record, if the slot is populated.
    pub value: Option<RecordId>,
    /// Annotation of the reference slot.
    pub status: Option<Status>,
}

impl One {
    /// Create a populated reference slot.
    pub fn new(value: impl Into<RecordId>) -> Self {
        Self {
            value: Some(value.into()),
            status: None,
        }
    }

    /// Attach a status annotation, builder-style.
    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }
}

/// Input accepted by `denormalize_one`: either a primitive id (explicit
/// schema required) or a structured reference carrying its own status.
#[derive(Debug, Clone, PartialEq)]
pub enum OneRef {
    /// Primitive id; the schema must be supplied explicitly.
    Id(RecordId),
    /// Structured single-reference; the schema comes from its status.
    Annotated(One),
}

impl From<RecordId> for OneRef {
    fn from(id: RecordId) -> Self {
        OneRef::Id(id)
    }
}

impl From<One> for OneRef {
    fn from(one: One) -> Self {
        OneRef::Annotated(one)
    }
}

// ============================================================================
// COLLECTION
// ============================================================================

/// A normalized collection of record ids, optionally annotated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    /// Member ids in order.
    pub ids: Vec<RecordId>,
    /// Annotation of the collection as a whole.
    pub status: Option<Status>,
}

impl Collection {
    /// Create a collection from its member ids.
    pub fn new(ids: Vec<RecordId>) -> Self {
        Self { ids, status: None }
    }

    /// Attach a status annotation, builder-style.
    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }
}

/// Input accepted by `denormalize_collection`.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionRef {
    /// Bare id list; the schema must be supplied explicitly.
    Ids(Vec<RecordId>),
    /// Annotated collection; the schema comes from its status.
    Annotated(Collection),
}

impl CollectionRef {
    /// Member ids in input order.
    pub fn ids(&self) -> &[RecordId] {
        match self {
            CollectionRef::Ids(ids) => ids,
            CollectionRef::Annotated(collection) => &collection.ids,
        }
    }

    /// The collection-level status annotation, if any.
    pub fn status(&self) -> Option<&Status> {
        match self {
            CollectionRef::Ids(_) => None,
            CollectionRef::Annotated(collection) => collection.status.as_ref(),
        }
    }
}

impl From<Vec<RecordId>> for CollectionRef {
    fn from(ids: Vec<RecordId>) -> Self {
        CollectionRef::Ids(ids)
    }
}

impl From<Collection> for CollectionRef {
    fn from(collection: Collection) -> Self {
        CollectionRef::Annotated(collection)
    }
}

// ============================================================================
// DENORMALIZED COLLECTION
// ============================================================================

/// Ordered denormalized output of a collection call, owning an independent
/// copy of the input collection's status annotation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DenormalizedCollection {
    /// Denormalized items, in input order.
    pub items: Vec<Value>,
    /// Clone of the input collection's status.
    pub status: Option<Status>,
}

impl DenormalizedCollection {
    /// Wrap denormalized items without an annotation.
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            items,
            status: None,
        }
    }

    /// Attach a status annotation, builder-style.
    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Deref for DenormalizedCollection {
    type Target = [Value];

    fn deref(&self) -> &Self::Target {
        &self.items
    }
}

// =============================================================================
// TESTS
// =============================================================================
