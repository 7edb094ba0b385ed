//! Canonical cache keys.
//!
//! The key insight is that `DescriptorKey`'s private constructor data makes
//! it impossible to collide an item key with a one-reference or collection
//! key: every key is built through one of the three scoped constructors.

use regraph_core::Descriptor;
use std::fmt;
use uuid::Uuid;

/// Separator character between key segments. Unit separator cannot appear in
/// schema names or uuids and keeps ids with dots unambiguous.
const SEPARATOR: char = '\u{1f}';

/// Tag byte for each key kind, leading the encoded form.
const ITEM_TAG: &str = "i";
const ONE_TAG: &str = "o";
const COLLECTION_TAG: &str = "c";

/// What a cache key addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// A denormalized item, keyed by its descriptor's `(type, id)`.
    Item,
    /// A combined one-reference value, keyed by the reference's status id.
    One,
    /// A denormalized collection, keyed by the collection's status id.
    Collection,
}

/// Canonical cache key for a denormalized value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DescriptorKey {
    inner: KeyInner,
}

/// Private inner data - prevents external construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyInner {
    Item { schema: String, id: String },
    One(Uuid),
    Collection(Uuid),
}

impl DescriptorKey {
    /// Key for an item, derived from its descriptor's canonical `(type, id)`.
    pub fn for_item(descriptor: &Descriptor) -> Self {
        Self {
            inner: KeyInner::Item {
                schema: descriptor.schema.clone(),
                id: descriptor.id.canonical(),
            },
        }
    }

    /// Key for a one-reference entry, scoped by the reference's status id.
    pub fn for_one(status_id: Uuid) -> Self {
        Self {
            inner: KeyInner::One(status_id),
        }
    }

    /// Key for a collection entry, scoped by the collection's status id.
    pub fn for_collection(status_id: Uuid) -> Self {
        Self {
            inner: KeyInner::Collection(status_id),
        }
    }

    pub fn kind(&self) -> KeyKind {
        match self.inner {
            KeyInner::Item { .. } => KeyKind::Item,
            KeyInner::One(_) => KeyKind::One,
            KeyInner::Collection(_) => KeyKind::Collection,
        }
    }

    /// Encode this key to its canonical string form.
    ///
    /// Format: `tag SEP payload`, where the item payload is
    /// `schema SEP id`. The encoding is injective across all key kinds.
    pub fn encode(&self) -> String {
        match &self.inner {
            KeyInner::Item { schema, id } => {
                format!("{ITEM_TAG}{SEPARATOR}{schema}{SEPARATOR}{id}")
            }
            KeyInner::One(uuid) => format!("{ONE_TAG}{SEPARATOR}{uuid}"),
            KeyInner::Collection(uuid) => format!("{COLLECTION_TAG}{SEPARATOR}{uuid}"),
        }
    }

    /// Decode a key from its canonical string form.
    ///
    /// Returns `None` if the tag is unknown, a segment is missing or empty,
    /// or a status-scoped payload is not a uuid.
    pub fn decode(encoded: &str) -> Option<Self> {
        let (tag, payload) = encoded.split_once(SEPARATOR)?;
        match tag {
            ITEM_TAG => {
                let (schema, id) = payload.split_once(SEPARATOR)?;
                if schema.is_empty() || id.is_empty() || id.contains(SEPARATOR) {
                    return None;
                }
                Some(Self {
                    inner: KeyInner::Item {
                        schema: schema.to_string(),
                        id: id.to_string(),
                    },
                })
            }
            ONE_TAG => Uuid::parse_str(payload).ok().map(Self::for_one),
            COLLECTION_TAG => Uuid::parse_str(payload).ok().map(Self::for_collection),
            _ => None,
        }
    }
}

impl fmt::Display for DescriptorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            KeyInner::Item { schema, id } => write!(f, "{}.{}", schema, id),
            KeyInner::One(uuid) => write!(f, "one:{}", uuid),
            KeyInner::Collection(uuid) => write!(f, "coll:{}", uuid),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
