//! Status metadata - opaque annotations attached to items, one-references,
//! and collections, independent of the entity's own data.
//!
//! A status carries at minimum the schema name of what it annotates; the
//! engine only ever clones statuses from input to output, so the denormalized
//! value exclusively owns its copy and mutating it never affects the source.

use crate::{SchemaName, Timestamp};
use bitflags::bitflags;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Reserved object key under which an item value carries its status
/// annotation. Arrays cannot carry extra keys, so collections hold their
/// status as a struct field instead (see `DenormalizedCollection`).
pub const STATUS_KEY: &str = "@@regraph/status";

bitflags! {
    /// Auxiliary state flags carried by a status annotation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StatusFlags: u8 {
        /// The annotated value reflects the source it was derived from.
        const VALID = 0b0000_0001;
        /// A refresh of the annotated value is in flight.
        const BUSY = 0b0000_0010;
        /// The last refresh of the annotated value failed.
        const ERROR = 0b0000_0100;
    }
}

// Manual serde implementation for StatusFlags (bitflags 2.x + serde)
impl Serialize for StatusFlags {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.bits().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StatusFlags {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bits = u8::deserialize(deserializer)?;
        Self::from_bits(bits).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid StatusFlags bits: {:#04x}", bits))
        })
    }
}

/// What shape of value a status annotation describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusKind {
    /// A single denormalized item.
    Item,
    /// A one-reference slot pointing at an item.
    One,
    /// An ordered collection of items.
    Collection,
}

/// Opaque annotation attached to items, one-references, and collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    /// Identity of the annotated value; one-reference and collection cache
    /// entries are keyed by it.
    pub id: Uuid,
    /// Schema name of the annotated value.
    pub schema: SchemaName,
    /// Shape of the annotated value.
    pub kind: StatusKind,
    /// Auxiliary state flags.
    pub flags: StatusFlags,
    /// When the annotated value last changed in the normalized source.
    pub modified_at: Timestamp,
}

impl Status {
    /// Create a fresh status annotation for the given schema and shape.
    pub fn new(schema: impl Into<SchemaName>, kind: StatusKind) -> Self {
        Self {
            id: Uuid::now_v7(),
            schema: schema.into(),
            kind,
            flags: StatusFlags::VALID,
            modified_at: Utc::now(),
        }
    }

    /// Replace the flags, builder-style.
    pub fn with_flags(mut self, flags: StatusFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn is_valid(&self) -> bool {
        self.flags.contains(StatusFlags::VALID)
    }

    pub fn is_busy(&self) -> bool {
        self.flags.contains(StatusFlags::BUSY)
    }

    pub fn is_error(&self) -> bool {
        self.flags.contains(StatusFlags::ERROR)
    }

    /// Record a mutation of the annotated value.
    pub fn touch(&mut self) {
        self.modified_at = Utc::now();
    }
}

// ============================================================================
// VALUE-ATTACHED STATUS HELPERS
// ============================================================================

/// Read the status annotation attached to an item value, if any.
///
/// Returns an owned copy; the value keeps its own annotation.
pub fn get_status(value: &Value) -> Option<Status> {
    let raw = value.as_object()?.get(STATUS_KEY)?;
    serde_json::from_value(raw.clone()).ok()
}

/// Attach an independent copy of `status` to an item value.
///
/// Non-object values cannot carry an annotation and are left untouched.
pub fn set_status(value: &mut Value, status: &Status) {
    if let Value::Object(object) = value {
        if let Ok(encoded) = serde_json::to_value(status) {
            object.insert(STATUS_KEY.to_string(), encoded);
        }
    }
}

/// Copy the status annotation from `source` onto `target`, creating an
/// independent copy. A source without an annotation leaves `target` as-is.
pub fn clone_status(source: &Value, target: &mut Value) {
    if let Some(status) = get_status(source) {
        set_status(target, &status);
    }
}

// =============================================================================
// TESTS
// =============================================================================
