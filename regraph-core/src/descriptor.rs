//! Item descriptors - minimal `{id, type}` references to normalized records.

use crate::SchemaName;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// ============================================================================
// RECORD ID
// ============================================================================

/// Identifier of a normalized record as found in JSON payloads.
///
/// JSON-API ids are strings, but normalized stores in the wild also key
/// records by integers; both canonicalize to the same string form used in
/// collection lookups and cache keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    /// Integer id, canonicalized via its decimal form.
    Int(i64),
    /// String id, used as-is.
    Str(String),
}

impl RecordId {
    /// Canonical string form used for collection lookups and cache keys.
    pub fn canonical(&self) -> String {
        match self {
            RecordId::Int(n) => n.to_string(),
            RecordId::Str(s) => s.clone(),
        }
    }

    /// Read a record id out of a JSON value (string or integer).
    pub fn from_value(value: &Value) -> Option<RecordId> {
        match value {
            Value::String(s) => Some(RecordId::Str(s.clone())),
            Value::Number(n) => n.as_i64().map(RecordId::Int),
            _ => None,
        }
    }

    /// JSON form of the id, preserving its original representation.
    pub fn to_value(&self) -> Value {
        match self {
            RecordId::Int(n) => Value::from(*n),
            RecordId::Str(s) => Value::from(s.clone()),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{}", n),
            RecordId::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        RecordId::Int(n)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId::Str(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        RecordId::Str(s)
    }
}

// ============================================================================
// DESCRIPTOR
// ============================================================================

/// Minimal `{id, type}` reference to a normalized record.
///
/// Immutable value; the `type` must resolve to a known schema name. The bare
/// JSON form of a descriptor doubles as the sentinel returned at positions
/// where resolution was cut short (cycle, depth bound, missing record).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Descriptor {
    /// Record id.
    pub id: RecordId,
    /// Schema name of the record.
    #[serde(rename = "type")]
    pub schema: SchemaName,
}

impl Descriptor {
    /// Create a descriptor from an id and a schema name.
    pub fn new(id: impl Into<RecordId>, schema: impl Into<SchemaName>) -> Self {
        Self {
            id: id.into(),
            schema: schema.into(),
        }
    }

    /// The bare `{"id": .., "type": ..}` JSON form of this descriptor.
    pub fn to_value(&self) -> Value {
        let mut out = serde_json::Map::new();
        out.insert("id".to_string(), self.id.to_value());
        out.insert("type".to_string(), Value::from(self.schema.clone()));
        Value::Object(out)
    }

    /// Read a descriptor out of a relationship payload object.
    ///
    /// Returns `None` unless the value is an object carrying both an `id`
    /// (string or integer) and a string `type`.
    pub fn from_value(value: &Value) -> Option<Descriptor> {
        let object = value.as_object()?;
        let id = RecordId::from_value(object.get("id")?)?;
        let schema = object.get("type")?.as_str()?.to_string();
        Some(Descriptor { id, schema })
    }

    /// Whether `value` is exactly the bare, unresolved form of this
    /// descriptor (nothing but matching `id` and `type`).
    pub fn matches_bare(&self, value: &Value) -> bool {
        match value.as_object() {
            Some(object) => {
                object.len() == 2
                    && object.get("id").and_then(RecordId::from_value).as_ref() == Some(&self.id)
                    && object.get("type").and_then(Value::as_str) == Some(self.schema.as_str())
            }
            None => false,
        }
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.id)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_id_canonical_forms() {
        assert_eq!(RecordId::from(7).canonical(), "7");
        assert_eq!(RecordId::from("abc").canonical(), "abc");
    }

    #[test]
    fn test_record_id_from_value() {
        assert_eq!(RecordId::from_value(&json!("x")), Some(RecordId::from("x")));
        assert_eq!(RecordId::from_value(&json!(3)), Some(RecordId::from(3)));
        assert_eq!(RecordId::from_value(&json!(null)), None);
        assert_eq!(RecordId::from_value(&json!(1.5)), None);
    }

    #[test]
    fn test_descriptor_to_value_is_bare_form() {
        let descriptor = Descriptor::new(1, "user");
        assert_eq!(descriptor.to_value(), json!({"id": 1, "type": "user"}));
    }

    #[test]
    fn test_descriptor_from_value_roundtrip() {
        let descriptor = Descriptor::new("a1", "post");
        let parsed = Descriptor::from_value(&descriptor.to_value()).expect("parse descriptor");
        assert_eq!(parsed, descriptor);
    }

    #[test]
    fn test_descriptor_from_value_rejects_incomplete() {
        assert!(Descriptor::from_value(&json!({"id": 1})).is_none());
        assert!(Descriptor::from_value(&json!({"type": "user"})).is_none());
        assert!(Descriptor::from_value(&json!("user.1")).is_none());
    }

    #[test]
    fn test_matches_bare() {
        let descriptor = Descriptor::new(1, "user");
        assert!(descriptor.matches_bare(&json!({"id": 1, "type": "user"})));
        assert!(!descriptor.matches_bare(&json!({"id": 1, "type": "user", "name": "Ada"})));
        assert!(!descriptor.matches_bare(&json!({"id": 2, "type": "user"})));
        assert!(!descriptor.matches_bare(&json!(null)));
    }

    #[test]
    fn test_serde_rename_of_schema_field() {
        let descriptor = Descriptor::new(1, "user");
        let encoded = serde_json::to_value(&descriptor).expect("serialize descriptor");
        assert_eq!(encoded, json!({"id": 1, "type": "user"}));
    }
}
