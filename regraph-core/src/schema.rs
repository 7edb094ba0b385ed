//! Schema maps - flat `schema name -> raw record collection` mappings read
//! from a state snapshot, plus the minimal dotted-path grammar used to locate
//! collections inside it.

use crate::descriptor::Descriptor;
use crate::SchemaName;
use serde_json::Value;
use std::collections::HashMap;

/// Mapping from schema name to the dotted path of its raw collection inside
/// a state snapshot, e.g. `"users" -> "storage.users"`.
pub type SchemaPathMap = HashMap<SchemaName, String>;

/// Flat mapping from schema name to its raw normalized record collection.
///
/// A collection is a JSON object keyed by canonical record id; the map holds
/// whatever the snapshot contained, so a collection may be empty or missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaMap {
    collections: HashMap<SchemaName, Value>,
}

impl SchemaMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the raw collection for a schema.
    pub fn insert(&mut self, schema: impl Into<SchemaName>, collection: Value) {
        self.collections.insert(schema.into(), collection);
    }

    /// The raw collection for a schema, if present.
    pub fn collection(&self, schema: &str) -> Option<&Value> {
        self.collections.get(schema)
    }

    /// Look up the normalized record a descriptor points at.
    pub fn record(&self, descriptor: &Descriptor) -> Option<&Value> {
        self.collections
            .get(&descriptor.schema)?
            .as_object()?
            .get(&descriptor.id.canonical())
    }

    pub fn contains_schema(&self, schema: &str) -> bool {
        self.collections.contains_key(schema)
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

impl FromIterator<(SchemaName, Value)> for SchemaMap {
    fn from_iter<I: IntoIterator<Item = (SchemaName, Value)>>(iter: I) -> Self {
        Self {
            collections: iter.into_iter().collect(),
        }
    }
}

// ============================================================================
// DOTTED-PATH GRAMMAR
// ============================================================================

/// Validate and canonicalize a dotted path.
///
/// Accepts only simple paths like `storage.users` or `api.pages[0].items`:
/// dot-separated keys of alphanumerics/underscore/hyphen, with at most one
/// trailing `[index]` per segment. A leading dot is stripped. Wildcards and
/// filters are rejected.
pub fn normalize_path(path: &str) -> Option<String> {
    if path.contains('?') || path.contains('*') {
        return None;
    }
    let s = path.strip_prefix('.').unwrap_or(path);
    if s.is_empty() {
        return None;
    }
    for seg in s.split('.') {
        if seg.is_empty() {
            return None;
        }
        let (key, index) = match seg.find('[') {
            Some(open) => {
                if !seg.ends_with(']') || open + 1 >= seg.len() - 1 {
                    return None;
                }
                (&seg[..open], Some(&seg[open + 1..seg.len() - 1]))
            }
            None => (seg, None),
        };
        if key.is_empty()
            || !key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return None;
        }
        if let Some(index) = index {
            if index.is_empty() || !index.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
        }
    }
    Some(s.to_string())
}

/// Extract the value at a dotted path, e.g. `storage.users` or
/// `pages[0].items`. Returns `None` when any segment is absent or the shape
/// does not match.
pub fn lookup_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for seg in path.split('.') {
        if seg.is_empty() {
            return None;
        }
        let (key, index) = match seg.find('[') {
            Some(open) => {
                let close = seg.get(open + 1..)?.find(']')? + open + 1;
                let index: usize = seg[open + 1..close].parse().ok()?;
                (&seg[..open], Some(index))
            }
            None => (seg, None),
        };
        current = current.as_object()?.get(key)?;
        if let Some(index) = index {
            current = current.as_array()?.get(index)?;
        }
    }
    Some(current)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_path_accepts_simple_paths() {
        assert_eq!(normalize_path(".storage.users"), Some("storage.users".to_string()));
        assert_eq!(
            normalize_path("api.pages[0].items"),
            Some("api.pages[0].items".to_string())
        );
        assert!(normalize_path("").is_none());
        assert!(normalize_path("storage.*").is_none());
        assert!(normalize_path("a..b").is_none());
        assert!(normalize_path("a[0][1]").is_none());
        assert!(normalize_path("a[]").is_none());
    }

    #[test]
    fn test_lookup_path_walks_objects_and_arrays() {
        let state = json!({
            "storage": {
                "users": {"1": {"id": "1", "type": "user"}},
                "pages": [{"items": {"a": 1}}]
            }
        });
        assert_eq!(
            lookup_path(&state, "storage.users"),
            Some(&json!({"1": {"id": "1", "type": "user"}}))
        );
        assert_eq!(lookup_path(&state, "storage.pages[0].items"), Some(&json!({"a": 1})));
        assert_eq!(lookup_path(&state, "storage.missing"), None);
        assert_eq!(lookup_path(&state, "storage.pages[3]"), None);
    }

    #[test]
    fn test_schema_map_record_lookup() {
        let mut map = SchemaMap::new();
        map.insert(
            "user",
            json!({"1": {"id": "1", "type": "user"}, "7": {"id": 7, "type": "user"}}),
        );

        assert!(map.contains_schema("user"));
        assert_eq!(map.len(), 1);

        let by_str = map.record(&Descriptor::new("1", "user"));
        assert_eq!(by_str.and_then(|r| r.get("id")), Some(&json!("1")));

        // Integer ids canonicalize to their decimal form.
        let by_int = map.record(&Descriptor::new(7, "user"));
        assert_eq!(by_int.and_then(|r| r.get("id")), Some(&json!(7)));

        assert!(map.record(&Descriptor::new("2", "user")).is_none());
        assert!(map.record(&Descriptor::new("1", "post")).is_none());
    }

    #[test]
    fn test_schema_map_tolerates_non_object_collection() {
        let mut map = SchemaMap::new();
        map.insert("user", json!(null));
        assert!(map.record(&Descriptor::new("1", "user")).is_none());
    }
}
