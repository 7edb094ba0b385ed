//! REGRAPH Core - Data Types
//!
//! Pure data structures with no engine logic. All other crates depend on this.
//! This crate contains ONLY the value vocabulary of the denormalizer - record
//! ids, descriptors, status annotations, schema maps, depth bounds, content
//! fingerprints, and the error taxonomy.

pub mod depth;
pub mod descriptor;
pub mod error;
pub mod reference;
pub mod schema;
pub mod status;

pub use depth::{DepthBound, DepthBudget};
pub use descriptor::{Descriptor, RecordId};
pub use error::{RegraphError, RegraphResult, ResolveError, SchemaError};
pub use reference::{Collection, CollectionRef, DenormalizedCollection, One, OneRef};
pub use schema::{lookup_path, normalize_path, SchemaMap, SchemaPathMap};
pub use status::{clone_status, get_status, set_status, Status, StatusFlags, StatusKind, STATUS_KEY};

use serde_json::Value;
use sha2::{Digest, Sha256};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Name of a schema, i.e. the `type` of a JSON-API record.
pub type SchemaName = String;

/// Timestamp type using UTC timezone.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// SHA-256 content hash used as a freshness fingerprint.
pub type ContentHash = [u8; 32];

/// Domain separator hashed in place of a record that is absent from storage.
/// Distinct from the hash of any JSON value, so a record appearing later
/// invalidates entries that were resolved while it was missing.
const ABSENT_RECORD_SENTINEL: &[u8] = b"regraph/absent-record/v1";

/// Compute the freshness fingerprint of a normalized record.
///
/// `serde_json` object keys serialize in sorted order, so equal values
/// always produce equal fingerprints.
pub fn record_fingerprint(record: Option<&Value>) -> ContentHash {
    let mut hasher = Sha256::new();
    match record {
        Some(value) => hasher.update(serde_json::to_vec(value).unwrap_or_default()),
        None => hasher.update(ABSENT_RECORD_SENTINEL),
    }
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

// =============================================================================
// TESTS
// =============================================================================
