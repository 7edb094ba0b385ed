//! Error types for REGRAPH operations
//!
//! Cycle and depth-limit conditions are NOT errors: they are `Resolution`
//! variants recovered inside the orchestrator. Everything here is fatal and
//! surfaces to the caller unchanged.

use thiserror::Error;

/// Schema resolution errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("No schema supplied and none could be inferred from status metadata")]
    MissingSchema,

    #[error("No schema map available: {reason}")]
    NoSchemaMap { reason: String },

    #[error("Invalid collection path for schema {schema}: {path}")]
    BadPath { schema: String, path: String },
}

/// Graph resolution errors raised on malformed normalized source data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Malformed normalized record {key}: {reason}")]
    MalformedRecord { key: String, reason: String },

    #[error("Malformed relationship {field} on {key}: {reason}")]
    MalformedRelationship {
        key: String,
        field: String,
        reason: String,
    },

    #[error("Single reference carries no id")]
    EmptyReference,
}

/// Master error type for all REGRAPH operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegraphError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),
}

/// Result type alias for REGRAPH operations.
pub type RegraphResult<T> = Result<T, RegraphError>;

// =============================================================================
// TESTS
// =============================================================================
