//! REGRAPH Denorm - Denormalization Engine
//!
//! Resolves normalized, relationship-based records (JSON-API-style entities
//! keyed by `{id, type}`) back into fully nested object graphs, avoiding
//! redundant recomputation through the validity-checked cache in
//! `regraph-cache`.
//!
//! The orchestrator ([`Denormalizer`]) wraps a pluggable [`GraphResolver`]
//! with cache consultation, cycle/depth-limit recovery, and status
//! propagation. Callers never see cycle or depth conditions: they receive a
//! complete graph, a graph with bare `{id, type}` descriptors standing in
//! for cyclic or too-deep positions, or a propagated fatal error.

pub mod context;
pub mod factory;
pub mod resolver;
pub mod source;

mod denormalizer;

pub use context::ResolutionContext;
pub use denormalizer::{Denormalizer, DenormalizerConfig};
pub use factory::{collection_descriptors, one_descriptor, DescriptorSeq};
pub use resolver::{GraphResolver, NestedResolve, RelationshipWalker, Resolution};
pub use source::{SchemaMapResolver, StoreAccessor};
