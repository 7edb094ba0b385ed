//! Denormalization orchestrator - wraps the graph resolver with cache
//! consultation, cycle/depth recovery, status propagation, and the policy
//! deciding when results are eligible to be cached.

use crate::context::ResolutionContext;
use crate::factory;
use crate::resolver::{GraphResolver, NestedResolve, RelationshipWalker, Resolution};
use crate::source::{SchemaMapResolver, StoreAccessor};
use regraph_cache::{CacheStats, DescriptorKey, ValidityCache};
use regraph_core::{
    normalize_path, set_status, CollectionRef, DenormalizedCollection, DepthBound, DepthBudget,
    Descriptor, OneRef, RegraphResult, SchemaError, SchemaMap, SchemaPathMap,
};
use serde_json::Value;
use std::cell::RefCell;
use std::sync::Arc;
use tracing::{debug, trace};

/// Configuration for a denormalizer instance.
#[derive(Debug, Clone, Default)]
pub struct DenormalizerConfig {
    /// Also cache items resolved as nested frames. Off by default: nested
    /// values are sub-graphs of their parent and already captured
    /// transitively when the parent is cached.
    pub cache_child_objects: bool,
    /// Default depth bound used when a call omits one.
    pub depth_limit: DepthBound,
}

impl DenormalizerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable caching of nested (child) items.
    pub fn with_cache_child_objects(mut self, enabled: bool) -> Self {
        self.cache_child_objects = enabled;
        self
    }

    /// Set the default depth bound.
    pub fn with_depth_limit(mut self, depth: DepthBound) -> Self {
        self.depth_limit = depth;
        self
    }
}

/// Where the schema map for a call comes from.
enum StorageMode {
    /// Rebuild (or reuse from memo) the schema map from current storage on
    /// every top-level call.
    Find {
        accessor: StoreAccessor,
        paths: Arc<SchemaPathMap>,
        schema_maps: RefCell<SchemaMapResolver>,
    },
    /// The caller passes an explicit schema map per call.
    Provide,
}

/// Schema map in use for one call: borrowed from the caller or shared out of
/// the find-storage memo.
enum MapHandle<'a> {
    Provided(&'a SchemaMap),
    Resolved(Arc<SchemaMap>),
}

impl MapHandle<'_> {
    fn as_map(&self) -> &SchemaMap {
        match self {
            MapHandle::Provided(map) => map,
            MapHandle::Resolved(map) => map,
        }
    }
}

/// Whether a frame is the caller-initiated root of its call tree or a
/// recursive re-entry made while resolving relationships.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Root,
    Nested,
}

/// The denormalization orchestrator.
///
/// Single-threaded and synchronous: every operation runs to completion, and
/// the cache is an instance-owned resource with no external mutation path.
pub struct Denormalizer<R = RelationshipWalker> {
    resolver: R,
    cache: RefCell<ValidityCache>,
    mode: StorageMode,
    config: DenormalizerConfig,
}

impl<R: GraphResolver> Denormalizer<R> {
    /// Find-storage mode: the schema map is rebuilt from current storage via
    /// the accessor on each top-level call. Paths are validated up front.
    pub fn find_storage(
        resolver: R,
        accessor: StoreAccessor,
        paths: SchemaPathMap,
        config: DenormalizerConfig,
    ) -> RegraphResult<Self> {
        let mut canonical = SchemaPathMap::new();
        for (schema, path) in paths {
            let normalized = normalize_path(&path).ok_or_else(|| SchemaError::BadPath {
                schema: schema.clone(),
                path: path.clone(),
            })?;
            canonical.insert(schema, normalized);
        }
        Ok(Self::with_mode(
            resolver,
            StorageMode::Find {
                accessor,
                paths: Arc::new(canonical),
                schema_maps: RefCell::new(SchemaMapResolver::new()),
            },
            config,
        ))
    }

    /// Provide-storage mode: every call must pass its own schema map.
    pub fn provide_storage(resolver: R, config: DenormalizerConfig) -> Self {
        Self::with_mode(resolver, StorageMode::Provide, config)
    }

    fn with_mode(mut resolver: R, mode: StorageMode, config: DenormalizerConfig) -> Self {
        let mut cache = ValidityCache::new();
        cache.set_default_max_depth(config.depth_limit);
        resolver.set_depth_limit(config.depth_limit);
        Self {
            resolver,
            cache: RefCell::new(cache),
            mode,
            config,
        }
    }

    pub fn config(&self) -> &DenormalizerConfig {
        &self.config
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Denormalize a single item by descriptor.
    ///
    /// `schema_map` overrides the instance's current map for this call and is
    /// mandatory in provide-storage mode.
    pub fn denormalize_item(
        &self,
        descriptor: &Descriptor,
        schema_map: Option<&SchemaMap>,
        max_depth: Option<DepthBound>,
    ) -> RegraphResult<Value> {
        let depth = self.effective_depth(max_depth);
        let handle = self.begin_call(schema_map)?;
        let map = handle.as_map();
        let mut ctx = ResolutionContext::new();
        self.item_frame(descriptor, depth.budget(), &mut ctx, Frame::Root, map)
    }

    /// Denormalize a single reference.
    ///
    /// Absent input returns `Ok(None)` without touching the resolver or the
    /// cache. A structured reference's output carries a clone of the
    /// reference's OWN status, which describes the reference slot rather
    /// than the item it points at.
    pub fn denormalize_one(
        &self,
        one: Option<&OneRef>,
        schema_map: Option<&SchemaMap>,
        schema: Option<&str>,
        max_depth: Option<DepthBound>,
    ) -> RegraphResult<Option<Value>> {
        let Some(one) = one else {
            return Ok(None);
        };
        let depth = self.effective_depth(max_depth);
        let descriptor = factory::one_descriptor(one, schema)?;
        let handle = self.begin_call(schema_map)?;
        let map = handle.as_map();

        match one {
            OneRef::Id(_) => {
                let mut ctx = ResolutionContext::new();
                self.item_frame(&descriptor, depth.budget(), &mut ctx, Frame::Root, map)
                    .map(Some)
            }
            OneRef::Annotated(reference) => {
                if let Some(hit) =
                    self.cache
                        .borrow_mut()
                        .get_valid_one(reference, Some(depth), map)
                {
                    debug!(descriptor = %descriptor, "one-reference served from cache");
                    return Ok(Some(hit));
                }
                let mut ctx = ResolutionContext::new();
                let item = self.item_frame(&descriptor, depth.budget(), &mut ctx, Frame::Nested, map)?;

                let mut combined = item.clone();
                if let Some(status) = reference.status.as_ref() {
                    set_status(&mut combined, status);
                }
                if reference.status.is_some()
                    && !ctx.is_incomplete()
                    && !descriptor.matches_bare(&item)
                {
                    self.cache.borrow_mut().add_one(
                        reference,
                        combined.clone(),
                        Some(depth),
                        ctx.dependencies(),
                    );
                }
                Ok(Some(combined))
            }
        }
    }

    /// Denormalize a collection, order-preserving.
    ///
    /// Absent input returns `Ok(None)`. A status-less input is returned
    /// uncached: there is no key to validate it against later.
    pub fn denormalize_collection(
        &self,
        collection: Option<&CollectionRef>,
        schema_map: Option<&SchemaMap>,
        schema: Option<&str>,
        max_depth: Option<DepthBound>,
    ) -> RegraphResult<Option<DenormalizedCollection>> {
        let Some(collection) = collection else {
            return Ok(None);
        };
        let depth = self.effective_depth(max_depth);
        let seq = factory::collection_descriptors(collection, schema)?;
        let handle = self.begin_call(schema_map)?;
        let map = handle.as_map();

        if let CollectionRef::Annotated(annotated) = collection {
            if let Some(hit) =
                self.cache
                    .borrow_mut()
                    .get_valid_collection(annotated, Some(depth), map)
            {
                debug!("collection served from cache");
                return Ok(Some(hit));
            }
        }

        let mut ctx = ResolutionContext::new();
        let mut items = Vec::with_capacity(seq.descriptors.len());
        for descriptor in &seq.descriptors {
            items.push(self.item_frame(descriptor, depth.budget(), &mut ctx, Frame::Nested, map)?);
        }
        let output = DenormalizedCollection {
            items,
            status: seq.status,
        };

        if let (CollectionRef::Annotated(annotated), true) = (collection, output.status.is_some()) {
            if !ctx.is_incomplete() {
                self.cache.borrow_mut().add_collection(
                    annotated,
                    output.clone(),
                    Some(depth),
                    ctx.dependencies(),
                );
            }
        }
        Ok(Some(output))
    }

    /// Set the default depth bound used when a call omits one; the cache is
    /// informed so validity checks use a consistent bound.
    pub fn set_nesting_depth_limit(&mut self, depth: DepthBound) {
        self.config.depth_limit = depth;
        self.resolver.set_depth_limit(depth);
        self.cache.get_mut().set_default_max_depth(depth);
    }

    /// Drop every cached value and all freshness bookkeeping.
    pub fn flush_cache(&self) {
        self.cache.borrow_mut().flush();
    }

    /// Drop only the freshness bookkeeping; cached values must revalidate.
    pub fn flush_modification_cache(&self) {
        self.cache.borrow_mut().flush_modification_cache();
    }

    /// Invalidate the freshness bookkeeping in place.
    pub fn invalidate_modification_cache(&self) {
        self.cache.borrow_mut().invalidate_modification_cache();
    }

    /// Drop the schema map memo slot (find-storage mode); the next call
    /// rebuilds from current storage unconditionally.
    pub fn invalidate_schema_map(&self) {
        if let StorageMode::Find { schema_maps, .. } = &self.mode {
            schema_maps.borrow_mut().invalidate();
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.borrow().stats()
    }

    fn effective_depth(&self, max_depth: Option<DepthBound>) -> DepthBound {
        max_depth.unwrap_or(self.config.depth_limit)
    }

    /// Resolve the schema map for this call and open a cache round. The
    /// journal keeps its observations only when the map provably comes from
    /// the same snapshot as the previous round.
    fn begin_call<'a>(&self, provided: Option<&'a SchemaMap>) -> RegraphResult<MapHandle<'a>> {
        let (handle, source_unchanged) = match (provided, &self.mode) {
            (Some(map), _) => (MapHandle::Provided(map), false),
            (None, StorageMode::Provide) => {
                return Err(SchemaError::NoSchemaMap {
                    reason: "instance is in provide-storage mode; pass a schema map".to_string(),
                }
                .into())
            }
            (
                None,
                StorageMode::Find {
                    accessor,
                    paths,
                    schema_maps,
                },
            ) => {
                let snapshot = accessor();
                let (map, reused) = schema_maps.borrow_mut().resolve(&snapshot, paths);
                (MapHandle::Resolved(map), reused)
            }
        };
        self.cache.borrow_mut().begin_round(source_unchanged);
        Ok(handle)
    }

    /// One resolution frame: cache consult, delegate to the resolver,
    /// recover cycle/depth signals, apply the cache-eligibility policy.
    fn item_frame(
        &self,
        descriptor: &Descriptor,
        budget: DepthBudget,
        ctx: &mut ResolutionContext,
        frame: Frame,
        map: &SchemaMap,
    ) -> RegraphResult<Value> {
        let store_eligible = frame == Frame::Root || self.config.cache_child_objects;
        if store_eligible {
            if let DepthBudget::Within(bound) = budget {
                if let Some(hit) = self
                    .cache
                    .borrow_mut()
                    .get_valid_item(descriptor, Some(bound), map)
                {
                    debug!(descriptor = %descriptor, "item served from cache");
                    return Ok(hit);
                }
            }
        }

        match self.resolver.resolve(descriptor, map, budget, ctx, self)? {
            Resolution::Resolved(value) => {
                let key = DescriptorKey::for_item(descriptor);
                // Eligibility is judged BEFORE this descriptor leaves the
                // suppression set, so a call tree that recovered from a cycle
                // never caches its root.
                if store_eligible
                    && !ctx.is_incomplete()
                    && !ctx.has_suppressed()
                    && !descriptor.matches_bare(&value)
                {
                    if let DepthBudget::Within(bound) = budget {
                        trace!(descriptor = %descriptor, "item stored in cache");
                        self.cache.borrow_mut().add_item(
                            descriptor,
                            value.clone(),
                            Some(bound),
                            ctx.dependencies(),
                        );
                    }
                }
                ctx.clear_suppressed(&key);
                Ok(value)
            }
            Resolution::Cyclic(unresolved) => {
                debug!(descriptor = %unresolved, "cycle recovered with bare descriptor");
                ctx.suppress(DescriptorKey::for_item(&unresolved));
                Ok(unresolved.to_value())
            }
            Resolution::TooDeep(unresolved) => {
                debug!(descriptor = %unresolved, "depth bound recovered with bare descriptor");
                ctx.mark_incomplete();
                Ok(unresolved.to_value())
            }
        }
    }
}

impl<R: GraphResolver> NestedResolve for Denormalizer<R> {
    fn resolve_nested(
        &self,
        descriptor: &Descriptor,
        schema_map: &SchemaMap,
        budget: DepthBudget,
        ctx: &mut ResolutionContext,
    ) -> RegraphResult<Value> {
        self.item_frame(descriptor, budget, ctx, Frame::Nested, schema_map)
    }
}

// =============================================================================
// TESTS
// =============================================================================
