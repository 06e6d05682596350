//! Process-wide memoization of type metadata.
//!
//! Three caches live here, each a `DashMap` created on first use and never
//! invalidated for the lifetime of the process (types are static):
//!
//! - descriptors, keyed by `TypeId`
//! - document wire type names, keyed by `TypeId`
//! - projection field lists, keyed by `(TypeId, nesting level, max nesting level)`
//!
//! Entries are inserted if absent, so concurrent builds computing the same
//! key race harmlessly. [`clear`] and [`len`] exist for tests that need to
//! observe or reset cache state.

use std::any::TypeId;
use std::sync::Arc;

use dashmap::DashMap;
use heck::ToLowerCamelCase;
use once_cell::sync::Lazy;
use tracing::trace;

use super::descriptor::TypeDescriptor;
use super::shape::TypeHandle;

pub type ProjectionKey = (TypeId, usize, usize);

static DESCRIPTORS: Lazy<DashMap<TypeId, Arc<TypeDescriptor>>> = Lazy::new(DashMap::new);
static WIRE_TYPE_NAMES: Lazy<DashMap<TypeId, String>> = Lazy::new(DashMap::new);
static PROJECTIONS: Lazy<DashMap<ProjectionKey, Arc<Vec<String>>>> = Lazy::new(DashMap::new);

/// Entry counts of the three caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheSizes {
    pub descriptors: usize,
    pub wire_type_names: usize,
    pub projections: usize,
}

pub fn descriptor(handle: &TypeHandle) -> Arc<TypeDescriptor> {
    if let Some(found) = DESCRIPTORS.get(&handle.id()) {
        return Arc::clone(found.value());
    }
    // Built outside the entry lock: describing a type may resolve others.
    let built = Arc::new(handle.build_descriptor());
    let entry = DESCRIPTORS.entry(handle.id()).or_insert(built);
    Arc::clone(entry.value())
}

/// Wire type name for documents of `handle`'s type.
///
/// Prefers the descriptor's declared `_type` value, falling back to the
/// lower-camel-case short type name.
pub fn wire_type_name(handle: &TypeHandle) -> String {
    if let Some(found) = WIRE_TYPE_NAMES.get(&handle.id()) {
        trace!(type_name = handle.name(), "wire type name cache hit");
        return found.value().clone();
    }
    let descriptor = descriptor(handle);
    let name = match descriptor.declared_wire_type() {
        Some(declared) => declared.to_string(),
        None => handle.name().to_lower_camel_case(),
    };
    WIRE_TYPE_NAMES
        .entry(handle.id())
        .or_insert(name)
        .value()
        .clone()
}

pub fn cached_projection(key: &ProjectionKey) -> Option<Arc<Vec<String>>> {
    PROJECTIONS.get(key).map(|found| {
        trace!(level = key.1, max = key.2, "projection cache hit");
        Arc::clone(found.value())
    })
}

pub fn store_projection(key: ProjectionKey, fields: Vec<String>) -> Arc<Vec<String>> {
    let entry = PROJECTIONS.entry(key).or_insert_with(|| Arc::new(fields));
    Arc::clone(entry.value())
}

pub fn len() -> CacheSizes {
    CacheSizes {
        descriptors: DESCRIPTORS.len(),
        wire_type_names: WIRE_TYPE_NAMES.len(),
        projections: PROJECTIONS.len(),
    }
}

pub fn clear() {
    DESCRIPTORS.clear();
    WIRE_TYPE_NAMES.clear();
    PROJECTIONS.clear();
}
