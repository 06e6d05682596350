use std::any::{TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::descriptor::{Describe, TypeDescriptor};
use super::registry;

/// Wire name of the member that makes an object "asset-shaped".
pub const ASSET_MEMBER: &str = "asset";

/// Primitive kinds rendered as bare fields in projections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    String,
    Boolean,
    Integer,
    Float,
    Decimal,
    DateTime,
    Date,
    Guid,
}

/// Copyable handle to a described type.
///
/// Handles are compared by `TypeId`; the descriptor itself is resolved
/// lazily through the process-wide registry, so self-referencing types
/// (a person with friends who are people) are fine.
#[derive(Clone, Copy)]
pub struct TypeHandle {
    id: TypeId,
    rust_name: &'static str,
    describe: fn() -> TypeDescriptor,
}

impl TypeHandle {
    pub fn of<T: Describe>() -> Self {
        TypeHandle {
            id: TypeId::of::<T>(),
            rust_name: type_name::<T>(),
            describe: T::describe,
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Short type name without the module path.
    pub fn name(&self) -> &'static str {
        short_type_name(self.rust_name)
    }

    pub fn descriptor(&self) -> Arc<TypeDescriptor> {
        registry::descriptor(self)
    }

    /// The `_type` value documents of this type carry.
    pub fn wire_type_name(&self) -> String {
        registry::wire_type_name(self)
    }

    pub(crate) fn build_descriptor(&self) -> TypeDescriptor {
        (self.describe)()
    }
}

impl PartialEq for TypeHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeHandle {}

impl Hash for TypeHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHandle({})", self.name())
    }
}

fn short_type_name(full: &'static str) -> &'static str {
    let head = full.split('<').next().unwrap_or(full);
    head.rsplit("::").next().unwrap_or(head)
}

/// Structural classification of a member or expression type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeShape {
    Scalar(ScalarKind),
    /// Nullable wrapper; `.value` unwraps it without changing the path.
    Optional(Box<TypeShape>),
    /// Reference wrapper pointing at another document.
    Reference(Box<TypeShape>),
    Array(Box<TypeShape>),
    Object(TypeHandle),
    /// Raw JSON passthrough, covered by the spread operator.
    Json,
    /// Untyped object.
    Any,
}

impl TypeShape {
    pub fn string() -> Self {
        TypeShape::Scalar(ScalarKind::String)
    }

    pub fn boolean() -> Self {
        TypeShape::Scalar(ScalarKind::Boolean)
    }

    pub fn integer() -> Self {
        TypeShape::Scalar(ScalarKind::Integer)
    }

    pub fn float() -> Self {
        TypeShape::Scalar(ScalarKind::Float)
    }

    pub fn decimal() -> Self {
        TypeShape::Scalar(ScalarKind::Decimal)
    }

    pub fn datetime() -> Self {
        TypeShape::Scalar(ScalarKind::DateTime)
    }

    pub fn date() -> Self {
        TypeShape::Scalar(ScalarKind::Date)
    }

    pub fn guid() -> Self {
        TypeShape::Scalar(ScalarKind::Guid)
    }

    pub fn object<T: Describe>() -> Self {
        TypeShape::Object(TypeHandle::of::<T>())
    }

    pub fn reference<T: Describe>() -> Self {
        TypeShape::Reference(Box::new(TypeShape::object::<T>()))
    }

    pub fn array(element: TypeShape) -> Self {
        TypeShape::Array(Box::new(element))
    }

    pub fn optional(inner: TypeShape) -> Self {
        TypeShape::Optional(Box::new(inner))
    }

    /// Collection of references to `T`.
    pub fn references<T: Describe>() -> Self {
        TypeShape::array(TypeShape::reference::<T>())
    }

    /// Strips any number of optional wrappers.
    pub fn unwrap_optional(&self) -> &TypeShape {
        match self {
            TypeShape::Optional(inner) => inner.unwrap_optional(),
            other => other,
        }
    }

    /// Scalars (and optionals of scalars) render as bare fields.
    pub fn is_simple(&self) -> bool {
        matches!(self.unwrap_optional(), TypeShape::Scalar(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(
            self.unwrap_optional(),
            TypeShape::Scalar(ScalarKind::String)
        )
    }

    pub fn is_enumerable(&self) -> bool {
        matches!(self.unwrap_optional(), TypeShape::Array(_))
    }

    pub fn is_reference(&self) -> bool {
        matches!(self.unwrap_optional(), TypeShape::Reference(_))
    }

    pub fn is_reference_collection(&self) -> bool {
        self.element().is_some_and(TypeShape::is_reference)
    }

    /// Element shape of a collection.
    pub fn element(&self) -> Option<&TypeShape> {
        match self.unwrap_optional() {
            TypeShape::Array(element) => Some(element),
            _ => None,
        }
    }

    /// Target of a reference wrapper.
    pub fn referenced(&self) -> Option<&TypeShape> {
        match self.unwrap_optional() {
            TypeShape::Reference(target) => Some(target),
            _ => None,
        }
    }

    pub fn handle(&self) -> Option<TypeHandle> {
        match self.unwrap_optional() {
            TypeShape::Object(handle) => Some(*handle),
            _ => None,
        }
    }

    /// An object type with a member wired as `asset` that is itself a
    /// reference (image- and file-like values).
    pub fn is_asset_shaped(&self) -> bool {
        self.handle().is_some_and(|handle| {
            handle.descriptor().members().iter().any(|member| {
                member.wire_name() == ASSET_MEMBER && member.shape.is_reference()
            })
        })
    }

    pub fn is_asset_collection(&self) -> bool {
        self.element().is_some_and(TypeShape::is_asset_shaped)
    }

    /// Wire type name used by type filters (`OfType`).
    pub fn wire_type_name(&self) -> Option<String> {
        match self.unwrap_optional() {
            TypeShape::Reference(_) => Some("reference".to_string()),
            TypeShape::Object(handle) => Some(handle.wire_type_name()),
            _ => None,
        }
    }
}
