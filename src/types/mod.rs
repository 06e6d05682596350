//! Static type metadata used in place of runtime reflection.
//!
//! Document and value types implement [`Describe`]; everything else in the
//! crate works with [`TypeHandle`]s and [`TypeShape`]s, resolving
//! descriptors through the cached [`registry`].

mod descriptor;
pub mod registry;
mod shape;

pub use descriptor::{Describe, IncludeMarker, MemberDescriptor, TypeDescriptor};
pub use shape::{ASSET_MEMBER, ScalarKind, TypeHandle, TypeShape};
