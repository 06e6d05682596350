//! # Query Expression Tree
//!
//! This module defines the expression tree the translator consumes. Trees
//! are usually built through the fluent [`Query`](crate::Query) API, but
//! every node type is public so callers can build them directly.
//!
//! ## Architecture Overview
//!
//! - **[expressions]** - Expression nodes (constants, parameters, members, operators, lambdas)
//! - **[operators]** - Binary and unary operators
//! - **[call]** - Query-surface method calls and host function calls
//!
//! ## Core Concepts
//!
//! ### Chains
//!
//! A query is a chain of extension-style calls whose innermost source is
//! [`Expr::Source`]:
//!
//! ```text
//! Count(Where(Source(Post), |p| p.title == "Hello"))
//! ```
//!
//! translates to
//!
//! ```text
//! count(*[_type == "post"][title == "Hello"])
//! ```
//!
//! ### Members and References
//!
//! Member nodes carry the wire name and static shape resolved from the
//! owning type's descriptor. Reading `.value` on a reference member is a
//! member node with [`MemberRole::ReferenceValue`] and renders the
//! dereference marker:
//!
//! ```text
//! p.author.value.name   ->   author->name
//! ```
//!
//! ### Captured Values
//!
//! Sub-trees that do not mention a lambda parameter (constants, arithmetic
//! over constants, [`Expr::Invoke`] host calls) are folded into constants
//! before translation.
pub mod call;
pub mod expressions;
pub mod operators;

pub use call::{HostCall, HostFn, Method, MethodCall};
pub use expressions::{Expr, Lambda, MemberAccess, MemberRef, MemberRole, Parameter};
pub use operators::{BinaryOp, UnaryOp};
