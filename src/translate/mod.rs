//! Translation of expression nodes into GROQ text.
//!
//! The [`Translator`] renders operands (constants, member paths, operators,
//! nested calls) to text and, for the calls of the top-level query chain,
//! records their effect on the [`QueryBuilder`] instead.
//!
//! ```text
//! Where(Source, |p| p.title == "Hello")   ->   constraint  title == "Hello"
//! Where(p.tags, |t| t == "news")           ->   text        tags[@ == "news"]
//! ```

mod binary;
mod member;
mod method;
mod operand;

use crate::builder::QueryBuilder;
use crate::error::{QueryError, Result};
use crate::ast::{Expr, Lambda, MethodCall};

pub use operand::render_constant;

/// Whether a call is applied to the query being built or rendered inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslateMode {
    /// Top-level chain call: mutates the builder, renders nothing
    Apply,
    /// Nested call inside a lambda body: rendered as an expression
    Render,
}

pub struct Translator<'a> {
    builder: &'a mut QueryBuilder,
}

impl<'a> Translator<'a> {
    pub fn new(builder: &'a mut QueryBuilder) -> Self {
        Translator { builder }
    }

    /// Renders an expression as GROQ text.
    pub fn transform(&mut self, expr: &Expr) -> Result<String> {
        self.transform_operand(expr)
    }

    pub fn add_filter(&mut self, filter: String) {
        self.builder.add_filter(filter);
    }

    /// Translates one call of the query chain, recording its effect.
    pub fn apply(&mut self, call: &MethodCall) -> Result<()> {
        self.translate_call(call, TranslateMode::Apply).map(|_| ())
    }
}

/// Body of the lambda argument at `index` after the call's source.
fn lambda_arg<'e>(call: &'e MethodCall, index: usize) -> Result<&'e Lambda> {
    call.rest()
        .get(index)
        .and_then(Expr::as_lambda)
        .ok_or_else(|| QueryError::malformed(&call.method, "expected a lambda argument"))
}

/// Optional lambda argument, for overloads with and without a predicate.
fn optional_lambda(call: &MethodCall, index: usize) -> Option<&Lambda> {
    call.rest().get(index).and_then(Expr::as_lambda)
}

fn source_of(call: &MethodCall) -> Result<&Expr> {
    call.source()
        .ok_or_else(|| QueryError::malformed(&call.method, "missing source argument"))
}

/// Appends `[]` to a collection path unless it already ends with one.
fn traverse(path: &str) -> String {
    if path.ends_with("[]") {
        path.to_string()
    } else {
        format!("{}[]", path)
    }
}

/// Joins two member path fragments; dereference markers need no dot.
pub(crate) fn join_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        return child.to_string();
    }
    if child.is_empty() {
        return parent.to_string();
    }
    if parent.ends_with("->") || child.starts_with("->") || child.starts_with('[') {
        format!("{}{}", parent, child)
    } else {
        format!("{}.{}", parent, child)
    }
}
