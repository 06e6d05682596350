//! Fluent construction of query expression trees.
//!
//! [`Query`] builds the outer chain; lambdas receive the current item as
//! an [`Expr`] and use the helper methods below to read members and build
//! predicates.
//!
//! ```
//! use groq_expr::types::{Describe, TypeDescriptor, TypeShape};
//! use groq_expr::Query;
//!
//! struct Post;
//!
//! impl Describe for Post {
//!     fn describe() -> TypeDescriptor {
//!         TypeDescriptor::document("Post").field("title", TypeShape::string())
//!     }
//! }
//!
//! let groq = Query::of::<Post>()
//!     .filter(|p| p.field("title").eq("Hello"))
//!     .count()
//!     .to_groq()
//!     .unwrap();
//! assert_eq!(groq, r#"count(*[_type == "post"][title == "Hello"])"#);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use heck::ToLowerCamelCase;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::ast::{
    BinaryOp, Expr, MemberRef, MemberRole, Method, MethodCall, Parameter, UnaryOp,
};
use crate::config::QueryOptions;
use crate::error::Result;
use crate::parser::{CompiledQuery, QueryParser};
use crate::types::{Describe, TypeHandle, TypeShape};
use crate::value::Value;

static NEXT_PARAMETER: AtomicUsize = AtomicUsize::new(0);

/// Builds a one-parameter lambda over items of `shape`.
pub fn lambda(shape: TypeShape, body: impl FnOnce(Expr) -> Expr) -> Expr {
    let name = format!("x{}", NEXT_PARAMETER.fetch_add(1, Ordering::Relaxed));
    let param = Parameter { name, shape };
    let body = body(Expr::Parameter(param.clone()));
    Expr::lambda(vec![param], body)
}

/// Values usable where an operand is expected.
pub trait IntoOperand {
    fn into_operand(self) -> Expr;
}

impl IntoOperand for Expr {
    fn into_operand(self) -> Expr {
        self
    }
}

impl IntoOperand for &Expr {
    fn into_operand(self) -> Expr {
        self.clone()
    }
}

macro_rules! constant_operand {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoOperand for $ty {
                fn into_operand(self) -> Expr {
                    Expr::Constant(Value::from(self))
                }
            }
        )*
    };
}

constant_operand!(
    Value,
    &str,
    String,
    bool,
    i32,
    i64,
    usize,
    f64,
    Decimal,
    Uuid,
    NaiveDate,
    DateTime<FixedOffset>,
    DateTime<Utc>,
);

impl<T: Into<Value>> IntoOperand for Vec<T> {
    fn into_operand(self) -> Expr {
        Expr::Constant(Value::from(self))
    }
}

impl<T: Into<Value>> IntoOperand for Option<T> {
    fn into_operand(self) -> Expr {
        Expr::Constant(Value::from(self))
    }
}

/// Element shape of a collection expression.
fn item_shape(expr: &Expr) -> TypeShape {
    let shape = expr.shape();
    shape.element().cloned().unwrap_or(TypeShape::Any)
}

impl Expr {
    /// Reads a member, resolved through the item's type descriptor.
    ///
    /// Unknown members read the lower-camel-case field of the same name.
    pub fn field(&self, name: &str) -> Expr {
        let shape = self.shape();
        let resolved = shape.unwrap_optional().handle().and_then(|handle| {
            handle.descriptor().find_member(name).map(|member| MemberRef {
                name: member.name.clone(),
                wire_name: member.wire_name(),
                shape: member.shape.clone(),
                role: MemberRole::Field,
            })
        });
        let member = resolved.unwrap_or_else(|| MemberRef {
            name: name.to_string(),
            wire_name: name.to_lower_camel_case(),
            shape: TypeShape::Any,
            role: MemberRole::Field,
        });
        Expr::member(self.clone(), member)
    }

    /// Unwraps a reference (dereferencing it) or an optional.
    pub fn value(&self) -> Expr {
        let (role, shape) = match self.shape() {
            TypeShape::Reference(target) => (MemberRole::ReferenceValue, *target),
            TypeShape::Optional(inner) => (MemberRole::NullableValue, *inner),
            _ => return self.clone(),
        };
        Expr::member(
            self.clone(),
            MemberRef {
                name: "value".to_string(),
                wire_name: String::new(),
                shape,
                role,
            },
        )
    }

    /// Length of a string or collection.
    pub fn length(&self) -> Expr {
        Expr::member(
            self.clone(),
            MemberRef {
                name: "count".to_string(),
                wire_name: String::new(),
                shape: TypeShape::integer(),
                role: MemberRole::Count,
            },
        )
    }

    fn compare(&self, op: BinaryOp, other: impl IntoOperand) -> Expr {
        Expr::binary(op, self.clone(), other.into_operand())
    }

    pub fn eq(&self, other: impl IntoOperand) -> Expr {
        self.compare(BinaryOp::Equal, other)
    }

    pub fn ne(&self, other: impl IntoOperand) -> Expr {
        self.compare(BinaryOp::NotEqual, other)
    }

    pub fn lt(&self, other: impl IntoOperand) -> Expr {
        self.compare(BinaryOp::LessThan, other)
    }

    pub fn le(&self, other: impl IntoOperand) -> Expr {
        self.compare(BinaryOp::LessThanOrEqual, other)
    }

    pub fn gt(&self, other: impl IntoOperand) -> Expr {
        self.compare(BinaryOp::GreaterThan, other)
    }

    pub fn ge(&self, other: impl IntoOperand) -> Expr {
        self.compare(BinaryOp::GreaterThanOrEqual, other)
    }

    pub fn and(&self, other: impl IntoOperand) -> Expr {
        self.compare(BinaryOp::AndAlso, other)
    }

    pub fn or(&self, other: impl IntoOperand) -> Expr {
        self.compare(BinaryOp::OrElse, other)
    }

    pub fn plus(&self, other: impl IntoOperand) -> Expr {
        self.compare(BinaryOp::Add, other)
    }

    pub fn minus(&self, other: impl IntoOperand) -> Expr {
        self.compare(BinaryOp::Subtract, other)
    }

    pub fn times(&self, other: impl IntoOperand) -> Expr {
        self.compare(BinaryOp::Multiply, other)
    }

    pub fn divided_by(&self, other: impl IntoOperand) -> Expr {
        self.compare(BinaryOp::Divide, other)
    }

    pub fn modulo(&self, other: impl IntoOperand) -> Expr {
        self.compare(BinaryOp::Modulo, other)
    }

    /// `self ?? fallback`
    pub fn or_default(&self, fallback: impl IntoOperand) -> Expr {
        self.compare(BinaryOp::Coalesce, fallback)
    }

    pub fn not(&self) -> Expr {
        Expr::unary(UnaryOp::Not, self.clone())
    }

    pub fn negate(&self) -> Expr {
        Expr::unary(UnaryOp::Negate, self.clone())
    }

    pub fn is_null(&self) -> Expr {
        self.eq(Value::Null)
    }

    pub fn is_not_null(&self) -> Expr {
        self.ne(Value::Null)
    }

    fn instance_call(&self, method: Method, args: Vec<Expr>) -> Expr {
        Expr::Call(MethodCall::on(method, self.clone(), args))
    }

    fn extension_call(&self, method: Method, mut args: Vec<Expr>) -> Expr {
        args.insert(0, self.clone());
        Expr::Call(MethodCall::new(method, args))
    }

    pub fn starts_with(&self, prefix: impl IntoOperand) -> Expr {
        self.instance_call(Method::StartsWith, vec![prefix.into_operand()])
    }

    /// `item in self`.
    pub fn contains(&self, item: impl IntoOperand) -> Expr {
        self.instance_call(Method::Contains, vec![item.into_operand()])
    }

    /// Membership of `self` in a collection.
    pub fn is_in(&self, collection: impl IntoOperand) -> Expr {
        Expr::Call(MethodCall::new(
            Method::Contains,
            vec![collection.into_operand(), self.clone()],
        ))
    }

    pub fn is_null_or_empty(&self) -> Expr {
        self.extension_call(Method::IsNullOrEmpty, Vec::new())
    }

    pub fn is_defined(&self) -> Expr {
        self.extension_call(Method::IsDefined, Vec::new())
    }

    pub fn is_draft(&self) -> Expr {
        self.extension_call(Method::IsDraft, Vec::new())
    }

    pub fn document_id(&self) -> Expr {
        self.extension_call(Method::DocumentId, Vec::new())
    }

    pub fn document_type(&self) -> Expr {
        self.extension_call(Method::DocumentType, Vec::new())
    }

    pub fn document_revision(&self) -> Expr {
        self.extension_call(Method::DocumentRevision, Vec::new())
    }

    pub fn created_at(&self) -> Expr {
        self.extension_call(Method::CreatedAt, Vec::new())
    }

    pub fn updated_at(&self) -> Expr {
        self.extension_call(Method::UpdatedAt, Vec::new())
    }

    fn with_item_lambda(&self, method: Method, body: impl FnOnce(Expr) -> Expr) -> Expr {
        let lambda = lambda(item_shape(self), body);
        self.extension_call(method, vec![lambda])
    }

    /// Nested filter over a collection member.
    pub fn filter(&self, predicate: impl FnOnce(Expr) -> Expr) -> Expr {
        self.with_item_lambda(Method::Where, predicate)
    }

    pub fn select(&self, selector: impl FnOnce(Expr) -> Expr) -> Expr {
        self.with_item_lambda(Method::Select, selector)
    }

    pub fn select_many(&self, selector: impl FnOnce(Expr) -> Expr) -> Expr {
        self.with_item_lambda(Method::SelectMany, selector)
    }

    pub fn any(&self) -> Expr {
        self.extension_call(Method::Any, Vec::new())
    }

    pub fn any_where(&self, predicate: impl FnOnce(Expr) -> Expr) -> Expr {
        self.with_item_lambda(Method::Any, predicate)
    }

    pub fn count(&self) -> Expr {
        self.extension_call(Method::Count, Vec::new())
    }

    pub fn count_where(&self, predicate: impl FnOnce(Expr) -> Expr) -> Expr {
        self.with_item_lambda(Method::Count, predicate)
    }

    pub fn first(&self) -> Expr {
        self.extension_call(Method::First, Vec::new())
    }

    pub fn max_by(&self, selector: impl FnOnce(Expr) -> Expr) -> Expr {
        self.with_item_lambda(Method::Max, selector)
    }

    pub fn min_by(&self, selector: impl FnOnce(Expr) -> Expr) -> Expr {
        self.with_item_lambda(Method::Min, selector)
    }

    pub fn take(&self, count: usize) -> Expr {
        self.extension_call(Method::Take, vec![Expr::constant(count)])
    }

    pub fn skip(&self, count: usize) -> Expr {
        self.extension_call(Method::Skip, vec![Expr::constant(count)])
    }

    pub fn order_by(&self, selector: impl FnOnce(Expr) -> Expr) -> Expr {
        self.with_item_lambda(Method::OrderBy, selector)
    }

    pub fn of_type<T: Describe>(&self) -> Expr {
        Expr::Call(
            MethodCall::new(Method::OfType, vec![self.clone()])
                .with_type_arg(TypeShape::object::<T>()),
        )
    }

    /// Anonymous object with the given members.
    pub fn object<S: Into<String>>(members: impl IntoIterator<Item = (S, Expr)>) -> Expr {
        Expr::New(
            members
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        )
    }
}

/// A query over one document type, built call by call.
#[derive(Debug, Clone)]
pub struct Query {
    expr: Expr,
    doc_type: Option<TypeHandle>,
    item: TypeShape,
    result_type: Option<TypeShape>,
    options: QueryOptions,
}

impl Query {
    /// All documents of type `T`.
    pub fn of<T: Describe>() -> Self {
        let handle = TypeHandle::of::<T>();
        Query {
            expr: Expr::Source(Some(handle)),
            doc_type: Some(handle),
            item: TypeShape::Object(handle),
            result_type: None,
            options: QueryOptions::default(),
        }
    }

    /// All documents, untyped.
    pub fn untyped() -> Self {
        Query {
            expr: Expr::Source(None),
            doc_type: None,
            item: TypeShape::Any,
            result_type: None,
            options: QueryOptions::default(),
        }
    }

    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    /// Declares the type each result item is read as.
    pub fn returning(mut self, shape: TypeShape) -> Self {
        self.result_type = Some(shape);
        self
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn into_expr(self) -> Expr {
        self.expr
    }

    fn chain(mut self, call: MethodCall) -> Self {
        self.expr = Expr::Call(call);
        self
    }

    fn call(self, method: Method, mut args: Vec<Expr>) -> Self {
        args.insert(0, self.expr.clone());
        self.chain(MethodCall::new(method, args))
    }

    fn call_with(self, method: Method, body: impl FnOnce(Expr) -> Expr) -> Self {
        let lambda = lambda(self.item.clone(), body);
        self.call(method, vec![lambda])
    }

    pub fn filter(self, predicate: impl FnOnce(Expr) -> Expr) -> Self {
        self.call_with(Method::Where, predicate)
    }

    pub fn select(self, selector: impl FnOnce(Expr) -> Expr) -> Self {
        let selected = lambda(self.item.clone(), selector);
        let shape = selected.shape();
        let mut query = self.call(Method::Select, vec![selected]);
        query.item = shape;
        query
    }

    pub fn select_many(self, selector: impl FnOnce(Expr) -> Expr) -> Self {
        let selected = lambda(self.item.clone(), selector);
        let shape = selected.shape();
        let mut query = self.call(Method::SelectMany, vec![selected]);
        query.item = shape.element().cloned().unwrap_or(shape);
        query
    }

    /// Dereferences the selected member in the projection.
    pub fn include(self, selector: impl FnOnce(Expr) -> Expr) -> Self {
        self.call_with(Method::Include, selector)
    }

    /// Like [`Query::include`], reading from another source field.
    pub fn include_from(self, selector: impl FnOnce(Expr) -> Expr, source_name: &str) -> Self {
        let selected = lambda(self.item.clone(), selector);
        self.call(Method::Include, vec![selected, Expr::constant(source_name)])
    }

    pub fn of_type<T: Describe>(self) -> Self {
        let target = TypeShape::object::<T>();
        let call = MethodCall::new(Method::OfType, vec![self.expr.clone()])
            .with_type_arg(target.clone());
        let mut query = self.chain(call);
        query.item = target;
        query
    }

    pub fn cast<T: Describe>(self) -> Self {
        let target = TypeShape::object::<T>();
        let call =
            MethodCall::new(Method::Cast, vec![self.expr.clone()]).with_type_arg(target.clone());
        let mut query = self.chain(call);
        query.item = target;
        query
    }

    pub fn order_by(self, selector: impl FnOnce(Expr) -> Expr) -> Self {
        self.call_with(Method::OrderBy, selector)
    }

    pub fn order_by_descending(self, selector: impl FnOnce(Expr) -> Expr) -> Self {
        self.call_with(Method::OrderByDescending, selector)
    }

    pub fn then_by(self, selector: impl FnOnce(Expr) -> Expr) -> Self {
        self.call_with(Method::ThenBy, selector)
    }

    pub fn then_by_descending(self, selector: impl FnOnce(Expr) -> Expr) -> Self {
        self.call_with(Method::ThenByDescending, selector)
    }

    pub fn skip(self, count: usize) -> Self {
        self.call(Method::Skip, vec![Expr::constant(count)])
    }

    pub fn take(self, count: usize) -> Self {
        self.call(Method::Take, vec![Expr::constant(count)])
    }

    pub fn count(self) -> Self {
        self.call(Method::Count, Vec::new())
    }

    pub fn count_where(self, predicate: impl FnOnce(Expr) -> Expr) -> Self {
        self.call_with(Method::Count, predicate)
    }

    pub fn long_count(self) -> Self {
        self.call(Method::LongCount, Vec::new())
    }

    pub fn any(self) -> Self {
        self.call(Method::Any, Vec::new())
    }

    pub fn any_where(self, predicate: impl FnOnce(Expr) -> Expr) -> Self {
        self.call_with(Method::Any, predicate)
    }

    pub fn first(self) -> Self {
        self.call(Method::First, Vec::new())
    }

    pub fn first_where(self, predicate: impl FnOnce(Expr) -> Expr) -> Self {
        self.call_with(Method::First, predicate)
    }

    pub fn first_or_default(self) -> Self {
        self.call(Method::FirstOrDefault, Vec::new())
    }

    pub fn single(self) -> Self {
        self.call(Method::Single, Vec::new())
    }

    pub fn single_or_default(self) -> Self {
        self.call(Method::SingleOrDefault, Vec::new())
    }

    pub fn max(self, selector: impl FnOnce(Expr) -> Expr) -> Self {
        self.call_with(Method::Max, selector)
    }

    pub fn min(self, selector: impl FnOnce(Expr) -> Expr) -> Self {
        self.call_with(Method::Min, selector)
    }

    pub fn parser(&self) -> QueryParser {
        let parser = QueryParser::new(self.expr.clone(), self.doc_type, self.options.clone());
        match &self.result_type {
            Some(shape) => parser.result_type(shape.clone()),
            None => parser,
        }
    }

    pub fn to_groq(&self) -> Result<String> {
        self.parser().build_query(self.options.include_projections)
    }

    pub fn compile(&self) -> Result<CompiledQuery> {
        self.parser().compile()
    }
}
