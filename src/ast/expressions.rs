use crate::ast::call::{HostCall, Method, MethodCall};
use crate::ast::{BinaryOp, UnaryOp};
use crate::types::{TypeHandle, TypeShape};
use crate::value::Value;

/// A node of a query expression tree.
///
/// Trees are immutable once built. A single build walks the same tree
/// twice (partial evaluation, then translation) and never modifies it in
/// place; rewrites produce new nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal or captured host value
    Constant(Value),

    /// The document set a query chain starts from
    ///
    /// # Example
    /// ```text
    /// *
    /// ```
    Source(Option<TypeHandle>),

    /// Lambda parameter; renders as the current item (`@`)
    Parameter(Parameter),

    /// Member access
    ///
    /// # Examples
    /// ```text
    /// title
    /// author->name
    /// ```
    Member(MemberAccess),

    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },

    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Query-surface method call
    Call(MethodCall),

    /// Host function call; only meaningful before partial evaluation
    Invoke(HostCall),

    Lambda(Lambda),

    /// Anonymous object construction
    ///
    /// # Example
    /// ```text
    /// "name": title, year
    /// ```
    New(Vec<(String, Expr)>),

    /// Array construction
    NewArray(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub shape: TypeShape,
}

/// How a member access is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberRole {
    /// Plain field read
    Field,
    /// `.value` on a reference wrapper; renders the dereference marker
    ReferenceValue,
    /// `.value` on an optional; transparent
    NullableValue,
    /// Length of a collection or string
    Count,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberRef {
    pub name: String,
    pub wire_name: String,
    pub shape: TypeShape,
    pub role: MemberRole,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberAccess {
    pub object: Box<Expr>,
    pub member: MemberRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub params: Vec<Parameter>,
    pub body: Box<Expr>,
}

impl Expr {
    pub fn constant(value: impl Into<Value>) -> Expr {
        Expr::Constant(value.into())
    }

    pub fn parameter(name: impl Into<String>, shape: TypeShape) -> Expr {
        Expr::Parameter(Parameter {
            name: name.into(),
            shape,
        })
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn lambda(params: Vec<Parameter>, body: Expr) -> Expr {
        Expr::Lambda(Lambda {
            params,
            body: Box::new(body),
        })
    }

    pub fn member(object: Expr, member: MemberRef) -> Expr {
        Expr::Member(MemberAccess {
            object: Box::new(object),
            member,
        })
    }

    pub fn call(call: MethodCall) -> Expr {
        Expr::Call(call)
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Expr::Constant(_))
    }

    pub fn as_constant(&self) -> Option<&Value> {
        match self {
            Expr::Constant(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_lambda(&self) -> Option<&Lambda> {
        match self {
            Expr::Lambda(lambda) => Some(lambda),
            _ => None,
        }
    }

    /// Static shape of the value this node produces.
    pub fn shape(&self) -> TypeShape {
        match self {
            Expr::Constant(value) => value_shape(value),
            Expr::Source(Some(handle)) => TypeShape::array(TypeShape::Object(*handle)),
            Expr::Source(None) => TypeShape::array(TypeShape::Any),
            Expr::Parameter(param) => param.shape.clone(),
            Expr::Member(access) => access.member.shape.clone(),
            Expr::Unary { op: UnaryOp::Not, .. } => TypeShape::boolean(),
            Expr::Unary { operand, .. } => operand.shape(),
            Expr::Binary { op, left, right } => binary_shape(*op, left, right),
            Expr::Call(call) => call_shape(call),
            Expr::Invoke(_) | Expr::New(_) => TypeShape::Any,
            Expr::Lambda(lambda) => lambda.body.shape(),
            Expr::NewArray(items) => TypeShape::array(
                items.first().map(Expr::shape).unwrap_or(TypeShape::Any),
            ),
        }
    }
}

fn value_shape(value: &Value) -> TypeShape {
    match value {
        Value::String(_) => TypeShape::string(),
        Value::Boolean(_) => TypeShape::boolean(),
        Value::Integer(_) => TypeShape::integer(),
        Value::Float(_) => TypeShape::float(),
        Value::Decimal(_) => TypeShape::decimal(),
        Value::DateTime(_) => TypeShape::datetime(),
        Value::Date(_) => TypeShape::date(),
        Value::Guid(_) => TypeShape::guid(),
        Value::Array(items) => {
            TypeShape::array(items.first().map(value_shape).unwrap_or(TypeShape::Any))
        }
        Value::Null | Value::Object(_) => TypeShape::Any,
    }
}

fn binary_shape(op: BinaryOp, left: &Expr, right: &Expr) -> TypeShape {
    if op.is_comparison() || op.is_logical() {
        return TypeShape::boolean();
    }
    let left_shape = left.shape();
    match op {
        BinaryOp::Add if left_shape.is_string() || right.shape().is_string() => {
            TypeShape::string()
        }
        _ => left_shape,
    }
}

fn element_of(shape: TypeShape) -> TypeShape {
    match shape.element() {
        Some(element) => element.clone(),
        None => shape,
    }
}

fn call_shape(call: &MethodCall) -> TypeShape {
    let source_shape = || call.source().map(Expr::shape).unwrap_or(TypeShape::Any);
    let selector_shape = || {
        call.rest()
            .first()
            .and_then(Expr::as_lambda)
            .map(|lambda| lambda.body.shape())
    };

    let Some(method) = call.resolved() else {
        return TypeShape::Any;
    };
    match method {
        Method::Where
        | Method::OrderBy
        | Method::ThenBy
        | Method::OrderByDescending
        | Method::ThenByDescending
        | Method::Take
        | Method::Skip
        | Method::Include => source_shape(),
        Method::Implicit => {
            let shape = source_shape();
            shape.referenced().cloned().unwrap_or(shape)
        }
        Method::Select => TypeShape::array(selector_shape().unwrap_or(TypeShape::Any)),
        Method::SelectMany => {
            TypeShape::array(element_of(selector_shape().unwrap_or(TypeShape::Any)))
        }
        Method::OfType | Method::Cast => {
            let target = call.type_arg.clone().unwrap_or(TypeShape::Any);
            if source_shape().is_enumerable() {
                TypeShape::array(target)
            } else {
                target
            }
        }
        Method::Count | Method::LongCount => TypeShape::integer(),
        Method::Any
        | Method::Contains
        | Method::StartsWith
        | Method::IsNullOrEmpty
        | Method::IsDefined
        | Method::IsDraft => TypeShape::boolean(),
        Method::Max | Method::Min => {
            selector_shape().unwrap_or_else(|| element_of(source_shape()))
        }
        Method::First | Method::FirstOrDefault | Method::Single | Method::SingleOrDefault => {
            element_of(source_shape())
        }
        Method::DocumentId | Method::DocumentType | Method::DocumentRevision => {
            TypeShape::string()
        }
        Method::CreatedAt | Method::UpdatedAt => TypeShape::datetime(),
    }
}
