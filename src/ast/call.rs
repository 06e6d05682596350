use std::fmt;
use std::sync::Arc;

use crate::ast::Expr;
use crate::evaluator::EvalError;
use crate::types::TypeShape;
use crate::value::Value;

/// Methods of the query surface.
///
/// Calls keep their method as a plain name so that trees built elsewhere
/// can carry anything; the translator resolves names through
/// [`Method::from_name`] and rejects the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Where,
    Select,
    SelectMany,
    Include,
    OfType,
    Cast,
    OrderBy,
    ThenBy,
    OrderByDescending,
    ThenByDescending,
    Count,
    LongCount,
    Max,
    Min,
    Take,
    Skip,
    Any,
    First,
    FirstOrDefault,
    Single,
    SingleOrDefault,
    StartsWith,
    Contains,
    IsNullOrEmpty,
    IsDefined,
    IsDraft,
    DocumentId,
    DocumentType,
    DocumentRevision,
    CreatedAt,
    UpdatedAt,
    /// Reference-to-value conversion; transparent
    Implicit,
}

impl Method {
    pub fn from_name(name: &str) -> Option<Method> {
        let method = match name {
            "Where" => Method::Where,
            "Select" => Method::Select,
            "SelectMany" => Method::SelectMany,
            "Include" => Method::Include,
            "OfType" => Method::OfType,
            "Cast" => Method::Cast,
            "OrderBy" => Method::OrderBy,
            "ThenBy" => Method::ThenBy,
            "OrderByDescending" => Method::OrderByDescending,
            "ThenByDescending" => Method::ThenByDescending,
            "Count" => Method::Count,
            "LongCount" => Method::LongCount,
            "Max" => Method::Max,
            "Min" => Method::Min,
            "Take" => Method::Take,
            "Skip" => Method::Skip,
            "Any" => Method::Any,
            "First" => Method::First,
            "FirstOrDefault" => Method::FirstOrDefault,
            "Single" => Method::Single,
            "SingleOrDefault" => Method::SingleOrDefault,
            "StartsWith" => Method::StartsWith,
            "Contains" => Method::Contains,
            "IsNullOrEmpty" => Method::IsNullOrEmpty,
            "IsDefined" => Method::IsDefined,
            "IsDraft" => Method::IsDraft,
            "SanityId" | "_id" => Method::DocumentId,
            "SanityType" | "_type" => Method::DocumentType,
            "SanityRevision" | "_rev" => Method::DocumentRevision,
            "SanityCreatedAt" | "_createdAt" => Method::CreatedAt,
            "SanityUpdatedAt" | "_updatedAt" => Method::UpdatedAt,
            "op_Implicit" => Method::Implicit,
            _ => return None,
        };
        Some(method)
    }

    pub fn name(self) -> &'static str {
        match self {
            Method::Where => "Where",
            Method::Select => "Select",
            Method::SelectMany => "SelectMany",
            Method::Include => "Include",
            Method::OfType => "OfType",
            Method::Cast => "Cast",
            Method::OrderBy => "OrderBy",
            Method::ThenBy => "ThenBy",
            Method::OrderByDescending => "OrderByDescending",
            Method::ThenByDescending => "ThenByDescending",
            Method::Count => "Count",
            Method::LongCount => "LongCount",
            Method::Max => "Max",
            Method::Min => "Min",
            Method::Take => "Take",
            Method::Skip => "Skip",
            Method::Any => "Any",
            Method::First => "First",
            Method::FirstOrDefault => "FirstOrDefault",
            Method::Single => "Single",
            Method::SingleOrDefault => "SingleOrDefault",
            Method::StartsWith => "StartsWith",
            Method::Contains => "Contains",
            Method::IsNullOrEmpty => "IsNullOrEmpty",
            Method::IsDefined => "IsDefined",
            Method::IsDraft => "IsDraft",
            Method::DocumentId => "SanityId",
            Method::DocumentType => "SanityType",
            Method::DocumentRevision => "SanityRevision",
            Method::CreatedAt => "SanityCreatedAt",
            Method::UpdatedAt => "SanityUpdatedAt",
            Method::Implicit => "op_Implicit",
        }
    }

    /// Reserved document field read by the system-field accessors.
    pub fn system_field(self) -> Option<&'static str> {
        match self {
            Method::DocumentId => Some("_id"),
            Method::DocumentType => Some("_type"),
            Method::DocumentRevision => Some("_rev"),
            Method::CreatedAt => Some("_createdAt"),
            Method::UpdatedAt => Some("_updatedAt"),
            _ => None,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A call on the query surface.
///
/// Extension-style calls (`Where`, `Select`, `Count`, ...) carry their
/// source as `args[0]`; instance calls (`StartsWith`, `Contains` on a
/// value) carry the receiver in `object`.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub method: String,
    pub object: Option<Box<Expr>>,
    pub args: Vec<Expr>,
    /// Generic argument of `OfType`/`Cast`.
    pub type_arg: Option<TypeShape>,
}

impl MethodCall {
    pub fn new(method: Method, args: Vec<Expr>) -> Self {
        MethodCall {
            method: method.name().to_string(),
            object: None,
            args,
            type_arg: None,
        }
    }

    pub fn on(method: Method, object: Expr, args: Vec<Expr>) -> Self {
        MethodCall {
            method: method.name().to_string(),
            object: Some(Box::new(object)),
            args,
            type_arg: None,
        }
    }

    pub fn with_type_arg(mut self, shape: TypeShape) -> Self {
        self.type_arg = Some(shape);
        self
    }

    pub fn resolved(&self) -> Option<Method> {
        Method::from_name(&self.method)
    }

    /// The source of an extension call, or the receiver of an instance call.
    pub fn source(&self) -> Option<&Expr> {
        match &self.object {
            Some(object) => Some(object),
            None => self.args.first(),
        }
    }

    /// Arguments after the source.
    pub fn rest(&self) -> &[Expr] {
        match &self.object {
            Some(_) => &self.args,
            None => self.args.get(1..).unwrap_or(&[]),
        }
    }
}

pub type HostFn = Arc<dyn Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync>;

/// A named host function applied to argument expressions.
///
/// Only the partial evaluator runs these; a call that survives into
/// translation is unsupported.
#[derive(Clone)]
pub struct HostCall {
    pub name: String,
    pub function: HostFn,
    pub args: Vec<Expr>,
}

impl HostCall {
    pub fn new(
        name: impl Into<String>,
        args: Vec<Expr>,
        function: impl Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    ) -> Self {
        HostCall {
            name: name.into(),
            function: Arc::new(function),
            args,
        }
    }
}

impl fmt::Debug for HostCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostCall")
            .field("name", &self.name)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

impl PartialEq for HostCall {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && Arc::ptr_eq(&self.function, &other.function)
            && self.args == other.args
    }
}
