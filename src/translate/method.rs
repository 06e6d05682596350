use tracing::debug;

use super::operand::render_constant;
use super::{
    TranslateMode, Translator, join_path, lambda_arg, optional_lambda, source_of, traverse,
};
use crate::ast::{BinaryOp, Expr, Lambda, MemberRole, Method, MethodCall};
use crate::builder::MAX_SLICE_END;
use crate::error::{QueryError, Result};
use crate::evaluator::Evaluator;
use crate::projection::{join_projection, join_projection_narrowed};
use crate::types::TypeShape;
use crate::value::Value;

impl Translator<'_> {
    pub(crate) fn translate_call(&mut self, call: &MethodCall, mode: TranslateMode) -> Result<String> {
        let Some(method) = call.resolved() else {
            return Err(QueryError::UnsupportedMethod(call.method.clone()));
        };
        let apply = mode == TranslateMode::Apply;

        match method {
            Method::Where => self.translate_where(call, apply),
            Method::Select => self.translate_select(call, apply, false),
            Method::SelectMany => self.translate_select(call, apply, true),
            Method::Include => self.translate_include(call, apply),
            Method::OfType => self.translate_of_type(call, apply),
            Method::Cast => self.translate_cast(call, apply),
            Method::OrderBy
            | Method::ThenBy
            | Method::OrderByDescending
            | Method::ThenByDescending => self.translate_order(call, method, apply),
            Method::Count | Method::LongCount => self.translate_count(call, apply),
            Method::Max | Method::Min => self.translate_extreme(call, method, apply),
            Method::Take | Method::Skip => self.translate_slice(call, method, apply),
            Method::Any => self.translate_any(call, apply),
            Method::First | Method::FirstOrDefault | Method::Single | Method::SingleOrDefault => {
                self.translate_first(call, apply)
            }
            Method::Implicit if apply => Ok(String::new()),
            Method::Implicit => self.transform_operand(source_of(call)?),
            _ if apply => Err(QueryError::malformed(
                &call.method,
                "is not a query operator and cannot appear in the query chain",
            )),
            Method::StartsWith => self.translate_starts_with(call),
            Method::Contains => self.translate_contains(call),
            Method::IsNullOrEmpty => {
                let text = self.transform_operand(source_of(call)?)?;
                Ok(format!(
                    "({0} == null || {0} == \"\" || !(defined({0})))",
                    text
                ))
            }
            Method::IsDefined => {
                let text = self.transform_operand(source_of(call)?)?;
                Ok(format!("defined({})", text))
            }
            Method::IsDraft => {
                let parent = self.member_parent(source_of(call)?)?;
                Ok(format!("{} in path(\"drafts.**\")", join_path(&parent, "_id")))
            }
            Method::DocumentId
            | Method::DocumentType
            | Method::DocumentRevision
            | Method::CreatedAt
            | Method::UpdatedAt => {
                let parent = self.member_parent(source_of(call)?)?;
                let field = method.system_field().unwrap_or_default();
                Ok(join_path(&parent, field))
            }
        }
    }

    fn translate_where(&mut self, call: &MethodCall, apply: bool) -> Result<String> {
        let predicate = lambda_arg(call, 0)?;
        let filter = self.transform_operand(&predicate.body)?;
        if apply {
            self.builder.add_filter(filter);
            return Ok(String::new());
        }
        let source = self.transform_operand(source_of(call)?)?;
        Ok(format!("{}[{}]", source, filter))
    }

    fn translate_select(&mut self, call: &MethodCall, apply: bool, many: bool) -> Result<String> {
        let selector = lambda_arg(call, 0)?;
        let body = selector.body.as_ref();

        if !apply {
            let source = source_of(call)?;
            let source_text = self.transform_operand(source)?;
            let selected = self.select_path(&source_text, &source.shape(), body)?;
            return Ok(if many && body.shape().is_enumerable() {
                traverse(&selected)
            } else {
                selected
            });
        }

        let shape = body.shape();
        match body {
            Expr::Parameter(_) => {}
            Expr::New(members) => {
                let fields = self.transform_new(members)?;
                self.builder.projection = format!("{{{}}}", fields);
                self.builder.flatten_projection = false;
            }
            other => {
                let mut path = self.transform_operand(other)?;
                if many && shape.is_enumerable() {
                    path = traverse(&path);
                }
                self.builder.projection = path;
                self.builder.flatten_projection = true;
            }
        }
        self.builder.result_type = Some(match (many, shape.element()) {
            (true, Some(element)) => element.clone(),
            _ => shape,
        });
        Ok(String::new())
    }

    /// Inline projection of `body` over each item of `source_text`.
    fn select_path(&mut self, source_text: &str, source_shape: &TypeShape, body: &Expr) -> Result<String> {
        let base = if source_shape.is_enumerable() {
            traverse(source_text)
        } else {
            source_text.to_string()
        };
        match body {
            Expr::Parameter(_) => Ok(source_text.to_string()),
            Expr::New(members) => {
                let fields = self.transform_new(members)?;
                Ok(format!("{}{{{}}}", base, fields))
            }
            other => {
                let item = self.transform_operand(other)?;
                match item.strip_prefix('@') {
                    Some(rest) => Ok(format!("{}{}", base, rest)),
                    None => Ok(join_path(&base, &item)),
                }
            }
        }
    }

    fn translate_include(&mut self, call: &MethodCall, apply: bool) -> Result<String> {
        if !apply {
            return Err(QueryError::malformed(
                &call.method,
                "only valid as part of the query chain",
            ));
        }
        let selector = lambda_arg(call, 0)?;
        let source_name = match call.rest().get(1) {
            None | Some(Expr::Constant(Value::Null)) => None,
            Some(Expr::Constant(Value::String(name))) => Some(name.clone()),
            Some(_) => {
                return Err(QueryError::malformed(
                    &call.method,
                    "source name must be a string constant",
                ));
            }
        };

        let mut path = IncludePath::default();
        path.collect(&selector.body)?;
        let Some(last) = path.segments.last() else {
            return Err(QueryError::malformed(&call.method, "include path selects no member"));
        };

        let name = last.split('[').next().unwrap_or(last).to_string();
        let source = source_name.unwrap_or_else(|| name.clone());
        let nesting_level = path.segments.len();
        let max_nesting_level = self.builder.max_nesting_level;

        if let Some((base_key, base_shape)) = &path.base
            && !self.builder.has_include(base_key)
        {
            let fragment = join_projection(
                &name,
                &name,
                base_shape,
                nesting_level,
                max_nesting_level,
                true,
            );
            self.builder.add_include(base_key.clone(), fragment);
        }

        let fragment = join_projection_narrowed(
            &source,
            &name,
            &path.shape,
            nesting_level,
            max_nesting_level,
            true,
            path.narrow_to.as_deref(),
        );
        let key = path.segments.join(".");
        debug!(path = %key, "registered include");
        self.builder.add_include(key, fragment);
        Ok(String::new())
    }

    fn translate_of_type(&mut self, call: &MethodCall, apply: bool) -> Result<String> {
        let target = call
            .type_arg
            .as_ref()
            .ok_or_else(|| QueryError::malformed(&call.method, "missing type argument"))?;
        let wire_type = target.wire_type_name().ok_or_else(|| {
            QueryError::malformed(&call.method, "type argument has no document type name")
        })?;
        let filter = format!("_type == \"{}\"", wire_type);

        if apply {
            self.builder.add_filter(filter);
            self.builder.result_type = Some(target.clone());
            return Ok(String::new());
        }
        let source = self.transform_operand(source_of(call)?)?;
        Ok(format!("{}[{}]", source, filter))
    }

    fn translate_cast(&mut self, call: &MethodCall, apply: bool) -> Result<String> {
        if apply {
            if let Some(target) = &call.type_arg {
                self.builder.result_type = Some(target.clone());
            }
            return Ok(String::new());
        }
        self.transform_operand(source_of(call)?)
    }

    fn translate_order(&mut self, call: &MethodCall, method: Method, apply: bool) -> Result<String> {
        let selector = lambda_arg(call, 0)?;
        let key = self.transform_operand(&selector.body)?;
        let direction = match method {
            Method::OrderByDescending | Method::ThenByDescending => "desc",
            _ => "asc",
        };
        let ordering = format!("{} {}", key, direction);
        let restarts = matches!(method, Method::OrderBy | Method::OrderByDescending);

        if apply {
            if restarts {
                self.builder.orderings.clear();
            }
            self.builder.orderings.push(ordering);
            return Ok(String::new());
        }

        let source = self.transform_operand(source_of(call)?)?;
        if !restarts && source.contains(" | order(") && source.ends_with(')') {
            return Ok(format!("{}, {})", &source[..source.len() - 1], ordering));
        }
        Ok(format!("{} | order({})", source, ordering))
    }

    fn translate_count(&mut self, call: &MethodCall, apply: bool) -> Result<String> {
        let predicate = optional_lambda(call, 0);
        if apply {
            if let Some(predicate) = predicate {
                let filter = self.transform_operand(&predicate.body)?;
                self.builder.add_filter(filter);
            }
            self.builder.aggregate_function = "count".to_string();
            self.builder.expects_array = false;
            return Ok(String::new());
        }

        let source = self.transform_operand(source_of(call)?)?;
        match predicate {
            Some(predicate) => {
                let filter = self.transform_operand(&predicate.body)?;
                Ok(format!("count({}[{}])", source, filter))
            }
            None => Ok(format!("count({})", source)),
        }
    }

    fn translate_extreme(&mut self, call: &MethodCall, method: Method, apply: bool) -> Result<String> {
        let selector = optional_lambda(call, 0);
        if apply {
            if let Some(selector) = selector {
                self.builder.projection = self.transform_operand(&selector.body)?;
                self.builder.flatten_projection = true;
                self.builder.result_type = Some(selector.body.shape());
            }
            let direction = if method == Method::Max { "desc" } else { "asc" };
            self.builder.aggregate_function.clear();
            self.builder.aggregate_postfix = format!(" | order(@ {})[0]", direction);
            self.builder.expects_array = false;
            return Ok(String::new());
        }

        let source = source_of(call)?;
        let source_text = self.transform_operand(source)?;
        let values = match selector {
            Some(selector) => self.select_path(&source_text, &source.shape(), &selector.body)?,
            None => source_text,
        };
        let function = if method == Method::Max { "max" } else { "min" };
        Ok(format!("math::{}({})", function, values))
    }

    fn translate_slice(&mut self, call: &MethodCall, method: Method, apply: bool) -> Result<String> {
        let count = match call.rest().first().and_then(Expr::as_constant) {
            Some(value) => value
                .as_int()
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| {
                    QueryError::malformed(&call.method, "count must be a non-negative integer")
                })?,
            None => return Err(QueryError::malformed(&call.method, "count must be a constant")),
        };

        if apply {
            let builder = &mut *self.builder;
            if method == Method::Take {
                builder.take = Some(builder.take.map_or(count, |take| take.min(count)));
            } else {
                builder.skip += count;
                builder.take = builder.take.map(|take| take.saturating_sub(count));
            }
            return Ok(String::new());
        }

        let source = self.transform_operand(source_of(call)?)?;
        Ok(if method == Method::Take {
            format!("{}[0...{}]", source, count)
        } else {
            format!("{}[{}...{}]", source, count, MAX_SLICE_END)
        })
    }

    fn translate_any(&mut self, call: &MethodCall, apply: bool) -> Result<String> {
        let predicate = optional_lambda(call, 0);
        if apply {
            if let Some(predicate) = predicate {
                let filter = self.transform_operand(&predicate.body)?;
                self.builder.add_filter(filter);
            }
            self.builder.aggregate_function = "count".to_string();
            self.builder.aggregate_postfix = " > 0".to_string();
            self.builder.expects_array = false;
            return Ok(String::new());
        }

        let source = source_of(call)?;
        if let Expr::Constant(Value::Array(items)) = source {
            return self.any_over_constant(call, items, predicate);
        }
        let source_text = self.transform_operand(source)?;
        match predicate {
            Some(predicate) => {
                let filter = self.transform_operand(&predicate.body)?;
                Ok(format!("count({}[{}]) > 0", source_text, filter))
            }
            None => Ok(format!("count({}) > 0", source_text)),
        }
    }

    /// `ids.Any(id => id == p.field)` over a captured collection becomes a
    /// membership test on the values the item side produces.
    fn any_over_constant(
        &mut self,
        call: &MethodCall,
        items: &[Value],
        predicate: Option<&Lambda>,
    ) -> Result<String> {
        let Some(predicate) = predicate else {
            return Ok((!items.is_empty()).to_string());
        };
        let param = predicate
            .params
            .first()
            .map(|param| param.name.as_str())
            .ok_or_else(|| QueryError::malformed(&call.method, "predicate takes no parameter"))?;
        let Expr::Binary {
            op: BinaryOp::Equal,
            left,
            right,
        } = predicate.body.as_ref()
        else {
            return Err(QueryError::malformed(
                &call.method,
                "predicate over a captured collection must be an equality",
            ));
        };
        let (item_side, target) = match (mentions(left, param), mentions(right, param)) {
            (true, false) => (left.as_ref(), right.as_ref()),
            (false, true) => (right.as_ref(), left.as_ref()),
            _ => {
                return Err(QueryError::malformed(
                    &call.method,
                    "exactly one side of the equality must use the item",
                ));
            }
        };

        let projection = Expr::lambda(predicate.params.clone(), item_side.clone());
        let evaluator = Evaluator::new();
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            values.push(evaluator.apply_lambda(&projection, item.clone())?);
        }
        if values.is_empty() {
            return Ok("false".to_string());
        }
        let target = self.transform_operand(target)?;
        Ok(format!("{} in {}", target, render_constant(&Value::Array(values))?))
    }

    fn translate_first(&mut self, call: &MethodCall, apply: bool) -> Result<String> {
        let predicate = optional_lambda(call, 0);
        if apply {
            if let Some(predicate) = predicate {
                let filter = self.transform_operand(&predicate.body)?;
                self.builder.add_filter(filter);
            }
            self.builder.take = Some(self.builder.take.map_or(1, |take| take.min(1)));
            self.builder.expects_array = false;
            return Ok(String::new());
        }

        let source = self.transform_operand(source_of(call)?)?;
        match predicate {
            Some(predicate) => {
                let filter = self.transform_operand(&predicate.body)?;
                Ok(format!("{}[{}][0]", source, filter))
            }
            None => Ok(format!("{}[0]", source)),
        }
    }

    fn translate_starts_with(&mut self, call: &MethodCall) -> Result<String> {
        let receiver = self.transform_operand(source_of(call)?)?;
        let prefix = call
            .rest()
            .first()
            .ok_or_else(|| QueryError::malformed(&call.method, "missing prefix argument"))?;
        match prefix {
            Expr::Constant(Value::String(prefix)) => Ok(format!(
                "{} match {}",
                receiver,
                render_constant(&Value::String(format!("{}*", prefix)))?
            )),
            other => {
                let prefix = self.transform_operand(other)?;
                Ok(format!("{} match ({} + \"*\")", receiver, prefix))
            }
        }
    }

    fn translate_contains(&mut self, call: &MethodCall) -> Result<String> {
        let (collection, item) = match (call.object.as_deref(), call.args.as_slice()) {
            (Some(object), [item]) => (object, item),
            (None, [collection, item]) => (collection, item),
            _ => {
                return Err(QueryError::malformed(
                    &call.method,
                    "expected a collection and an item",
                ));
            }
        };

        if let Expr::Constant(Value::Array(values)) = collection {
            if values.is_empty() {
                return Ok("false".to_string());
            }
            let item = self.transform_operand(item)?;
            return Ok(format!("{} in {}", item, render_constant(&Value::Array(values.clone()))?));
        }

        if let (Expr::Member(_), Expr::Constant(value)) = (collection, item) {
            let member = self.transform_operand(collection)?;
            return Ok(format!("{} in {}", render_constant(value)?, member));
        }

        let collection_is_path = matches!(collection, Expr::Member(_) | Expr::Call(_));
        let item_is_path = matches!(item, Expr::Member(_) | Expr::Parameter(_));
        if collection_is_path || item_is_path {
            let item = self.transform_operand(item)?;
            let collection = self.transform_operand(collection)?;
            return Ok(format!("{} in {}", item, collection));
        }

        Err(QueryError::malformed(
            &call.method,
            "unsupported collection and item combination",
        ))
    }
}

/// Dotted path of an include selector, with the shape it ends on.
#[derive(Debug)]
struct IncludePath {
    segments: Vec<String>,
    shape: TypeShape,
    /// Wire type the last segment was narrowed to
    narrow_to: Option<String>,
    /// Unfiltered path and shape of a narrowed last segment
    base: Option<(String, TypeShape)>,
}

impl Default for IncludePath {
    fn default() -> Self {
        IncludePath {
            segments: Vec::new(),
            shape: TypeShape::Any,
            narrow_to: None,
            base: None,
        }
    }
}

impl IncludePath {
    fn collect(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Parameter(_) => Ok(()),
            Expr::Member(access) => {
                self.collect(&access.object)?;
                match access.member.role {
                    MemberRole::Field => {
                        self.segments.push(access.member.wire_name.clone());
                        self.narrow_to = None;
                        self.base = None;
                    }
                    MemberRole::ReferenceValue | MemberRole::NullableValue => {}
                    MemberRole::Count => {
                        return Err(QueryError::malformed(
                            Method::Include.name(),
                            "cannot include a count",
                        ));
                    }
                }
                self.shape = access.member.shape.clone();
                Ok(())
            }
            Expr::Call(call) => match call.resolved() {
                Some(Method::Select | Method::SelectMany) => {
                    self.collect(source_of(call)?)?;
                    let selector = lambda_arg(call, 0)?;
                    self.collect(&selector.body)
                }
                Some(Method::OfType) => {
                    self.collect(source_of(call)?)?;
                    self.narrow(call)
                }
                Some(Method::Implicit) => self.collect(source_of(call)?),
                _ => Err(QueryError::malformed(
                    Method::Include.name(),
                    format!("{} cannot appear in an include path", call.method),
                )),
            },
            _ => Err(QueryError::malformed(
                Method::Include.name(),
                "include path must be a member chain",
            )),
        }
    }

    /// Filters the last segment to one document type.
    fn narrow(&mut self, call: &MethodCall) -> Result<()> {
        let target = call
            .type_arg
            .clone()
            .ok_or_else(|| QueryError::malformed(&call.method, "missing type argument"))?;
        let wire_type = target.wire_type_name().ok_or_else(|| {
            QueryError::malformed(&call.method, "type argument has no document type name")
        })?;
        let Some(last) = self.segments.pop() else {
            return Err(QueryError::malformed(&call.method, "nothing to narrow"));
        };

        let mut base_segments = self.segments.clone();
        base_segments.push(last.clone());
        self.base = Some((base_segments.join("."), self.shape.clone()));
        self.segments
            .push(format!("{}[_type == \"{}\"]", last, wire_type));
        self.shape = if self.shape.is_enumerable() {
            TypeShape::array(target)
        } else {
            target
        };
        self.narrow_to = Some(wire_type);
        Ok(())
    }
}

/// Whether `expr` reads the parameter called `name`.
fn mentions(expr: &Expr, name: &str) -> bool {
    match expr {
        Expr::Parameter(param) => param.name == name,
        Expr::Constant(_) | Expr::Source(_) => false,
        Expr::Member(access) => mentions(&access.object, name),
        Expr::Unary { operand, .. } => mentions(operand, name),
        Expr::Binary { left, right, .. } => mentions(left, name) || mentions(right, name),
        Expr::Call(call) => {
            call.object.as_deref().is_some_and(|object| mentions(object, name))
                || call.args.iter().any(|arg| mentions(arg, name))
        }
        Expr::Invoke(host) => host.args.iter().any(|arg| mentions(arg, name)),
        Expr::Lambda(lambda) => mentions(&lambda.body, name),
        Expr::New(members) => members.iter().any(|(_, value)| mentions(value, name)),
        Expr::NewArray(items) => items.iter().any(|item| mentions(item, name)),
    }
}
