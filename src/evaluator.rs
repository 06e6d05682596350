use std::cmp::Ordering;
use std::collections::HashMap;

use rust_decimal::{Decimal, prelude::FromPrimitive, prelude::ToPrimitive};
use thiserror::Error;

use crate::ast::{BinaryOp, Expr, MemberRole, MethodCall, UnaryOp};
use crate::value::Value;

/// Parameter bindings visible while evaluating a sub-tree.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    bindings: HashMap<String, Value>,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new context with one more parameter bound
    pub fn with_binding(&self, name: impl Into<String>, value: Value) -> Self {
        let mut bindings = self.bindings.clone();
        bindings.insert(name.into(), value);
        EvalContext { bindings }
    }
}

/// Evaluates closed expression sub-trees to host values.
///
/// This is what the partial evaluator runs on nominated sub-trees. It
/// covers what captured query arguments need (arithmetic, comparison,
/// logic, member reads on captured objects, host calls and a handful of
/// string and collection methods), nothing more.
#[derive(Debug, Default)]
pub struct Evaluator;

/// Errors that can occur during constant evaluation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// Type mismatch or invalid operation for the given type
    #[error("Type error: {0}")]
    TypeError(String),

    /// Invalid member access
    #[error("Access error: {0}")]
    AccessError(String),

    /// Reference to a lambda parameter with no bound value
    #[error("Unbound parameter: {0}")]
    UnboundParameter(String),

    /// Division by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// A host function reported a failure
    #[error("Host function {name} failed: {message}")]
    Host { name: String, message: String },

    /// Node kind that only exists in translated queries
    #[error("Cannot evaluate {0} locally")]
    NotEvaluable(&'static str),
}

impl Evaluator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluates an expression with no parameters bound.
    ///
    /// # Examples
    ///
    /// ```
    /// use groq_expr::ast::{BinaryOp, Expr};
    /// use groq_expr::evaluator::Evaluator;
    /// use groq_expr::Value;
    ///
    /// let expr = Expr::binary(BinaryOp::Multiply, Expr::constant(6), Expr::constant(7));
    /// let result = Evaluator::new().evaluate(&expr).unwrap();
    /// assert_eq!(result, Value::Integer(42));
    /// ```
    pub fn evaluate(&self, expr: &Expr) -> Result<Value, EvalError> {
        self.eval_expr(expr, &EvalContext::new())
    }

    pub fn eval_expr(&self, expr: &Expr, context: &EvalContext) -> Result<Value, EvalError> {
        match expr {
            Expr::Constant(value) => Ok(value.clone()),
            Expr::Parameter(param) => context
                .bindings
                .get(&param.name)
                .cloned()
                .ok_or_else(|| EvalError::UnboundParameter(param.name.clone())),
            Expr::Member(access) => {
                let object = self.eval_expr(&access.object, context)?;
                match access.member.role {
                    MemberRole::Field => {
                        self.apply_access(&object, &access.member.name, &access.member.wire_name)
                    }
                    MemberRole::ReferenceValue | MemberRole::NullableValue => Ok(object),
                    MemberRole::Count => self.method_count(&object),
                }
            }
            Expr::Unary { op, operand } => {
                let value = self.eval_expr(operand, context)?;
                self.apply_unary(*op, value)
            }
            Expr::Binary { op, left, right } => match op {
                BinaryOp::Coalesce => {
                    let left_val = self.eval_expr(left, context)?;
                    if left_val.is_null() {
                        self.eval_expr(right, context)
                    } else {
                        Ok(left_val)
                    }
                }
                BinaryOp::AndAlso => {
                    if !boolean(*op, &self.eval_expr(left, context)?)? {
                        return Ok(Value::Boolean(false));
                    }
                    Ok(Value::Boolean(boolean(*op, &self.eval_expr(right, context)?)?))
                }
                BinaryOp::OrElse => {
                    if boolean(*op, &self.eval_expr(left, context)?)? {
                        return Ok(Value::Boolean(true));
                    }
                    Ok(Value::Boolean(boolean(*op, &self.eval_expr(right, context)?)?))
                }
                _ => {
                    let left_val = self.eval_expr(left, context)?;
                    let right_val = self.eval_expr(right, context)?;
                    self.apply_binop(*op, &left_val, &right_val)
                }
            },
            Expr::Call(call) => self.eval_method_call(call, context),
            Expr::Invoke(host) => {
                let mut args = Vec::with_capacity(host.args.len());
                for arg in &host.args {
                    args.push(self.eval_expr(arg, context)?);
                }
                (host.function)(&args)
            }
            Expr::New(members) => {
                let mut map = HashMap::new();
                for (name, expr) in members {
                    map.insert(name.clone(), self.eval_expr(expr, context)?);
                }
                Ok(Value::Object(map))
            }
            Expr::NewArray(items) => {
                let mut arr = Vec::with_capacity(items.len());
                for item in items {
                    arr.push(self.eval_expr(item, context)?);
                }
                Ok(Value::Array(arr))
            }
            Expr::Source(_) => Err(EvalError::NotEvaluable("a document source")),
            Expr::Lambda(_) => Err(EvalError::NotEvaluable("a lambda")),
        }
    }

    /// Applies a single-parameter lambda to `item`.
    pub fn apply_lambda(&self, lambda: &Expr, item: Value) -> Result<Value, EvalError> {
        let Some(lambda) = lambda.as_lambda() else {
            return Err(EvalError::TypeError("expected a lambda".to_string()));
        };
        let context = match lambda.params.first() {
            Some(param) => EvalContext::new().with_binding(param.name.clone(), item),
            None => EvalContext::new(),
        };
        self.eval_expr(&lambda.body, &context)
    }

    fn apply_access(&self, object: &Value, name: &str, wire_name: &str) -> Result<Value, EvalError> {
        match object {
            Value::Object(map) => Ok(map
                .get(name)
                .or_else(|| map.get(wire_name))
                .cloned()
                .unwrap_or(Value::Null)),
            Value::Null => Err(EvalError::AccessError(format!(
                "Cannot read {} of null",
                name
            ))),
            other => Err(EvalError::AccessError(format!(
                "Cannot read {} of {}",
                name,
                other.type_name()
            ))),
        }
    }

    fn apply_unary(&self, op: UnaryOp, value: Value) -> Result<Value, EvalError> {
        match op {
            UnaryOp::Not => match value.as_bool() {
                Some(b) => Ok(Value::Boolean(!b)),
                None => Err(EvalError::TypeError(format!(
                    "Cannot apply ! to {}",
                    value.type_name()
                ))),
            },
            UnaryOp::Convert => Ok(value),
            UnaryOp::Negate => match value {
                Value::Integer(n) => n
                    .checked_neg()
                    .map(Value::Integer)
                    .ok_or_else(|| EvalError::TypeError("Integer overflow in -".to_string())),
                Value::Float(n) => Ok(Value::Float(-n)),
                Value::Decimal(d) => Ok(Value::Decimal(-d)),
                other => Err(EvalError::TypeError(format!(
                    "Cannot negate {}",
                    other.type_name()
                ))),
            },
        }
    }

    fn apply_binop(&self, op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
        match op {
            BinaryOp::Add => match (left, right) {
                (Value::String(a), b) => Ok(Value::String(format!("{}{}", a, b.as_string()))),
                (a, Value::String(b)) => Ok(Value::String(format!("{}{}", a.as_string(), b))),
                (a, b) => self.arithmetic(op, a, b),
            },
            BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo => {
                self.arithmetic(op, left, right)
            }
            BinaryOp::Equal => Ok(Value::Boolean(self.values_equal(left, right))),
            BinaryOp::NotEqual => Ok(Value::Boolean(!self.values_equal(left, right))),
            BinaryOp::LessThan
            | BinaryOp::LessThanOrEqual
            | BinaryOp::GreaterThan
            | BinaryOp::GreaterThanOrEqual => {
                let ordering = self.compare_values(left, right).ok_or_else(|| {
                    EvalError::TypeError(format!(
                        "Cannot compare {} with {}",
                        left.type_name(),
                        right.type_name()
                    ))
                })?;
                let result = match op {
                    BinaryOp::LessThan => ordering == Ordering::Less,
                    BinaryOp::LessThanOrEqual => ordering != Ordering::Greater,
                    BinaryOp::GreaterThan => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                };
                Ok(Value::Boolean(result))
            }
            BinaryOp::AndAlso => Ok(Value::Boolean(boolean(op, left)? && boolean(op, right)?)),
            BinaryOp::OrElse => Ok(Value::Boolean(boolean(op, left)? || boolean(op, right)?)),
            BinaryOp::Coalesce => Ok(if left.is_null() {
                right.clone()
            } else {
                left.clone()
            }),
        }
    }

    fn arithmetic(&self, op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
        match (left, right) {
            (Value::Integer(a), Value::Integer(b)) => {
                let result = match op {
                    BinaryOp::Add => a.checked_add(*b),
                    BinaryOp::Subtract => a.checked_sub(*b),
                    BinaryOp::Multiply => a.checked_mul(*b),
                    BinaryOp::Divide | BinaryOp::Modulo if *b == 0 => {
                        return Err(EvalError::DivisionByZero);
                    }
                    // Truncates toward zero
                    BinaryOp::Divide => a.checked_div(*b),
                    _ => a.checked_rem(*b),
                };
                result.map(Value::Integer).ok_or_else(|| {
                    EvalError::TypeError(format!("Integer overflow in {}", op.symbol()))
                })
            }
            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(float_op(op, *a, *b)?)),
            (Value::Decimal(_), _) | (_, Value::Decimal(_)) => {
                let (a, b) = decimal_pair(left, right)?;
                Ok(Value::Decimal(decimal_op(op, a, b)?))
            }
            (Value::Integer(_), Value::Float(_)) | (Value::Float(_), Value::Integer(_)) => {
                // Mixed operands go through Decimal to avoid float noise,
                // keeping integers when the result is whole.
                if let Ok((a, b)) = decimal_pair(left, right)
                    && let Ok(rd) = decimal_op(op, a, b)
                {
                    if rd.is_integer()
                        && let Some(r) = rd.to_i64()
                    {
                        return Ok(Value::Integer(r));
                    } else if let Some(r) = rd.to_f64() {
                        return Ok(Value::Float(r));
                    }
                }
                let a = left.as_float().unwrap_or_default();
                let b = right.as_float().unwrap_or_default();
                Ok(Value::Float(float_op(op, a, b)?))
            }
            (a, b) => Err(EvalError::TypeError(format!(
                "Cannot apply {} to {} and {}",
                op.symbol(),
                a.type_name(),
                b.type_name()
            ))),
        }
    }

    fn values_equal(&self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Integer(_) | Value::Float(_) | Value::Decimal(_), _)
                if b.as_float().is_some() =>
            {
                self.compare_values(a, b) == Some(Ordering::Equal)
            }
            _ => a == b,
        }
    }

    fn compare_values(&self, a: &Value, b: &Value) -> Option<Ordering> {
        match (a, b) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Decimal(_), _) | (_, Value::Decimal(_)) => {
                let (a, b) = decimal_pair(a, b).ok()?;
                Some(a.cmp(&b))
            }
            (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
                a.as_float()?.partial_cmp(&b.as_float()?)
            }
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    fn eval_method_call(&self, call: &MethodCall, ctx: &EvalContext) -> Result<Value, EvalError> {
        let object = match call.source() {
            Some(source) => self.eval_expr(source, ctx)?,
            None => {
                return Err(EvalError::TypeError(format!(
                    "{}() requires a receiver",
                    call.method
                )));
            }
        };
        let args = call.rest();

        match call.method.as_str() {
            "Count" | "Length" => self.method_count(&object),
            "ToUpper" => self.method_upper(&object),
            "ToLower" => self.method_lower(&object),
            "Trim" => self.method_trim(&object),
            "ToString" => Ok(Value::String(object.as_string())),
            "Contains" => self.method_contains(&object, args, ctx),
            "StartsWith" => self.method_startswith(&object, args, ctx),
            "EndsWith" => self.method_endswith(&object, args, ctx),
            "Select" => self.method_select(&object, args),
            _ => Err(EvalError::TypeError(format!(
                "Unknown method: {}",
                call.method
            ))),
        }
    }

    fn string_arg(&self, method: &str, args: &[Expr], ctx: &EvalContext) -> Result<String, EvalError> {
        let Some(arg) = args.first() else {
            return Err(EvalError::TypeError(format!(
                "{}() requires an argument",
                method
            )));
        };
        match self.eval_expr(arg, ctx)? {
            Value::String(s) => Ok(s),
            other => Err(EvalError::TypeError(format!(
                "{}() argument must be string, got {}",
                method,
                other.type_name()
            ))),
        }
    }

    fn method_count(&self, object: &Value) -> Result<Value, EvalError> {
        match object {
            Value::Array(arr) => Ok(Value::Integer(arr.len() as i64)),
            Value::String(s) => Ok(Value::Integer(s.chars().count() as i64)),
            _ => Err(EvalError::TypeError(format!(
                "Count requires array or string, got {}",
                object.type_name()
            ))),
        }
    }

    fn method_upper(&self, object: &Value) -> Result<Value, EvalError> {
        match object {
            Value::String(s) => Ok(Value::String(s.to_uppercase())),
            _ => Err(EvalError::TypeError(format!(
                "ToUpper() requires string, got {}",
                object.type_name()
            ))),
        }
    }

    fn method_lower(&self, object: &Value) -> Result<Value, EvalError> {
        match object {
            Value::String(s) => Ok(Value::String(s.to_lowercase())),
            _ => Err(EvalError::TypeError(format!(
                "ToLower() requires string, got {}",
                object.type_name()
            ))),
        }
    }

    fn method_trim(&self, object: &Value) -> Result<Value, EvalError> {
        match object {
            Value::String(s) => Ok(Value::String(s.trim().to_string())),
            _ => Err(EvalError::TypeError(format!(
                "Trim() requires string, got {}",
                object.type_name()
            ))),
        }
    }

    /// Substring test on strings, membership test on arrays
    fn method_contains(&self, object: &Value, args: &[Expr], ctx: &EvalContext) -> Result<Value, EvalError> {
        match object {
            Value::String(s) => {
                let needle = self.string_arg("Contains", args, ctx)?;
                Ok(Value::Boolean(s.contains(&needle)))
            }
            Value::Array(items) => {
                let Some(arg) = args.first() else {
                    return Err(EvalError::TypeError(
                        "Contains() requires an argument".to_string(),
                    ));
                };
                let needle = self.eval_expr(arg, ctx)?;
                Ok(Value::Boolean(
                    items.iter().any(|item| self.values_equal(item, &needle)),
                ))
            }
            _ => Err(EvalError::TypeError(format!(
                "Contains() requires string or array, got {}",
                object.type_name()
            ))),
        }
    }

    fn method_startswith(&self, object: &Value, args: &[Expr], ctx: &EvalContext) -> Result<Value, EvalError> {
        match object {
            Value::String(s) => {
                let prefix = self.string_arg("StartsWith", args, ctx)?;
                Ok(Value::Boolean(s.starts_with(&prefix)))
            }
            _ => Err(EvalError::TypeError(format!(
                "StartsWith() requires string, got {}",
                object.type_name()
            ))),
        }
    }

    fn method_endswith(&self, object: &Value, args: &[Expr], ctx: &EvalContext) -> Result<Value, EvalError> {
        match object {
            Value::String(s) => {
                let suffix = self.string_arg("EndsWith", args, ctx)?;
                Ok(Value::Boolean(s.ends_with(&suffix)))
            }
            _ => Err(EvalError::TypeError(format!(
                "EndsWith() requires string, got {}",
                object.type_name()
            ))),
        }
    }

    /// Maps a lambda over a captured array
    fn method_select(&self, object: &Value, args: &[Expr]) -> Result<Value, EvalError> {
        let (Value::Array(items), Some(selector)) = (object, args.first()) else {
            return Err(EvalError::TypeError(
                "Select() requires an array and a selector".to_string(),
            ));
        };
        let mut mapped = Vec::with_capacity(items.len());
        for item in items {
            mapped.push(self.apply_lambda(selector, item.clone())?);
        }
        Ok(Value::Array(mapped))
    }
}

fn boolean(op: BinaryOp, value: &Value) -> Result<bool, EvalError> {
    value.as_bool().ok_or_else(|| {
        EvalError::TypeError(format!(
            "Cannot apply {} to {}",
            op.symbol(),
            value.type_name()
        ))
    })
}

fn float_op(op: BinaryOp, a: f64, b: f64) -> Result<f64, EvalError> {
    match op {
        BinaryOp::Add => Ok(a + b),
        BinaryOp::Subtract => Ok(a - b),
        BinaryOp::Multiply => Ok(a * b),
        BinaryOp::Divide | BinaryOp::Modulo if b == 0.0 => Err(EvalError::DivisionByZero),
        BinaryOp::Divide => Ok(a / b),
        BinaryOp::Modulo => Ok(a % b),
        other => Err(EvalError::TypeError(format!(
            "{} is not arithmetic",
            other.symbol()
        ))),
    }
}

fn decimal_op(op: BinaryOp, a: Decimal, b: Decimal) -> Result<Decimal, EvalError> {
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Subtract => a.checked_sub(b),
        BinaryOp::Multiply => a.checked_mul(b),
        BinaryOp::Divide | BinaryOp::Modulo if b.is_zero() => {
            return Err(EvalError::DivisionByZero);
        }
        BinaryOp::Divide => a.checked_div(b),
        BinaryOp::Modulo => a.checked_rem(b),
        other => {
            return Err(EvalError::TypeError(format!(
                "{} is not arithmetic",
                other.symbol()
            )));
        }
    };
    result.ok_or_else(|| EvalError::TypeError(format!("Decimal overflow in {}", op.symbol())))
}

fn to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Integer(n) => Decimal::from_i64(*n),
        Value::Float(n) => Decimal::from_f64(*n),
        Value::Decimal(d) => Some(*d),
        _ => None,
    }
}

fn decimal_pair(left: &Value, right: &Value) -> Result<(Decimal, Decimal), EvalError> {
    match (to_decimal(left), to_decimal(right)) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(EvalError::TypeError(format!(
            "Cannot use {} and {} as numbers",
            left.type_name(),
            right.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(expr: Expr) -> Result<Value, EvalError> {
        Evaluator::new().evaluate(&expr)
    }

    #[test]
    fn mixed_arithmetic_keeps_whole_results_integral() {
        let expr = Expr::binary(BinaryOp::Add, Expr::constant(1), Expr::constant(0.5));
        assert_eq!(eval(expr), Ok(Value::Float(1.5)));

        let expr = Expr::binary(BinaryOp::Multiply, Expr::constant(4), Expr::constant(0.5));
        assert_eq!(eval(expr), Ok(Value::Integer(2)));
    }

    #[test]
    fn integer_division_by_zero_fails() {
        let expr = Expr::binary(BinaryOp::Divide, Expr::constant(1), Expr::constant(0));
        assert_eq!(eval(expr), Err(EvalError::DivisionByZero));
    }

    #[test]
    fn integer_division_truncates() {
        let expr = Expr::binary(BinaryOp::Divide, Expr::constant(7), Expr::constant(2));
        assert_eq!(eval(expr), Ok(Value::Integer(3)));

        let expr = Expr::binary(BinaryOp::Divide, Expr::constant(-7), Expr::constant(2));
        assert_eq!(eval(expr), Ok(Value::Integer(-3)));
    }

    #[test]
    fn integer_overflow_is_an_error() {
        for op in [BinaryOp::Divide, BinaryOp::Modulo] {
            let expr = Expr::binary(op, Expr::constant(i64::MIN), Expr::constant(-1));
            assert!(matches!(eval(expr), Err(EvalError::TypeError(_))));
        }

        let expr = Expr::unary(UnaryOp::Negate, Expr::constant(i64::MIN));
        assert!(matches!(eval(expr), Err(EvalError::TypeError(_))));
    }

    #[test]
    fn logical_operators_need_booleans() {
        let expr = Expr::unary(UnaryOp::Not, Expr::constant(-1));
        assert!(matches!(eval(expr), Err(EvalError::TypeError(_))));

        let expr = Expr::binary(BinaryOp::AndAlso, Expr::constant(true), Expr::constant(1));
        assert!(matches!(eval(expr), Err(EvalError::TypeError(_))));

        let expr = Expr::binary(BinaryOp::OrElse, Expr::constant(false), Expr::constant(true));
        assert_eq!(eval(expr), Ok(Value::Boolean(true)));
    }

    #[test]
    fn unbound_parameter_fails() {
        let expr = Expr::parameter("p", crate::types::TypeShape::Any);
        assert!(matches!(eval(expr), Err(EvalError::UnboundParameter(_))));
    }

    #[test]
    fn coalesce_skips_null() {
        let expr = Expr::binary(
            BinaryOp::Coalesce,
            Expr::Constant(Value::Null),
            Expr::constant("fallback"),
        );
        assert_eq!(eval(expr), Ok(Value::from("fallback")));
    }
}
