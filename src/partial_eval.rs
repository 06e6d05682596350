//! Folding of closed sub-trees into constants.
//!
//! Anything that does not depend on a lambda parameter, a document source
//! or the query surface itself is evaluated up front, so the translator
//! only ever sees constants where the caller captured host values.

use tracing::{debug, warn};

use crate::ast::{Expr, HostCall, Lambda, MemberAccess, Method, MethodCall};
use crate::evaluator::{EvalError, Evaluator};

/// A nominated sub-tree that could not be evaluated and was kept as is.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalFallback {
    pub expr: Expr,
    pub error: EvalError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartialEval {
    pub expr: Expr,
    pub fallbacks: Vec<EvalFallback>,
}

/// Folds every maximal locally evaluable sub-tree of `expr`.
///
/// # Examples
///
/// ```
/// use groq_expr::ast::{BinaryOp, Expr};
/// use groq_expr::partial_eval::partial_eval;
/// use groq_expr::Value;
///
/// let expr = Expr::binary(BinaryOp::Add, Expr::constant(2000), Expr::constant(20));
/// let folded = partial_eval(&expr);
/// assert_eq!(folded.expr, Expr::Constant(Value::Integer(2020)));
/// assert!(folded.fallbacks.is_empty());
/// ```
pub fn partial_eval(expr: &Expr) -> PartialEval {
    partial_eval_with(expr, |_| true)
}

/// Like [`partial_eval`], with an extra veto on which nodes may be folded.
pub fn partial_eval_with(expr: &Expr, can_evaluate_locally: impl Fn(&Expr) -> bool) -> PartialEval {
    let mut folder = Folder {
        evaluator: Evaluator::new(),
        can_evaluate_locally: &can_evaluate_locally,
        fallbacks: Vec::new(),
    };
    let (rewritten, evaluable) = folder.visit(expr);
    let expr = if evaluable {
        folder.fold(expr)
    } else {
        rewritten
    };
    PartialEval {
        expr,
        fallbacks: folder.fallbacks,
    }
}

/// Node kinds that must stay in the tree regardless of their children.
fn is_pinned(expr: &Expr) -> bool {
    match expr {
        Expr::Parameter(_) | Expr::Source(_) | Expr::Lambda(_) | Expr::New(_) => true,
        Expr::Call(call) => Method::from_name(&call.method).is_some(),
        _ => false,
    }
}

struct Folder<'a> {
    evaluator: Evaluator,
    can_evaluate_locally: &'a dyn Fn(&Expr) -> bool,
    fallbacks: Vec<EvalFallback>,
}

impl Folder<'_> {
    /// Returns the rewritten node and whether the original is evaluable.
    ///
    /// Evaluable nodes come back unchanged so that only the maximal
    /// evaluable sub-tree gets folded, by its non-evaluable parent.
    fn visit(&mut self, expr: &Expr) -> (Expr, bool) {
        let children = children(expr);
        let mut all_evaluable = true;
        let mut rewritten = Vec::with_capacity(children.len());
        for child in &children {
            let (child_expr, child_evaluable) = self.visit(child);
            all_evaluable &= child_evaluable;
            rewritten.push((child_expr, child_evaluable));
        }

        let evaluable = all_evaluable && !is_pinned(expr) && (self.can_evaluate_locally)(expr);
        if evaluable {
            return (expr.clone(), true);
        }

        let mut replacements = Vec::with_capacity(rewritten.len());
        for (original, (child_expr, child_evaluable)) in children.iter().zip(rewritten) {
            if child_evaluable {
                replacements.push(self.fold(original));
            } else {
                replacements.push(child_expr);
            }
        }
        (rebuild(expr, replacements), false)
    }

    fn fold(&mut self, expr: &Expr) -> Expr {
        if expr.is_constant() {
            return expr.clone();
        }
        match self.evaluator.evaluate(expr) {
            Ok(value) => {
                debug!(value_type = value.type_name(), "folded sub-expression");
                Expr::Constant(value)
            }
            Err(error) => {
                warn!(%error, "partial evaluation failed, keeping expression");
                self.fallbacks.push(EvalFallback {
                    expr: expr.clone(),
                    error,
                });
                expr.clone()
            }
        }
    }
}

fn children(expr: &Expr) -> Vec<&Expr> {
    match expr {
        Expr::Constant(_) | Expr::Source(_) | Expr::Parameter(_) => Vec::new(),
        Expr::Member(access) => vec![access.object.as_ref()],
        Expr::Unary { operand, .. } => vec![operand.as_ref()],
        Expr::Binary { left, right, .. } => vec![left.as_ref(), right.as_ref()],
        Expr::Call(call) => call
            .object
            .iter()
            .map(|object| object.as_ref())
            .chain(call.args.iter())
            .collect(),
        Expr::Invoke(host) => host.args.iter().collect(),
        Expr::Lambda(lambda) => vec![lambda.body.as_ref()],
        Expr::New(members) => members.iter().map(|(_, expr)| expr).collect(),
        Expr::NewArray(items) => items.iter().collect(),
    }
}

/// Rebuilds `expr` with replacement children, in `children` order.
fn rebuild(expr: &Expr, replacements: Vec<Expr>) -> Expr {
    let mut replacements = replacements.into_iter();
    let mut next = |fallback: &Expr| replacements.next().unwrap_or_else(|| fallback.clone());

    match expr {
        Expr::Constant(_) | Expr::Source(_) | Expr::Parameter(_) => expr.clone(),
        Expr::Member(access) => Expr::Member(MemberAccess {
            object: Box::new(next(&access.object)),
            member: access.member.clone(),
        }),
        Expr::Unary { op, operand } => Expr::unary(*op, next(operand)),
        Expr::Binary { op, left, right } => {
            let left = next(left);
            let right = next(right);
            Expr::binary(*op, left, right)
        }
        Expr::Call(call) => {
            let object = call.object.as_ref().map(|object| Box::new(next(object)));
            let args = call.args.iter().map(&mut next).collect();
            Expr::Call(MethodCall {
                method: call.method.clone(),
                object,
                args,
                type_arg: call.type_arg.clone(),
            })
        }
        Expr::Invoke(host) => Expr::Invoke(HostCall {
            name: host.name.clone(),
            function: host.function.clone(),
            args: host.args.iter().map(&mut next).collect(),
        }),
        Expr::Lambda(lambda) => Expr::Lambda(Lambda {
            params: lambda.params.clone(),
            body: Box::new(next(&lambda.body)),
        }),
        Expr::New(members) => Expr::New(
            members
                .iter()
                .map(|(name, expr)| (name.clone(), next(expr)))
                .collect(),
        ),
        Expr::NewArray(items) => Expr::NewArray(items.iter().map(&mut next).collect()),
    }
}
