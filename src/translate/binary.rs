use super::Translator;
use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::Result;
use crate::value::Value;

fn is_null(expr: &Expr) -> bool {
    matches!(expr, Expr::Constant(Value::Null))
}

impl Translator<'_> {
    pub(crate) fn translate_binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
    ) -> Result<String> {
        if matches!(op, BinaryOp::Equal | BinaryOp::NotEqual) && is_null(left) != is_null(right) {
            let subject = if is_null(right) { left } else { right };
            let text = self.transform_operand(subject)?;
            // A missing field counts as null.
            return Ok(match op {
                BinaryOp::Equal => format!("(!(defined({0})) || {0} == null)", text),
                _ => format!("(defined({0}) && {0} != null)", text),
            });
        }

        if op == BinaryOp::Coalesce {
            let left = self.transform_operand(left)?;
            let right = self.transform_operand(right)?;
            return Ok(format!("coalesce({}, {})", left, right));
        }

        let left_text = self.binary_side(op, left, false)?;
        let right_text = self.binary_side(op, right, true)?;
        Ok(format!("{} {} {}", left_text, op.symbol(), right_text))
    }

    /// Renders an operand, parenthesized when it binds looser than `op`.
    fn binary_side(&mut self, op: BinaryOp, side: &Expr, is_right: bool) -> Result<String> {
        let text = self.transform_operand(side)?;
        let needs_parens = match side {
            Expr::Binary { op: inner, left, right } => {
                let rendered_as_call = *inner == BinaryOp::Coalesce
                    || (matches!(inner, BinaryOp::Equal | BinaryOp::NotEqual)
                        && is_null(left) != is_null(right));
                !rendered_as_call
                    && (inner.precedence() < op.precedence()
                        || (is_right && inner.precedence() == op.precedence() && !op.is_logical()))
            }
            _ => false,
        };
        Ok(if needs_parens {
            format!("({})", text)
        } else {
            text
        })
    }

    pub(crate) fn translate_unary(&mut self, op: UnaryOp, operand: &Expr) -> Result<String> {
        let text = self.transform_operand(operand)?;
        Ok(match op {
            UnaryOp::Not => format!("!({})", text),
            UnaryOp::Negate if matches!(operand, Expr::Binary { .. }) => format!("-({})", text),
            UnaryOp::Negate => format!("-{}", text),
            UnaryOp::Convert => text,
        })
    }
}
