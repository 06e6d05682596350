use chrono::{NaiveTime, Timelike};
use heck::ToLowerCamelCase;

use super::{TranslateMode, Translator};
use crate::ast::Expr;
use crate::error::{QueryError, Result};
use crate::value::Value;

/// Renders a constant as a GROQ literal.
///
/// Date-times at midnight render as plain dates.
///
/// # Examples
///
/// ```
/// use groq_expr::translate::render_constant;
/// use groq_expr::Value;
///
/// assert_eq!(render_constant(&Value::from("say \"hi\"")).unwrap(), r#""say \"hi\"""#);
/// assert_eq!(render_constant(&Value::from(true)).unwrap(), "true");
/// assert_eq!(render_constant(&Value::Null).unwrap(), "null");
/// ```
pub fn render_constant(value: &Value) -> Result<String> {
    let text = match value {
        Value::Null => "null".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Integer(n) => n.to_string(),
        Value::Float(f) if f.is_finite() => f.to_string(),
        Value::Float(f) => {
            return Err(QueryError::UnsupportedExpression(format!(
                "{} has no GROQ literal",
                f
            )));
        }
        Value::Decimal(d) => d.normalize().to_string(),
        Value::String(s) => quote(s),
        Value::DateTime(dt) => {
            if dt.time() == NaiveTime::MIN {
                quote(&dt.format("%Y-%m-%d").to_string())
            } else {
                // Seven fractional digits, as round-trip date-time strings carry.
                let ticks = dt.nanosecond() % 1_000_000_000 / 100;
                quote(&format!(
                    "{}.{:07}{}",
                    dt.format("%Y-%m-%dT%H:%M:%S"),
                    ticks,
                    dt.format("%:z")
                ))
            }
        }
        Value::Date(date) => quote(&date.format("%Y-%m-%d").to_string()),
        Value::Guid(id) => quote(&id.hyphenated().to_string()),
        Value::Array(items) => {
            let rendered = items
                .iter()
                .map(render_constant)
                .collect::<Result<Vec<_>>>()?;
            format!("[{}]", rendered.join(", "))
        }
        Value::Object(_) => {
            return Err(QueryError::UnsupportedExpression(
                "object constants have no GROQ literal".to_string(),
            ));
        }
    };
    Ok(text)
}

fn quote(text: &str) -> String {
    let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

impl Translator<'_> {
    pub(crate) fn transform_operand(&mut self, expr: &Expr) -> Result<String> {
        match expr {
            Expr::Constant(value) => render_constant(value),
            Expr::Parameter(_) => Ok("@".to_string()),
            Expr::Member(access) => self.transform_member(access),
            Expr::Unary { op, operand } => self.translate_unary(*op, operand),
            Expr::Binary { op, left, right } => self.translate_binary(*op, left, right),
            Expr::Call(call) => self.translate_call(call, TranslateMode::Render),
            Expr::Lambda(lambda) => self.transform_operand(&lambda.body),
            Expr::New(members) => self.transform_new(members),
            Expr::NewArray(items) => {
                let rendered = items
                    .iter()
                    .map(|item| self.transform_operand(item))
                    .collect::<Result<Vec<_>>>()?;
                Ok(format!("[{}]", rendered.join(", ")))
            }
            Expr::Source(_) => Err(QueryError::UnsupportedExpression(
                "document source outside the query chain".to_string(),
            )),
            Expr::Invoke(host) => Err(QueryError::UnsupportedExpression(format!(
                "host call {} depends on a query parameter",
                host.name
            ))),
        }
    }

    /// Object construction; members whose value already reads the
    /// same-named field stay bare.
    pub(crate) fn transform_new(&mut self, members: &[(String, Expr)]) -> Result<String> {
        let mut entries = Vec::with_capacity(members.len());
        for (name, value) in members {
            let text = self.transform_operand(value)?;
            let name = name.to_lower_camel_case();
            if text == name {
                entries.push(text);
            } else {
                entries.push(format!("\"{}\": {}", name, text));
            }
        }
        Ok(entries.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDate};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn midnight_renders_as_date() {
        let dt = DateTime::parse_from_rfc3339("2024-03-01T00:00:00+00:00").unwrap();
        assert_eq!(render_constant(&Value::DateTime(dt)).unwrap(), "\"2024-03-01\"");
    }

    #[test]
    fn date_time_keeps_offset_and_fraction() {
        let dt = DateTime::parse_from_rfc3339("2024-03-01T10:30:00.5+02:00").unwrap();
        assert_eq!(
            render_constant(&Value::DateTime(dt)).unwrap(),
            "\"2024-03-01T10:30:00.5000000+02:00\""
        );
    }

    #[test]
    fn dates_and_decimals() {
        let date = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        assert_eq!(render_constant(&Value::Date(date)).unwrap(), "\"2023-12-31\"");
        let decimal = Decimal::from_str("12.500").unwrap();
        assert_eq!(render_constant(&Value::Decimal(decimal)).unwrap(), "12.5");
    }

    #[test]
    fn arrays_render_elementwise() {
        let value = Value::from(vec!["a", "b"]);
        assert_eq!(render_constant(&value).unwrap(), r#"["a", "b"]"#);
    }

    #[test]
    fn non_finite_floats_are_rejected() {
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                render_constant(&Value::Float(value)),
                Err(QueryError::UnsupportedExpression(_))
            ));
        }
        assert_eq!(render_constant(&Value::Float(1.5)).unwrap(), "1.5");
    }

    #[test]
    fn backslashes_are_escaped() {
        assert_eq!(render_constant(&Value::from("a\\b")).unwrap(), r#""a\\b""#);
    }
}
