//! Pretty-printing of GROQ query text.
//!
//! Projection blocks are broken over lines with two-space indentation;
//! filters, function arguments and string literals stay on one line.
//!
//! # Examples
//!
//! ```
//! use groq_expr::format::format_query;
//!
//! assert_eq!(
//!     format_query(r#"*[_type == "movie"]{title,year}"#),
//!     "*[_type == \"movie\"]{\n  title,\n  year\n}"
//! );
//! ```

const INDENT: &str = "  ";

/// Formats a query with the default indentation.
pub fn format_query(query: &str) -> String {
    QueryFormatter::new().format(query)
}

pub struct QueryFormatter {
    indent_unit: &'static str,
}

impl Default for QueryFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryFormatter {
    pub fn new() -> Self {
        QueryFormatter {
            indent_unit: INDENT,
        }
    }

    pub fn format(&self, query: &str) -> String {
        let chars: Vec<char> = query.chars().collect();
        let mut out = String::with_capacity(query.len() * 2);
        let mut level = 0usize;
        let mut group_depth = 0usize;
        let mut quote: Option<char> = None;
        let mut i = 0;

        while i < chars.len() {
            let ch = chars[i];

            if let Some(q) = quote {
                out.push(ch);
                if ch == '\\' {
                    if let Some(escaped) = chars.get(i + 1) {
                        out.push(*escaped);
                        i += 1;
                    }
                } else if ch == q {
                    quote = None;
                }
                i += 1;
                continue;
            }

            match ch {
                '"' | '\'' => {
                    quote = Some(ch);
                    out.push(ch);
                }
                '[' | '(' => {
                    group_depth += 1;
                    out.push(ch);
                }
                ']' | ')' => {
                    group_depth = group_depth.saturating_sub(1);
                    out.push(ch);
                }
                '{' if group_depth == 0 => {
                    if let Some(end) = lone_spread_end(&chars, i) {
                        out.push_str("{ ... }");
                        i = end + 1;
                        continue;
                    }
                    trim_trailing(&mut out);
                    out.push('{');
                    level += 1;
                    self.newline(&mut out, level);
                }
                '}' if group_depth == 0 => {
                    trim_trailing(&mut out);
                    level = level.saturating_sub(1);
                    self.newline(&mut out, level);
                    out.push('}');
                }
                ',' if group_depth == 0 && level > 0 => {
                    trim_trailing(&mut out);
                    out.push(',');
                    self.newline(&mut out, level);
                    if chars.get(i + 1).is_some_and(|next| next.is_whitespace()) {
                        i += 1;
                    }
                }
                c if c.is_whitespace() => {
                    if !out.is_empty() && !out.ends_with(char::is_whitespace) {
                        out.push(' ');
                    }
                }
                c => out.push(c),
            }
            i += 1;
        }

        out.trim().to_string()
    }

    fn newline(&self, out: &mut String, level: usize) {
        out.push('\n');
        for _ in 0..level {
            out.push_str(self.indent_unit);
        }
    }
}

fn trim_trailing(out: &mut String) {
    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
}

/// Index of the `}` closing a `{ ... }` block that holds only the spread.
fn lone_spread_end(chars: &[char], open: usize) -> Option<usize> {
    let mut i = open + 1;
    while chars.get(i).is_some_and(|c| c.is_whitespace()) {
        i += 1;
    }
    if chars.get(i..i + 3)? != ['.', '.', '.'].as_slice() {
        return None;
    }
    i += 3;
    while chars.get(i).is_some_and(|c| c.is_whitespace()) {
        i += 1;
    }
    (chars.get(i) == Some(&'}')).then_some(i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lone_spread_stays_inline() {
        assert_eq!(format_query("*{...}"), "*{ ... }");
    }

    #[test]
    fn nested_blocks_indent() {
        assert_eq!(
            format_query("*{...,author->{name,bio}}"),
            "*{\n  ...,\n  author->{\n    name,\n    bio\n  }\n}"
        );
    }

    #[test]
    fn commas_in_groups_and_strings_stay_put() {
        assert_eq!(
            format_query(r#"*[tags in ["a,b", "c"]]{title}"#),
            "*[tags in [\"a,b\", \"c\"]]{\n  title\n}"
        );
    }

    #[test]
    fn whitespace_runs_collapse() {
        assert_eq!(format_query("*[a  ==   1]"), "*[a == 1]");
    }
}
