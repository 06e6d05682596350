//! Query state accumulated during translation, and its final assembly.

use tracing::{debug, warn};

use crate::config::QueryOptions;
use crate::includes::expand_includes;
use crate::partial_eval::EvalFallback;
use crate::projection::{SPREAD, property_projection_list};
use crate::types::{TypeHandle, TypeShape};

/// Largest slice end GROQ accepts for an open-ended range.
pub const MAX_SLICE_END: usize = 2_147_483_647;

/// Recovered problems met while building one query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    /// Sub-trees that failed to fold and were translated as written
    pub partial_eval_fallbacks: Vec<EvalFallback>,
    /// Include expansions that were skipped, with the reason
    pub include_expansion_failures: Vec<String>,
}

impl Diagnostics {
    pub fn is_clean(&self) -> bool {
        self.partial_eval_fallbacks.is_empty() && self.include_expansion_failures.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct QueryBuilder {
    pub(crate) constraints: Vec<String>,
    /// Filters applied after the projection
    pub(crate) post_filters: Vec<String>,
    pub(crate) projection: String,
    /// Projection is a member path rendered as `.path`
    pub(crate) flatten_projection: bool,
    pub(crate) orderings: Vec<String>,
    pub(crate) skip: usize,
    pub(crate) take: Option<usize>,
    pub(crate) aggregate_function: String,
    pub(crate) aggregate_postfix: String,
    /// Include path to projection fragment, in registration order
    pub(crate) includes: Vec<(String, String)>,
    pub(crate) doc_type: Option<TypeHandle>,
    pub(crate) result_type: Option<TypeShape>,
    pub(crate) expects_array: bool,
    pub(crate) use_coalesce_fallback: bool,
    pub(crate) max_nesting_level: usize,
    pub(crate) diagnostics: Diagnostics,
}

impl QueryBuilder {
    pub fn new(doc_type: Option<TypeHandle>, options: &QueryOptions) -> Self {
        QueryBuilder {
            constraints: Vec::new(),
            post_filters: Vec::new(),
            projection: String::new(),
            flatten_projection: false,
            orderings: Vec::new(),
            skip: 0,
            take: None,
            aggregate_function: String::new(),
            aggregate_postfix: String::new(),
            includes: Vec::new(),
            doc_type,
            result_type: None,
            expects_array: true,
            use_coalesce_fallback: options.use_coalesce_fallback,
            max_nesting_level: options.max_nesting_level,
            diagnostics: Diagnostics::default(),
        }
    }

    /// Adds a filter, after the projection when one is already set.
    pub fn add_filter(&mut self, filter: String) {
        if self.projection.is_empty() {
            self.constraints.push(filter);
        } else {
            self.post_filters.push(filter);
        }
    }

    pub fn add_include(&mut self, path: String, fragment: String) {
        match self.includes.iter_mut().find(|(key, _)| *key == path) {
            Some(entry) => entry.1 = fragment,
            None => self.includes.push((path, fragment)),
        }
    }

    pub fn has_include(&self, path: &str) -> bool {
        self.includes.iter().any(|(key, _)| key == path)
    }

    pub fn has_aggregate(&self) -> bool {
        !self.aggregate_function.is_empty() || !self.aggregate_postfix.is_empty()
    }

    pub fn expects_array(&self) -> bool {
        self.expects_array
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    fn type_constraint(&self) -> Option<String> {
        let handle = self.doc_type?;
        if handle.descriptor().is_base() {
            return None;
        }
        Some(format!("_type == \"{}\"", handle.wire_type_name()))
    }

    /// Assembles the query text.
    ///
    /// The type constraint always leads in its own filter, followed by the
    /// remaining constraints joined with `&&`.
    pub fn build(&mut self, include_projections: bool) -> String {
        let mut query = String::from("*");

        let type_constraint = self.type_constraint();
        if let Some(constraint) = &type_constraint {
            query.push_str(&format!("[{}]", constraint));
        }

        let mut constraints: Vec<&str> = Vec::new();
        for constraint in &self.constraints {
            if Some(constraint) != type_constraint.as_ref()
                && !constraints.contains(&constraint.as_str())
            {
                constraints.push(constraint);
            }
        }
        if !constraints.is_empty() {
            query.push_str(&format!("[{}]", join_constraints(&constraints)));
        }

        if include_projections {
            let projection = self.resolve_projection();
            if !projection.is_empty() {
                if self.flatten_projection {
                    query.push('.');
                }
                query.push_str(&projection);
            }
        }

        for filter in &self.post_filters {
            query.push_str(&format!("[{}]", filter));
        }

        if !self.orderings.is_empty() {
            query.push_str(&format!(" | order({})", self.orderings.join(", ")));
        }

        match self.take {
            // An exhausted limit still selects nothing.
            Some(0) => query.push_str(&format!("[{}...{}]", self.skip, self.skip)),
            Some(1) => query.push_str(&format!("[{}]", self.skip)),
            Some(take) => {
                query.push_str(&format!("[{}..{}]", self.skip, self.skip + take - 1))
            }
            None if self.skip > 0 => {
                query.push_str(&format!("[{}..{}]", self.skip, MAX_SLICE_END))
            }
            None => {}
        }

        if !self.aggregate_function.is_empty() {
            query = format!("{}({})", self.aggregate_function, query);
        }
        query.push_str(&self.aggregate_postfix);

        debug!(query = %query, "assembled query");
        query
    }

    fn resolve_projection(&mut self) -> String {
        if self.flatten_projection {
            return self.flattened_projection();
        }

        let projection = if !self.projection.is_empty() {
            self.projection.clone()
        } else if self.has_aggregate() {
            return String::new();
        } else {
            let handle = self
                .result_type
                .as_ref()
                .and_then(|shape| shape.element().unwrap_or(shape).handle())
                .or(self.doc_type);
            match handle {
                Some(handle) => format!(
                    "{{{}}}",
                    property_projection_list(handle, 0, self.max_nesting_level).join(",")
                ),
                None => format!("{{{}}}", SPREAD),
            }
        };

        let projection = if self.includes.is_empty() {
            projection
        } else {
            match expand_includes(&projection, &self.includes) {
                Ok(expanded) => expanded,
                Err(error) => {
                    warn!(%error, "include expansion failed, keeping projection");
                    self.diagnostics
                        .include_expansion_failures
                        .push(error.to_string());
                    projection
                }
            }
        };

        let trimmed = projection.trim();
        if trimmed.is_empty() || trimmed == "{...}" || trimmed == "{}" || trimmed == SPREAD {
            return String::new();
        }
        if trimmed.starts_with('{') {
            trimmed.to_string()
        } else {
            format!("{{{}}}", trimmed)
        }
    }

    /// A selected member path, followed by the member type's own
    /// projection when it is a nested object.
    fn flattened_projection(&self) -> String {
        let path = self.projection.clone();
        let element = self
            .result_type
            .as_ref()
            .map(|shape| shape.element().unwrap_or(shape).unwrap_optional().clone());
        let Some(handle) = element.as_ref().and_then(TypeShape::handle) else {
            return path;
        };
        if element.as_ref().is_some_and(TypeShape::is_reference) {
            return path;
        }
        let fields = property_projection_list(handle, 0, self.max_nesting_level);
        if fields.len() <= 1 {
            return path;
        }
        format!("{}{{{}}}", path, fields.join(","))
    }
}

/// Joins constraints with `&&`, grouping any that contain a top-level `||`.
fn join_constraints(constraints: &[&str]) -> String {
    if constraints.len() == 1 {
        return constraints[0].to_string();
    }
    constraints
        .iter()
        .map(|constraint| {
            if has_top_level_or(constraint) {
                format!("({})", constraint)
            } else {
                constraint.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" && ")
}

fn has_top_level_or(text: &str) -> bool {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut previous = '\0';
    for ch in text.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            previous = ch;
            continue;
        }
        match ch {
            '"' | '\'' => quote = Some(ch),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            '|' if previous == '|' && depth == 0 => return true,
            _ => {}
        }
        previous = ch;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> QueryBuilder {
        QueryBuilder::new(None, &QueryOptions::default())
    }

    #[test]
    fn slices_follow_skip_and_take() {
        let mut b = builder();
        b.skip = 5;
        assert_eq!(b.build(false), "*[5..2147483647]");

        let mut b = builder();
        b.take = Some(1);
        assert_eq!(b.build(false), "*[0]");

        let mut b = builder();
        b.skip = 2;
        b.take = Some(3);
        assert_eq!(b.build(false), "*[2..4]");

        let mut b = builder();
        b.skip = 7;
        b.take = Some(0);
        assert_eq!(b.build(false), "*[7...7]");
    }

    #[test]
    fn duplicate_constraints_collapse() {
        let mut b = builder();
        b.add_filter("a == 1".to_string());
        b.add_filter("a == 1".to_string());
        b.add_filter("b == 2".to_string());
        assert_eq!(b.build(false), "*[a == 1 && b == 2]");
    }

    #[test]
    fn or_constraints_are_grouped_when_joined() {
        let mut b = builder();
        b.add_filter("a == 1 || b == 2".to_string());
        b.add_filter("c == \"||\"".to_string());
        assert_eq!(b.build(false), "*[(a == 1 || b == 2) && c == \"||\"]");
    }

    #[test]
    fn aggregate_wraps_whole_query() {
        let mut b = builder();
        b.aggregate_function = "count".to_string();
        b.aggregate_postfix = " > 0".to_string();
        assert_eq!(b.build(true), "count(*) > 0");
    }

    #[test]
    fn filters_after_projection_become_post_filters() {
        let mut b = builder();
        b.projection = "{title}".to_string();
        b.add_filter("title != null".to_string());
        assert_eq!(b.build(true), "*{title}[title != null]");
    }
}
