//! Automatic projections derived from type descriptors.
//!
//! A projection for a type lists `...` followed by one entry per member
//! that the spread alone would not render correctly: nested objects,
//! collections of objects, image-like asset wrappers, and members flagged
//! for inclusion. References are only dereferenced when included.

use std::sync::Arc;

use tracing::trace;

use crate::types::{ASSET_MEMBER, TypeHandle, TypeShape, registry};

pub const SPREAD: &str = "...";
pub const DEREFERENCING_OPERATOR: &str = "->";
/// Expands a value in place when it is a reference, keeps it otherwise.
pub const DEREFERENCING_SWITCH: &str = "_type=='reference'=>@->";
pub const ARRAY_INDICATOR: &str = "[]";
/// Drops null slots from an array.
pub const ARRAY_FILTER: &str = "[defined(@)]";

/// Projection entry for one member.
///
/// `source_name` is the stored field, `target_name` the name the result
/// should carry; they differ when a member reads from another field.
///
/// # Examples
///
/// ```
/// use groq_expr::projection::join_projection;
/// use groq_expr::types::TypeShape;
///
/// assert_eq!(join_projection("title", "title", &TypeShape::string(), 0, 3, false), "title");
/// assert_eq!(
///     join_projection("heading", "title", &TypeShape::string(), 0, 3, false),
///     r#""title": heading"#
/// );
/// ```
pub fn join_projection(
    source_name: &str,
    target_name: &str,
    shape: &TypeShape,
    nesting_level: usize,
    max_nesting_level: usize,
    is_explicit: bool,
) -> String {
    join_projection_narrowed(
        source_name,
        target_name,
        shape,
        nesting_level,
        max_nesting_level,
        is_explicit,
        None,
    )
}

/// [`join_projection`] with the fields wrapped in a `_type` condition.
pub fn join_projection_narrowed(
    source_name: &str,
    target_name: &str,
    shape: &TypeShape,
    nesting_level: usize,
    max_nesting_level: usize,
    is_explicit: bool,
    narrow_to: Option<&str>,
) -> String {
    let join = Join {
        source_name,
        target_name,
        nesting_level,
        max_nesting_level,
        narrow_to,
    };
    let shape = shape.unwrap_optional();

    if shape.is_simple() {
        return join.field_ref("");
    }
    if let Some(target) = shape.referenced() {
        return join.dereferenced("", target);
    }
    if shape.is_asset_shaped() {
        return join.asset("", shape);
    }
    if let Some(element) = shape.element() {
        let element = element.unwrap_optional();
        if let Some(target) = element.referenced() {
            return join.dereferenced(ARRAY_FILTER, target);
        }
        if element.is_asset_shaped() {
            return join.asset(ARRAY_FILTER, element);
        }
        if let Some(handle) = element.handle() {
            return join.object(ARRAY_FILTER, handle);
        }
        if is_explicit && matches!(element, TypeShape::Any) {
            return join.dereferenced(ARRAY_FILTER, &TypeShape::Any);
        }
        return join.field_ref("");
    }
    if let Some(handle) = shape.handle() {
        return join.object("", handle);
    }
    if is_explicit && matches!(shape, TypeShape::Any) {
        return join.dereferenced("", &TypeShape::Any);
    }
    join.field_ref("")
}

struct Join<'a> {
    source_name: &'a str,
    target_name: &'a str,
    nesting_level: usize,
    max_nesting_level: usize,
    narrow_to: Option<&'a str>,
}

impl Join<'_> {
    fn field_ref(&self, suffix: &str) -> String {
        let source = if suffix.is_empty() || self.source_name.ends_with(suffix) {
            self.source_name.to_string()
        } else {
            format!("{}{}", self.source_name, suffix)
        };
        if self.source_name == self.target_name {
            source
        } else {
            format!("\"{}\": {}", self.target_name, source)
        }
    }

    fn fields_of(&self, shape: &TypeShape) -> Vec<String> {
        match shape.handle() {
            Some(handle) => {
                property_projection_list(handle, self.nesting_level, self.max_nesting_level)
                    .as_ref()
                    .clone()
            }
            None => vec![SPREAD.to_string()],
        }
    }

    fn block(&self, fields: &[String]) -> String {
        match self.narrow_to {
            Some(wire_type) => format!(
                "{{{},(_type == \"{}\")=>{{{}}}}}",
                SPREAD,
                wire_type,
                fields.join(",")
            ),
            None => format!("{{{}}}", fields.join(",")),
        }
    }

    fn dereferenced(&self, suffix: &str, target: &TypeShape) -> String {
        let fields = self.fields_of(target);
        format!(
            "{}{{{},{}{}}}",
            self.field_ref(suffix),
            SPREAD,
            DEREFERENCING_SWITCH,
            self.block(&fields)
        )
    }

    fn object(&self, suffix: &str, handle: TypeHandle) -> String {
        let fields = self.fields_of(&TypeShape::Object(handle));
        format!("{}{}", self.field_ref(suffix), self.block(&fields))
    }

    /// Containers whose `asset` member always gets dereferenced.
    fn asset(&self, suffix: &str, shape: &TypeShape) -> String {
        let mut fields: Vec<String> = self
            .fields_of(shape)
            .into_iter()
            .filter(|entry| entry_key(entry) != ASSET_MEMBER)
            .collect();

        let asset_target = shape.handle().and_then(|handle| {
            handle
                .descriptor()
                .members()
                .iter()
                .find(|member| member.wire_name() == ASSET_MEMBER)
                .and_then(|member| member.shape.referenced().cloned())
        });
        let asset_fields = match asset_target.as_ref().and_then(TypeShape::handle) {
            Some(handle) if self.nesting_level < self.max_nesting_level => {
                property_projection_list(handle, self.nesting_level + 1, self.max_nesting_level)
                    .join(",")
            }
            _ => SPREAD.to_string(),
        };
        fields.push(format!(
            "{}{}{{{}}}",
            ASSET_MEMBER, DEREFERENCING_OPERATOR, asset_fields
        ));
        format!("{}{}", self.field_ref(suffix), self.block(&fields))
    }
}

/// Leading field name of a projection entry.
fn entry_key(entry: &str) -> &str {
    let end = entry
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(entry.len());
    &entry[..end]
}

/// Whether a member needs an entry of its own without being included.
fn needs_join(shape: &TypeShape) -> bool {
    let shape = shape.unwrap_optional();
    if shape.is_reference() || shape.is_reference_collection() {
        return false;
    }
    match shape {
        TypeShape::Object(_) => true,
        TypeShape::Array(element) => element.unwrap_optional().handle().is_some(),
        _ => false,
    }
}

/// Projection entries for `handle` at the given depth, memoized per
/// `(type, nesting level, max nesting level)`.
///
/// At the maximum depth only the spread is left.
pub fn property_projection_list(
    handle: TypeHandle,
    nesting_level: usize,
    max_nesting_level: usize,
) -> Arc<Vec<String>> {
    let key = (handle.id(), nesting_level, max_nesting_level);
    if let Some(cached) = registry::cached_projection(&key) {
        return cached;
    }

    let mut fields = vec![SPREAD.to_string()];
    if nesting_level < max_nesting_level {
        let descriptor = handle.descriptor();
        for member in descriptor.projected_members() {
            if matches!(member.shape.unwrap_optional(), TypeShape::Json) {
                continue;
            }
            let wire_name = member.wire_name();
            if let Some(include) = &member.include {
                let source = include.source_name.as_deref().unwrap_or(&wire_name);
                fields.push(join_projection(
                    source,
                    &wire_name,
                    &member.shape,
                    nesting_level + 1,
                    max_nesting_level,
                    true,
                ));
            } else if needs_join(&member.shape) {
                fields.push(join_projection(
                    &wire_name,
                    &wire_name,
                    &member.shape,
                    nesting_level + 1,
                    max_nesting_level,
                    false,
                ));
            }
        }
    }

    trace!(
        type_name = handle.name(),
        nesting_level,
        entries = fields.len(),
        "computed projection list"
    );
    registry::store_projection(key, fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_key_stops_at_syntax() {
        assert_eq!(entry_key("asset->{...}"), "asset");
        assert_eq!(entry_key("items[defined(@)]{...}"), "items");
        assert_eq!(entry_key("title"), "title");
    }

    #[test]
    fn array_filter_is_not_duplicated() {
        let join = Join {
            source_name: "items[defined(@)]",
            target_name: "items[defined(@)]",
            nesting_level: 0,
            max_nesting_level: 1,
            narrow_to: None,
        };
        assert_eq!(join.field_ref(ARRAY_FILTER), "items[defined(@)]");
    }

    #[test]
    fn narrowed_block_wraps_fields_in_condition() {
        let join = Join {
            source_name: "a",
            target_name: "a",
            nesting_level: 0,
            max_nesting_level: 1,
            narrow_to: Some("video"),
        };
        assert_eq!(
            join.block(&["...".to_string(), "b".to_string()]),
            r#"{...,(_type == "video")=>{...,b}}"#
        );
    }
}
