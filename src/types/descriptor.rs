use heck::ToLowerCamelCase;

use super::shape::TypeShape;

/// Static description of a document or value type.
///
/// Implemented once per type; the registry calls it at most once per
/// process and caches the result.
///
/// ```
/// use groq_expr::types::{Describe, TypeDescriptor, TypeShape};
///
/// struct Person;
///
/// impl Describe for Person {
///     fn describe() -> TypeDescriptor {
///         TypeDescriptor::document("Person")
///             .field("name", TypeShape::string())
///             .field("age", TypeShape::integer())
///     }
/// }
/// ```
pub trait Describe: 'static {
    fn describe() -> TypeDescriptor;
}

/// Marks a member for automatic dereferencing in projections.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IncludeMarker {
    /// Field to read from when it differs from the member's wire name.
    pub source_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberDescriptor {
    pub name: String,
    wire_name: Option<String>,
    pub shape: TypeShape,
    pub include: Option<IncludeMarker>,
    pub ignored: bool,
    pub settable: bool,
}

impl MemberDescriptor {
    pub fn new(name: impl Into<String>, shape: TypeShape) -> Self {
        MemberDescriptor {
            name: name.into(),
            wire_name: None,
            shape,
            include: None,
            ignored: false,
            settable: true,
        }
    }

    /// Overrides the serialized field name.
    pub fn wire_name_override(mut self, wire_name: impl Into<String>) -> Self {
        self.wire_name = Some(wire_name.into());
        self
    }

    pub fn include(mut self) -> Self {
        self.include = Some(IncludeMarker::default());
        self
    }

    /// Includes the member, reading it from another source field.
    pub fn include_from(mut self, source_name: impl Into<String>) -> Self {
        self.include = Some(IncludeMarker {
            source_name: Some(source_name.into()),
        });
        self
    }

    pub fn ignored(mut self) -> Self {
        self.ignored = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.settable = false;
        self
    }

    /// Explicit override, else the lower-camel-case member name.
    pub fn wire_name(&self) -> String {
        match &self.wire_name {
            Some(name) => name.clone(),
            None => self.name.to_lower_camel_case(),
        }
    }

    pub fn is_included(&self) -> bool {
        self.include.is_some()
    }

    pub fn matches(&self, name: &str) -> bool {
        self.name == name || self.wire_name() == name
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    name: String,
    wire_type: Option<String>,
    base: bool,
    members: Vec<MemberDescriptor>,
}

impl TypeDescriptor {
    /// A plain value type (objects embedded in documents).
    pub fn new(name: impl Into<String>) -> Self {
        TypeDescriptor {
            name: name.into(),
            wire_type: None,
            base: false,
            members: Vec::new(),
        }
    }

    /// A document type with the system fields every stored document has.
    pub fn document(name: impl Into<String>) -> Self {
        TypeDescriptor::new(name)
            .member(MemberDescriptor::new("id", TypeShape::string()).wire_name_override("_id"))
            .member(MemberDescriptor::new("type", TypeShape::string()).wire_name_override("_type"))
            .member(
                MemberDescriptor::new("revision", TypeShape::string()).wire_name_override("_rev"),
            )
            .member(
                MemberDescriptor::new("created_at", TypeShape::datetime())
                    .wire_name_override("_createdAt"),
            )
            .member(
                MemberDescriptor::new("updated_at", TypeShape::datetime())
                    .wire_name_override("_updatedAt"),
            )
    }

    /// The `_type` value carried by instances of this type.
    pub fn wire_type(mut self, wire_type: impl Into<String>) -> Self {
        self.wire_type = Some(wire_type.into());
        self
    }

    /// Base types never add a `_type` constraint.
    pub fn base(mut self) -> Self {
        self.base = true;
        self
    }

    pub fn member(mut self, member: MemberDescriptor) -> Self {
        self.members.push(member);
        self
    }

    pub fn field(self, name: impl Into<String>, shape: TypeShape) -> Self {
        self.member(MemberDescriptor::new(name, shape))
    }

    /// Shorthand for a member flagged for automatic dereferencing.
    pub fn included(self, name: impl Into<String>, shape: TypeShape) -> Self {
        self.member(MemberDescriptor::new(name, shape).include())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_base(&self) -> bool {
        self.base
    }

    pub fn members(&self) -> &[MemberDescriptor] {
        &self.members
    }

    /// Members that take part in projections.
    pub fn projected_members(&self) -> impl Iterator<Item = &MemberDescriptor> {
        self.members
            .iter()
            .filter(|member| member.settable && !member.ignored)
    }

    pub fn find_member(&self, name: &str) -> Option<&MemberDescriptor> {
        self.members.iter().find(|member| member.matches(name))
    }

    pub(crate) fn declared_wire_type(&self) -> Option<&str> {
        self.wire_type.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_name_defaults_to_lower_camel_case() {
        let member = MemberDescriptor::new("main_image", TypeShape::Any);
        assert_eq!(member.wire_name(), "mainImage");

        let member = MemberDescriptor::new("Title", TypeShape::string());
        assert_eq!(member.wire_name(), "title");
    }

    #[test]
    fn wire_name_override_wins() {
        let member =
            MemberDescriptor::new("id", TypeShape::string()).wire_name_override("_id");
        assert_eq!(member.wire_name(), "_id");
        assert!(member.matches("id"));
        assert!(member.matches("_id"));
    }

    #[test]
    fn ignored_and_read_only_members_are_not_projected() {
        let descriptor = TypeDescriptor::new("Thing")
            .field("a", TypeShape::string())
            .member(MemberDescriptor::new("b", TypeShape::string()).ignored())
            .member(MemberDescriptor::new("c", TypeShape::string()).read_only());
        let names: Vec<_> = descriptor.projected_members().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["a"]);
    }
}
