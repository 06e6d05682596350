use super::{Translator, join_path};
use crate::ast::{Expr, MemberAccess, MemberRole};
use crate::error::Result;
use crate::projection::DEREFERENCING_OPERATOR;

const DOCUMENT_ID: &str = "_id";

impl Translator<'_> {
    pub(crate) fn transform_member(&mut self, access: &MemberAccess) -> Result<String> {
        let member = &access.member;
        match member.role {
            MemberRole::NullableValue => self.member_parent(&access.object),
            MemberRole::ReferenceValue => {
                let parent = self.member_parent(&access.object)?;
                if parent.is_empty() {
                    Ok(format!("@{}", DEREFERENCING_OPERATOR))
                } else {
                    Ok(join_path(&parent, DEREFERENCING_OPERATOR))
                }
            }
            MemberRole::Count => {
                let path = self.transform_operand(&access.object)?;
                if access.object.shape().is_string() {
                    Ok(format!("length({})", path))
                } else {
                    Ok(format!("count({})", path))
                }
            }
            MemberRole::Field => {
                if let Some(reference) = dereferenced_parent(&access.object) {
                    let reference = match self.member_parent(reference)? {
                        path if path.is_empty() => "@".to_string(),
                        path => path,
                    };
                    if member.wire_name == DOCUMENT_ID {
                        return Ok(format!("coalesce({0}._ref, {0}._key)", reference));
                    }
                    if self.builder.use_coalesce_fallback {
                        return Ok(format!(
                            "coalesce({0}->{1}, {0}.{1})",
                            reference, member.wire_name
                        ));
                    }
                }
                let parent = self.member_parent(&access.object)?;
                Ok(join_path(&parent, &member.wire_name))
            }
        }
    }

    /// Path of the object a member is read from; the lambda parameter
    /// itself contributes nothing.
    pub(crate) fn member_parent(&mut self, object: &Expr) -> Result<String> {
        match object {
            Expr::Parameter(_) => Ok(String::new()),
            other => self.transform_operand(other),
        }
    }
}

/// The reference whose `.value` `object` reads, if it does.
fn dereferenced_parent(object: &Expr) -> Option<&Expr> {
    match object {
        Expr::Member(parent) if parent.member.role == MemberRole::ReferenceValue => {
            Some(parent.object.as_ref())
        }
        _ => None,
    }
}
