//! The field-merge rule shared by object types and interfaces (§4.1, "Fields"), plus the
//! argument-definition-list merge it and directive definitions both depend on.

use apollo_compiler::Node;
use apollo_compiler::ast::FieldDefinition;
use apollo_compiler::ast::InputValueDefinition;
use indexmap::IndexMap;

use crate::merge::values::directives_eq;
use crate::merge::values::merge_description;
use crate::merge::values::optional_value_eq;
use crate::merge::values::type_eq;

/// Merge two occurrences of the same field name on the same type. `None` means not mergeable; the
/// caller attaches the type/field/location context to the error.
pub fn merge_field(a: &Node<FieldDefinition>, b: &Node<FieldDefinition>) -> Option<Node<FieldDefinition>> {
    if !type_eq(&a.ty, &b.ty) {
        return None;
    }
    if !directives_eq(&a.directives, &b.directives) {
        return None;
    }
    let arguments = merge_argument_definitions(&a.arguments, &b.arguments, false)?;
    Some(Node::new(FieldDefinition {
        description: merge_description(&a.description, &b.description),
        name: a.name.clone(),
        arguments,
        ty: a.ty.clone(),
        directives: a.directives.clone(),
    }))
}

/// Merge two argument-definition lists element by element: same name set, mergeable type
/// (currently: textually equal), equal default value.
///
/// `ignore_new_default_for_builtin` implements the "ignore new default" escape hatch the spec
/// reserves for built-in directives (e.g. `@skip`/`@include`'s `if` argument), where one side is
/// allowed to add a default the other side lacks without that counting as a conflict.
pub fn merge_argument_definitions(
    a: &[Node<InputValueDefinition>],
    b: &[Node<InputValueDefinition>],
    ignore_new_default_for_builtin: bool,
) -> Option<Vec<Node<InputValueDefinition>>> {
    if a.len() != b.len() {
        return None;
    }
    let by_name: IndexMap<_, _> = b.iter().map(|arg| (arg.name.clone(), arg)).collect();
    let mut merged = Vec::with_capacity(a.len());
    for arg_a in a {
        let arg_b = by_name.get(&arg_a.name)?;
        if !type_eq(&arg_a.ty, &arg_b.ty) {
            return None;
        }
        let defaults_match = optional_value_eq(&arg_a.default_value, &arg_b.default_value)
            || (ignore_new_default_for_builtin
                && (arg_a.default_value.is_none() || arg_b.default_value.is_none()));
        if !defaults_match {
            return None;
        }
        let default_value = arg_a.default_value.clone().or_else(|| arg_b.default_value.clone());
        merged.push(Node::new(InputValueDefinition {
            description: merge_description(&arg_a.description, &arg_b.description),
            name: arg_a.name.clone(),
            ty: arg_a.ty.clone(),
            default_value,
            directives: arg_a.directives.clone(),
        }));
    }
    Some(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use apollo_compiler::Name;
    use apollo_compiler::ast::Type;

    fn field(name: &str, ty: &str) -> Node<FieldDefinition> {
        Node::new(FieldDefinition {
            description: None,
            name: Name::new(name).unwrap(),
            arguments: vec![],
            ty: Type::parse(ty, "test").unwrap(),
            directives: Default::default(),
        })
    }

    #[test]
    fn merges_fields_with_matching_type() {
        let a = field("lastName", "String!");
        let b = field("lastName", "String!");
        assert!(merge_field(&a, &b).is_some());
    }

    #[test]
    fn rejects_fields_with_mismatched_type() {
        let a = field("lastName", "String!");
        let b = field("lastName", "String");
        assert!(merge_field(&a, &b).is_none());
    }
}
