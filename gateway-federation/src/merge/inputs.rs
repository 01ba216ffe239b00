//! Input-object merge rule (§4.1, "Input objects"): fields must match exactly in name set, shared
//! fields mergeable, directives element-wise equal.

use std::sync::Arc;

use apollo_compiler::Node;
use apollo_compiler::ast::InputObjectTypeDefinition;

use crate::error::ConflictingLocations;
use crate::error::MergeError;
use crate::merge::fields::merge_argument_definitions;
use crate::merge::values::directives_eq;
use crate::merge::values::merge_description;

pub fn merge_input_object(
    type_name: &str,
    a: &Node<InputObjectTypeDefinition>,
    a_location: &Arc<str>,
    b: &Node<InputObjectTypeDefinition>,
    b_location: &Arc<str>,
) -> Result<Node<InputObjectTypeDefinition>, MergeError> {
    if !directives_eq(&a.directives, &b.directives) {
        return Err(MergeError::InputFieldSetMismatch {
            type_name: Arc::from(type_name),
            locations: ConflictingLocations {
                first: a_location.clone(),
                second: b_location.clone(),
            },
        });
    }

    let fields = merge_argument_definitions(&a.fields, &b.fields, false).ok_or_else(|| {
        MergeError::InputFieldSetMismatch {
            type_name: Arc::from(type_name),
            locations: ConflictingLocations {
                first: a_location.clone(),
                second: b_location.clone(),
            },
        }
    })?;

    Ok(Node::new(InputObjectTypeDefinition {
        description: merge_description(&a.description, &b.description),
        name: a.name.clone(),
        directives: a.directives.clone(),
        fields,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use apollo_compiler::Name;
    use apollo_compiler::ast::InputValueDefinition;
    use apollo_compiler::ast::Type;

    fn input_object(name: &str, field_names: &[&str]) -> Node<InputObjectTypeDefinition> {
        Node::new(InputObjectTypeDefinition {
            description: None,
            name: Name::new(name).unwrap(),
            directives: Default::default(),
            fields: field_names
                .iter()
                .map(|f| {
                    Node::new(InputValueDefinition {
                        description: None,
                        name: Name::new(*f).unwrap(),
                        ty: Node::new(Type::parse("String", "test").unwrap()),
                        default_value: None,
                        directives: Default::default(),
                    })
                })
                .collect(),
        })
    }

    #[test]
    fn rejects_mismatched_field_name_sets() {
        let a = input_object("Filter", &["tag"]);
        let b = input_object("Filter", &["tag", "category"]);
        let result = merge_input_object("Filter", &a, &Arc::from("url1"), &b, &Arc::from("url2"));
        assert!(matches!(result, Err(MergeError::InputFieldSetMismatch { .. })));
    }

    #[test]
    fn merges_matching_field_sets() {
        let a = input_object("Filter", &["tag"]);
        let b = input_object("Filter", &["tag"]);
        assert!(merge_input_object("Filter", &a, &Arc::from("url1"), &b, &Arc::from("url2")).is_ok());
    }
}
