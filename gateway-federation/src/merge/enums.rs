//! Enum merge rule (§4.1, "Enums"): same set of value names required, per-value directive lists
//! must match, per-value descriptions first-non-empty wins. Built-in enums (name prefix `__`)
//! pass through unmerged (the introspection enums are identical by construction across every
//! downstream schema, so the first occurrence is definitive).

use std::sync::Arc;

use apollo_compiler::Node;
use apollo_compiler::ast::EnumTypeDefinition;
use apollo_compiler::ast::EnumValueDefinition;
use indexmap::IndexMap;

use crate::error::ConflictingLocations;
use crate::error::MergeError;
use crate::merge::values::directives_eq;
use crate::merge::values::merge_description;

pub fn merge_enum(
    type_name: &str,
    a: &Node<EnumTypeDefinition>,
    a_location: &Arc<str>,
    b: &Node<EnumTypeDefinition>,
    b_location: &Arc<str>,
) -> Result<Node<EnumTypeDefinition>, MergeError> {
    if type_name.starts_with("__") {
        return Ok(a.clone());
    }

    let values_a: IndexMap<_, _> = a.values.iter().map(|v| (v.value.clone(), v.clone())).collect();
    let values_b: IndexMap<_, _> = b.values.iter().map(|v| (v.value.clone(), v.clone())).collect();
    if values_a.keys().collect::<std::collections::HashSet<_>>()
        != values_b.keys().collect::<std::collections::HashSet<_>>()
    {
        return Err(MergeError::EnumValueSetMismatch {
            type_name: Arc::from(type_name),
            locations: ConflictingLocations {
                first: a_location.clone(),
                second: b_location.clone(),
            },
        });
    }

    let mut values = Vec::with_capacity(values_a.len());
    for (name, value_a) in &values_a {
        let value_b = &values_b[name];
        if !directives_eq(&value_a.directives, &value_b.directives) {
            return Err(MergeError::EnumValueDirectiveMismatch {
                type_name: Arc::from(type_name),
                value_name: Arc::from(name.as_str()),
                locations: ConflictingLocations {
                    first: a_location.clone(),
                    second: b_location.clone(),
                },
            });
        }
        values.push(Node::new(EnumValueDefinition {
            description: merge_description(&value_a.description, &value_b.description),
            value: name.clone(),
            directives: value_a.directives.clone(),
        }));
    }

    Ok(Node::new(EnumTypeDefinition {
        description: merge_description(&a.description, &b.description),
        name: a.name.clone(),
        directives: a.directives.clone(),
        values,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use apollo_compiler::Name;

    fn test_enum(name: &str, values: &[&str]) -> Node<EnumTypeDefinition> {
        Node::new(EnumTypeDefinition {
            description: None,
            name: Name::new(name).unwrap(),
            directives: Default::default(),
            values: values
                .iter()
                .map(|v| {
                    Node::new(EnumValueDefinition {
                        description: None,
                        value: Name::new(*v).unwrap(),
                        directives: Default::default(),
                    })
                })
                .collect(),
        })
    }

    #[test]
    fn rejects_mismatched_value_sets() {
        let a = test_enum("Status", &["ACTIVE", "INACTIVE"]);
        let b = test_enum("Status", &["ACTIVE"]);
        let result = merge_enum("Status", &a, &Arc::from("url1"), &b, &Arc::from("url2"));
        assert!(matches!(result, Err(MergeError::EnumValueSetMismatch { .. })));
    }

    #[test]
    fn builtin_enums_pass_through_unmerged() {
        let a = test_enum("__TypeKind", &["SCALAR"]);
        let b = test_enum("__TypeKind", &["SCALAR", "OBJECT"]);
        let merged = merge_enum("__TypeKind", &a, &Arc::from("url1"), &b, &Arc::from("url2")).unwrap();
        assert_eq!(merged.values.len(), 1);
    }
}
