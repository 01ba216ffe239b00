//! Interface merge rule (§4.1, "Interfaces"): same name requires the same set of field names,
//! each mergeable by the Field rule.

use std::sync::Arc;

use apollo_compiler::Node;
use apollo_compiler::ast::InterfaceTypeDefinition;
use indexmap::IndexSet;

use crate::error::ConflictingLocations;
use crate::error::MergeError;
use crate::merge::fields::merge_field;
use crate::merge::values::merge_description;

pub fn merge_interface(
    type_name: &str,
    a: &Node<InterfaceTypeDefinition>,
    a_location: &Arc<str>,
    b: &Node<InterfaceTypeDefinition>,
    b_location: &Arc<str>,
) -> Result<Node<InterfaceTypeDefinition>, MergeError> {
    let names_a: IndexSet<_> = a.fields.iter().map(|f| f.name.clone()).collect();
    let names_b: IndexSet<_> = b.fields.iter().map(|f| f.name.clone()).collect();
    if names_a != names_b {
        return Err(MergeError::InterfaceFieldSetMismatch {
            type_name: Arc::from(type_name),
            locations: ConflictingLocations {
                first: a_location.clone(),
                second: b_location.clone(),
            },
        });
    }

    let mut fields = Vec::with_capacity(a.fields.len());
    for field_a in &a.fields {
        let field_b = b
            .fields
            .iter()
            .find(|f| f.name == field_a.name)
            .expect("field set equality checked above");
        let merged = merge_field(field_a, field_b).ok_or_else(|| MergeError::ObjectFieldMismatch {
            type_name: Arc::from(type_name),
            field_name: Arc::from(field_a.name.as_str()),
            locations: ConflictingLocations {
                first: a_location.clone(),
                second: b_location.clone(),
            },
            reason: "type, arguments or directives differ".to_string(),
        })?;
        fields.push(merged);
    }

    Ok(Node::new(InterfaceTypeDefinition {
        description: merge_description(&a.description, &b.description),
        name: a.name.clone(),
        implements_interfaces: a.implements_interfaces.clone(),
        directives: a.directives.clone(),
        fields,
    }))
}
