//! Object-type merge rule (§4.1, "Objects"): fields union by name, shared fields must be
//! mergeable, `implements` is the sorted union of both sides, directives element-wise equal.

use std::sync::Arc;

use apollo_compiler::Node;
use apollo_compiler::ast::ObjectTypeDefinition;
use indexmap::IndexMap;
use indexmap::IndexSet;

use crate::error::ConflictingLocations;
use crate::error::MergeError;
use crate::merge::fields::merge_field;
use crate::merge::values::directives_eq;
use crate::merge::values::merge_description;

pub fn merge_object(
    type_name: &str,
    a: &Node<ObjectTypeDefinition>,
    a_location: &Arc<str>,
    b: &Node<ObjectTypeDefinition>,
    b_location: &Arc<str>,
) -> Result<Node<ObjectTypeDefinition>, MergeError> {
    if !directives_eq(&a.directives, &b.directives) {
        return Err(MergeError::ObjectFieldMismatch {
            type_name: Arc::from(type_name),
            field_name: Arc::from("<type-level directives>"),
            locations: ConflictingLocations {
                first: a_location.clone(),
                second: b_location.clone(),
            },
            reason: "directive lists differ".to_string(),
        });
    }

    let mut fields: IndexMap<_, _> = a.fields.iter().map(|f| (f.name.clone(), f.clone())).collect();
    for field_b in &b.fields {
        match fields.get(&field_b.name) {
            None => {
                fields.insert(field_b.name.clone(), field_b.clone());
            }
            Some(field_a) => {
                let merged = merge_field(field_a, field_b).ok_or_else(|| MergeError::ObjectFieldMismatch {
                    type_name: Arc::from(type_name),
                    field_name: Arc::from(field_b.name.as_str()),
                    locations: ConflictingLocations {
                        first: a_location.clone(),
                        second: b_location.clone(),
                    },
                    reason: "type, arguments or directives differ".to_string(),
                })?;
                fields.insert(field_b.name.clone(), merged);
            }
        }
    }

    let mut implements: IndexSet<_> = a.implements_interfaces.iter().cloned().collect();
    implements.extend(b.implements_interfaces.iter().cloned());
    let mut implements: Vec<_> = implements.into_iter().collect();
    implements.sort_by(|x, y| x.as_str().cmp(y.as_str()));

    Ok(Node::new(ObjectTypeDefinition {
        description: merge_description(&a.description, &b.description),
        name: a.name.clone(),
        implements_interfaces: implements,
        directives: a.directives.clone(),
        fields: fields.into_values().collect(),
    }))
}
