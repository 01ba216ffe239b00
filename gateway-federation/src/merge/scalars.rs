//! Scalar merge rule (§4.1, "Scalars"): same name accepts, descriptions first-non-empty wins,
//! directives element-wise equal.

use std::sync::Arc;

use apollo_compiler::Node;
use apollo_compiler::ast::ScalarTypeDefinition;

use crate::error::ConflictingLocations;
use crate::error::MergeError;
use crate::merge::values::directives_eq;
use crate::merge::values::merge_description;

pub fn merge_scalar(
    type_name: &str,
    a: &Node<ScalarTypeDefinition>,
    a_location: &Arc<str>,
    b: &Node<ScalarTypeDefinition>,
    b_location: &Arc<str>,
) -> Result<Node<ScalarTypeDefinition>, MergeError> {
    if !directives_eq(&a.directives, &b.directives) {
        return Err(MergeError::ScalarDirectiveMismatch {
            type_name: Arc::from(type_name),
            locations: ConflictingLocations {
                first: a_location.clone(),
                second: b_location.clone(),
            },
        });
    }
    Ok(Node::new(ScalarTypeDefinition {
        description: merge_description(&a.description, &b.description),
        name: a.name.clone(),
        directives: a.directives.clone(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use apollo_compiler::Name;

    #[test]
    fn accepts_same_name_scalars() {
        let a = Node::new(ScalarTypeDefinition {
            description: None,
            name: Name::new("DateTime").unwrap(),
            directives: Default::default(),
        });
        let b = a.clone();
        assert!(merge_scalar("DateTime", &a, &Arc::from("url1"), &b, &Arc::from("url2")).is_ok());
    }
}
