//! Union merge rule (§4.1, "Unions"): same member-type set required, order-independent.

use std::sync::Arc;

use apollo_compiler::Node;
use apollo_compiler::ast::UnionTypeDefinition;
use indexmap::IndexSet;

use crate::error::ConflictingLocations;
use crate::error::MergeError;
use crate::merge::values::merge_description;

pub fn merge_union(
    type_name: &str,
    a: &Node<UnionTypeDefinition>,
    a_location: &Arc<str>,
    b: &Node<UnionTypeDefinition>,
    b_location: &Arc<str>,
) -> Result<Node<UnionTypeDefinition>, MergeError> {
    let members_a: IndexSet<_> = a.members.iter().cloned().collect();
    let members_b: IndexSet<_> = b.members.iter().cloned().collect();
    if members_a != members_b {
        return Err(MergeError::UnionMemberMismatch {
            type_name: Arc::from(type_name),
            locations: ConflictingLocations {
                first: a_location.clone(),
                second: b_location.clone(),
            },
        });
    }

    let mut members: Vec<_> = members_a.into_iter().collect();
    members.sort_by(|x, y| x.as_str().cmp(y.as_str()));

    Ok(Node::new(UnionTypeDefinition {
        description: merge_description(&a.description, &b.description),
        name: a.name.clone(),
        directives: a.directives.clone(),
        members,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use apollo_compiler::Name;

    fn test_union(name: &str, members: &[&str]) -> Node<UnionTypeDefinition> {
        Node::new(UnionTypeDefinition {
            description: None,
            name: Name::new(name).unwrap(),
            directives: Default::default(),
            members: members.iter().map(|m| Name::new(*m).unwrap()).collect(),
        })
    }

    #[test]
    fn requires_identical_member_sets_order_independent() {
        let a = test_union("SearchResult", &["User", "Post"]);
        let b = test_union("SearchResult", &["Post", "User"]);
        let merged = merge_union("SearchResult", &a, &Arc::from("url1"), &b, &Arc::from("url2")).unwrap();
        let names: Vec<_> = merged.members.iter().map(|n| n.to_string()).collect();
        assert_eq!(names, vec!["Post", "User"]);
    }

    #[test]
    fn rejects_mismatched_member_sets() {
        let a = test_union("SearchResult", &["User", "Post"]);
        let b = test_union("SearchResult", &["User"]);
        let result = merge_union("SearchResult", &a, &Arc::from("url1"), &b, &Arc::from("url2"));
        assert!(matches!(result, Err(MergeError::UnionMemberMismatch { .. })));
    }
}
