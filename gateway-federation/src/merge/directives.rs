//! Directive-definition merge rule (§4.1, "Directive definitions"): mergeable argument list,
//! location-set reconciliation (union of type-system locations, intersection of executable
//! locations — any executable location on only one side is a conflict), descriptions
//! first-non-empty wins.

use std::sync::Arc;

use apollo_compiler::Node;
use apollo_compiler::ast::DirectiveDefinition;
use apollo_compiler::ast::DirectiveLocation;
use indexmap::IndexSet;

use crate::error::ConflictingLocations;
use crate::error::MergeError;
use crate::merge::fields::merge_argument_definitions;
use crate::merge::values::merge_description;

/// Names of directives defined by the GraphQL spec itself, for which the "ignore new default"
/// escape hatch applies when merging argument lists (§4.1).
const BUILTIN_DIRECTIVE_NAMES: &[&str] = &["skip", "include", "deprecated", "specifiedBy", "oneOf"];

const EXECUTABLE_LOCATIONS: &[DirectiveLocation] = &[
    DirectiveLocation::Query,
    DirectiveLocation::Mutation,
    DirectiveLocation::Subscription,
    DirectiveLocation::Field,
    DirectiveLocation::FragmentDefinition,
    DirectiveLocation::FragmentSpread,
    DirectiveLocation::InlineFragment,
    DirectiveLocation::VariableDefinition,
];

fn is_executable(location: &DirectiveLocation) -> bool {
    EXECUTABLE_LOCATIONS.contains(location)
}

pub fn merge_directive_definition(
    name: &str,
    a: &Node<DirectiveDefinition>,
    a_location: &Arc<str>,
    b: &Node<DirectiveDefinition>,
    b_location: &Arc<str>,
) -> Result<Node<DirectiveDefinition>, MergeError> {
    let is_builtin = BUILTIN_DIRECTIVE_NAMES.contains(&name);
    let arguments = merge_argument_definitions(&a.arguments, &b.arguments, is_builtin).ok_or_else(|| {
        MergeError::DirectiveArgumentMismatch {
            name: Arc::from(name),
            argument_name: Arc::from("<argument list>"),
            locations: ConflictingLocations {
                first: a_location.clone(),
                second: b_location.clone(),
            },
            reason: "argument names, types or defaults differ".to_string(),
        }
    })?;

    let (type_system_a, executable_a): (IndexSet<_>, IndexSet<_>) =
        a.locations.iter().cloned().partition(|l| !is_executable(l));
    let (type_system_b, executable_b): (IndexSet<_>, IndexSet<_>) =
        b.locations.iter().cloned().partition(|l| !is_executable(l));

    for location in executable_a.symmetric_difference(&executable_b) {
        return Err(MergeError::DirectiveExecutableLocationMismatch {
            name: Arc::from(name),
            location: Arc::from(location.to_string()),
            locations: ConflictingLocations {
                first: a_location.clone(),
                second: b_location.clone(),
            },
        });
    }

    let mut locations: Vec<_> = type_system_a
        .union(&type_system_b)
        .cloned()
        .chain(executable_a.intersection(&executable_b).cloned())
        .collect();
    locations.sort_by(|x, y| x.to_string().cmp(&y.to_string()));
    locations.dedup();

    Ok(Node::new(DirectiveDefinition {
        description: merge_description(&a.description, &b.description),
        name: a.name.clone(),
        arguments,
        repeatable: a.repeatable || b.repeatable,
        locations,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use apollo_compiler::Name;

    fn directive(name: &str, locations: &[DirectiveLocation]) -> Node<DirectiveDefinition> {
        Node::new(DirectiveDefinition {
            description: None,
            name: Name::new(name).unwrap(),
            arguments: vec![],
            repeatable: false,
            locations: locations.to_vec(),
        })
    }

    #[test]
    fn scenario_5_unions_type_system_locations() {
        // Source 1: `directive @foo on SCHEMA | OBJECT`; Source 2: `directive @foo on SCALAR | OBJECT`.
        let a = directive("foo", &[DirectiveLocation::Schema, DirectiveLocation::Object]);
        let b = directive("foo", &[DirectiveLocation::Scalar, DirectiveLocation::Object]);
        let merged = merge_directive_definition("foo", &a, &Arc::from("url1"), &b, &Arc::from("url2"))
            .expect("type-system locations always union");
        let names: Vec<_> = merged.locations.iter().map(|l| l.to_string()).collect();
        assert_eq!(names, vec!["OBJECT", "SCALAR", "SCHEMA"]);
    }

    #[test]
    fn scenario_5_conflicting_executable_locations_fail() {
        // Source 1: `FIELD | QUERY`; Source 2: `FRAGMENT_DEFINITION | QUERY`.
        let a = directive("foo", &[DirectiveLocation::Field, DirectiveLocation::Query]);
        let b = directive(
            "foo",
            &[DirectiveLocation::FragmentDefinition, DirectiveLocation::Query],
        );
        let result = merge_directive_definition("foo", &a, &Arc::from("url1"), &b, &Arc::from("url2"));
        assert!(matches!(
            result,
            Err(MergeError::DirectiveExecutableLocationMismatch { .. })
        ));
    }

    #[test]
    fn shared_executable_locations_intersect() {
        let a = directive("foo", &[DirectiveLocation::Field, DirectiveLocation::Query]);
        let b = directive("foo", &[DirectiveLocation::Field]);
        let merged = merge_directive_definition("foo", &a, &Arc::from("url1"), &b, &Arc::from("url2"))
            .expect("FIELD is shared");
        let names: Vec<_> = merged.locations.iter().map(|l| l.to_string()).collect();
        assert_eq!(names, vec!["FIELD"]);
    }
}
