//! Query materialization (§4.2, "Query materialization"): turn a step's selection set into a
//! standalone operation document with stable, deterministic output.

use std::collections::BTreeSet;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast::Definition;
use apollo_compiler::ast::Document;
use apollo_compiler::ast::Field;
use apollo_compiler::ast::InlineFragment;
use apollo_compiler::ast::OperationDefinition;
use apollo_compiler::ast::OperationType;
use apollo_compiler::ast::Selection;
use apollo_compiler::ast::Type;
use apollo_compiler::ast::VariableDefinition;

use crate::selection::variable_argument;

/// The variable name every `node(id: $id)` wrapper binds (§4.2).
pub const NODE_ID_VARIABLE: &str = "id";

/// Wrap `selection` as `{ node(id: $id) { ... on parent_type { selection } } }` (§4.2, "Any other
/// parent type").
pub fn wrap_in_node(parent_type: &Name, selection: Vec<Selection>) -> Vec<Selection> {
    let id_variable = Name::new(NODE_ID_VARIABLE).expect("\"id\" is a valid GraphQL name");
    let inline_fragment = InlineFragment {
        type_condition: Some(parent_type.clone()),
        directives: Default::default(),
        selection_set: selection,
    };
    let node_field = Field {
        alias: None,
        name: Name::new("node").expect("\"node\" is a valid GraphQL name"),
        arguments: vec![variable_argument(NODE_ID_VARIABLE, &id_variable)],
        directives: Default::default(),
        selection_set: vec![Selection::InlineFragment(Node::new(inline_fragment))],
    };
    vec![Selection::Field(Node::new(node_field))]
}

/// Project the operation's full variable-definition list onto `variables` (§4.2, "Query
/// materialization" and §8's quantified invariant for it). When `needs_id` is set and no
/// user-declared `$id` definition exists, synthesizes `$id: ID!` — the one variable the planner
/// itself introduces rather than the caller.
pub fn project_variable_definitions(
    all_variable_defs: &[Node<VariableDefinition>],
    variables: &BTreeSet<Name>,
    needs_id: bool,
) -> Vec<Node<VariableDefinition>> {
    let mut projected: Vec<_> = all_variable_defs
        .iter()
        .filter(|def| variables.contains(&def.name))
        .cloned()
        .collect();

    let id_name = Name::new(NODE_ID_VARIABLE).expect("\"id\" is a valid GraphQL name");
    if needs_id && !projected.iter().any(|def| def.name == id_name) {
        projected.push(Node::new(VariableDefinition {
            name: id_name,
            ty: Node::new(Type::NonNullNamed(Name::new("ID").expect("\"ID\" is a valid GraphQL name"))),
            default_value: None,
            directives: Default::default(),
        }));
    }
    projected
}

/// Materialize a step's selection into a standalone, single-operation [`Document`] (§4.2). Output
/// is stable because it is built directly from the already-deterministic selection the planner
/// walked (fields in declaration order, aliases and arguments carried through verbatim).
pub fn materialize_document(
    operation_type: OperationType,
    variable_defs: Vec<Node<VariableDefinition>>,
    selection_set: Vec<Selection>,
) -> Document {
    let operation = OperationDefinition {
        operation_type,
        name: None,
        variables: variable_defs,
        directives: Default::default(),
        selection_set,
    };
    let mut document = Document::new();
    document.definitions = vec![Definition::OperationDefinition(Node::new(operation))];
    document
}

#[cfg(test)]
mod tests {
    use super::*;
    use apollo_compiler::ast::Type;

    #[test]
    fn wraps_selection_in_node_with_typed_inline_fragment() {
        let parent = Name::new("User").unwrap();
        let selection = vec![Selection::Field(Node::new(Field {
            alias: None,
            name: Name::new("lastName").unwrap(),
            arguments: vec![],
            directives: Default::default(),
            selection_set: vec![],
        }))];
        let wrapped = wrap_in_node(&parent, selection);
        assert_eq!(wrapped.len(), 1);
        match &wrapped[0] {
            Selection::Field(field) => {
                assert_eq!(field.name.as_str(), "node");
                assert_eq!(field.arguments.len(), 1);
                assert_eq!(field.arguments[0].name.as_str(), "id");
            }
            _ => panic!("expected a field selection"),
        }
    }

    #[test]
    fn synthesizes_id_variable_when_needed_and_absent() {
        let defs = project_variable_definitions(&[], &BTreeSet::new(), true);
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name.as_str(), "id");
        assert_eq!(defs[0].ty.to_string(), "ID!");
    }

    #[test]
    fn projects_only_referenced_variables() {
        let all = vec![
            Node::new(VariableDefinition {
                name: Name::new("id").unwrap(),
                ty: Node::new(Type::parse("ID!", "test").unwrap()),
                default_value: None,
                directives: Default::default(),
            }),
            Node::new(VariableDefinition {
                name: Name::new("category").unwrap(),
                ty: Node::new(Type::parse("String!", "test").unwrap()),
                default_value: None,
                directives: Default::default(),
            }),
        ];
        let mut referenced = BTreeSet::new();
        referenced.insert(Name::new("id").unwrap());
        let projected = project_variable_definitions(&all, &referenced, false);
        assert_eq!(projected.len(), 1);
        assert_eq!(projected[0].name.as_str(), "id");
    }
}
