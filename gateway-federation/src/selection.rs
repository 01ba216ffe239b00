//! Selection-set utilities shared by the planner: fragment inlining, variable extraction, and
//! deterministic printing. None of this is planner-specific logic — it is the small set of
//! AST-walking primitives the planner (and, transitively, the executor's insertion-point
//! computation) are built out of.

use std::collections::BTreeSet;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast::Argument;
use apollo_compiler::ast::Field;
use apollo_compiler::ast::FragmentDefinition;
use apollo_compiler::ast::FragmentSpread;
use apollo_compiler::ast::InlineFragment;
use apollo_compiler::ast::Selection;
use apollo_compiler::ast::Value;
use indexmap::IndexMap;

/// All fragment definitions declared in a document, keyed by name, for fast lookup during
/// inlining. Planner steps each carry their own `fragment_definitions` (verbatim, per §3); this map
/// is how the planner resolves a spread back to its definition while walking.
pub type FragmentMap = IndexMap<Name, Node<FragmentDefinition>>;

/// Variables referenced by value, or nested inside a list/object argument value (§4.2 step 5).
pub fn collect_variables(selection_set: &[Selection], fragments: &FragmentMap) -> BTreeSet<Name> {
    let mut out = BTreeSet::new();
    collect_variables_into(selection_set, fragments, &mut out, &mut BTreeSet::new());
    out
}

fn collect_variables_into(
    selection_set: &[Selection],
    fragments: &FragmentMap,
    out: &mut BTreeSet<Name>,
    visiting: &mut BTreeSet<Name>,
) {
    for selection in selection_set {
        match selection {
            Selection::Field(field) => {
                for argument in &field.arguments {
                    collect_variables_from_value(&argument.value, out);
                }
                for directive in &field.directives {
                    for argument in &directive.arguments {
                        collect_variables_from_value(&argument.value, out);
                    }
                }
                collect_variables_into(&field.selection_set, fragments, out, visiting);
            }
            Selection::InlineFragment(inline) => {
                collect_variables_into(&inline.selection_set, fragments, out, visiting);
            }
            Selection::FragmentSpread(spread) => {
                if !visiting.insert(spread.fragment_name.clone()) {
                    // Recursive fragment spread; already walking it further up the stack.
                    continue;
                }
                if let Some(def) = fragments.get(&spread.fragment_name) {
                    collect_variables_into(&def.selection_set, fragments, out, visiting);
                }
                visiting.remove(&spread.fragment_name);
            }
        }
    }
}

fn collect_variables_from_value(value: &Value, out: &mut BTreeSet<Name>) {
    match value {
        Value::Variable(name) => {
            out.insert(name.clone());
        }
        Value::List(items) => {
            for item in items {
                collect_variables_from_value(item, out);
            }
        }
        Value::Object(fields) => {
            for (_, value) in fields {
                collect_variables_from_value(value, out);
            }
        }
        _ => {}
    }
}

/// Resolve a fragment spread into the equivalent inline fragment, so that downstream code only
/// ever has to deal with fields and inline fragments. Used by the planner when a spread's fields
/// cross locations and must be re-partitioned (§4.2, "Fragment handling").
pub fn resolve_spread(spread: &FragmentSpread, fragments: &FragmentMap) -> Option<InlineFragment> {
    let def = fragments.get(&spread.fragment_name)?;
    Some(InlineFragment {
        type_condition: Some(def.type_condition.clone()),
        directives: def.directives.clone(),
        selection_set: def.selection_set.clone(),
    })
}

/// The response key a field contributes to the result: the alias if present, else the field name.
pub fn response_key(field: &Field) -> &Name {
    field.alias.as_ref().unwrap_or(&field.name)
}

/// A synthesized `id` selection field, inserted by the planner when a step has children and the
/// user did not already request `id` at the insertion point (§4.2, "ID injection").
pub fn synthetic_id_field() -> Node<Field> {
    Node::new(Field {
        alias: None,
        name: Name::new("id").expect("\"id\" is a valid GraphQL name"),
        arguments: Vec::new(),
        directives: Default::default(),
        selection_set: Vec::new(),
    })
}

/// True if `selection_set` already selects plain `id` (no alias) at its top level.
pub fn selects_plain_id(selection_set: &[Selection]) -> bool {
    selection_set.iter().any(|selection| {
        matches!(selection, Selection::Field(field) if field.alias.is_none() && field.name.as_str() == "id")
    })
}

/// Build a single-argument `Argument` node, used when materializing the synthetic
/// `node(id: $id)` wrapper (§4.2, "Query materialization").
pub fn variable_argument(name: &str, variable: &Name) -> Node<Argument> {
    Node::new(Argument {
        name: Name::new(name).expect("argument name is a valid GraphQL name"),
        value: Node::new(Value::Variable(variable.clone())),
    })
}
