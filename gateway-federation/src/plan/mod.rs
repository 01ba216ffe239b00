//! Plan tree types (§3, §4.2): [`PlanStep`], [`Plan`], [`PlanList`], and the insertion-point path
//! element. Built by [`crate::plan::planner::QueryPlanner`], consumed read-only by the executor.

pub mod materialize;
pub mod planner;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast::Document;
use apollo_compiler::ast::FragmentDefinition;
use apollo_compiler::ast::OperationType;
use apollo_compiler::ast::Selection;
use indexmap::IndexMap;

use crate::location_map::Location;
use crate::location_map::INTERNAL_LOCATION;
use crate::selection::FragmentMap;

/// One token of an insertion point: `fieldAlias[:index][#id]` (§6). Kept as a dedicated value
/// rather than a string (§9, "Insertion-point tokens") so path construction can't produce malformed
/// `:`/`#` text; printed to the wire grammar only at the `GraphQLError.path` boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathElement {
    pub field_alias: Name,
    pub index: Option<usize>,
    pub id: Option<Arc<str>>,
}

impl PathElement {
    pub fn field(alias: Name) -> Self {
        Self {
            field_alias: alias,
            index: None,
            id: None,
        }
    }

    pub fn list_item(alias: Name, index: usize) -> Self {
        Self {
            field_alias: alias,
            index: Some(index),
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<Arc<str>>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// The id captured at this token, if any, used to parameterize a child step's `$id` (§4.3
    /// step 1).
    pub fn captured_id(&self) -> Option<&Arc<str>> {
        self.id.as_ref()
    }

    /// The response key this token contributes, stripped of `:index#id` — what the executor
    /// emits as a `GraphQLError.path` segment (§6, §8).
    pub fn response_key(&self) -> &Name {
        &self.field_alias
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.field_alias)?;
        if let Some(index) = self.index {
            write!(f, ":{index}")?;
        }
        if let Some(id) = &self.id {
            write!(f, "#{id}")?;
        }
        Ok(())
    }
}

pub type InsertionPoint = Vec<PathElement>;

/// Render an insertion point as the `GraphQLError.path` segments (§6, §8): response keys only,
/// `:index#id` decorations stripped.
pub fn error_path(insertion_point: &[PathElement]) -> Vec<Name> {
    insertion_point.iter().map(|token| token.response_key().clone()).collect()
}

/// The unit of execution (§3): a selection set targeting exactly one location.
///
/// Invariant: if `parent_type` is not a root operation type, the step's materialized query is
/// wrapped as `{ node(id: $id) { ... on ParentType { selection } } }` and `id` is in `variables`.
#[derive(Debug, Clone)]
pub struct PlanStep {
    pub parent_type: Arc<str>,
    pub location: Location,
    pub insertion_point: InsertionPoint,
    pub selection_set: Vec<Selection>,
    pub fragment_definitions: FragmentMap,
    pub variables: BTreeSet<Name>,
    pub query_string: String,
    pub query_document: Document,
    pub then: Vec<PlanStep>,
}

impl PlanStep {
    /// True when this step must wrap its selection in `node(id: $id) { ... on ParentType }`
    /// (§4.2, "Query materialization").
    pub fn needs_node_wrapper(&self) -> bool {
        !matches!(self.parent_type.as_ref(), "Query" | "Mutation" | "Subscription")
    }

    /// The synthetic root step created by the planner to hold the real top-level steps in `then`;
    /// never dispatched to a queryer itself (§3, "Plan").
    pub fn synthetic_root(operation_root_type: &str) -> Self {
        Self {
            parent_type: Arc::from(operation_root_type),
            location: Arc::from(INTERNAL_LOCATION),
            insertion_point: Vec::new(),
            selection_set: Vec::new(),
            fragment_definitions: FragmentMap::new(),
            variables: BTreeSet::new(),
            query_string: String::new(),
            query_document: Document::new(),
            then: Vec::new(),
        }
    }
}

/// `{operation, root_step, fragment_definitions, fields_to_scrub}` (§3).
///
/// Invariant: for any parent -> child edge in `root_step`, the child's `insertion_point` begins
/// with the parent's, extended by the alias(es) chosen in the parent.
#[derive(Debug, Clone)]
pub struct Plan {
    pub operation_name: Option<Name>,
    pub operation_type: OperationType,
    pub root_step: PlanStep,
    pub fragment_definitions: FragmentMap,
    /// `fields_to_scrub[field_name] = insertion points where that field was added artificially`
    /// (§3) and must be removed from the final response before it reaches the caller.
    pub fields_to_scrub: IndexMap<Name, Vec<InsertionPoint>>,
}

/// Ordered by operation position in the source document; addressable by operation name (§3).
#[derive(Debug, Clone, Default)]
pub struct PlanList {
    plans: Vec<Plan>,
}

impl PlanList {
    pub fn new(plans: Vec<Plan>) -> Self {
        Self { plans }
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Plan> {
        self.plans.iter()
    }

    pub fn by_name(&self, name: &str) -> Option<&Plan> {
        self.plans.iter().find(|plan| plan.operation_name.as_deref().map(Name::as_str) == Some(name))
    }

    /// The single plan in this list, if there is exactly one — used when the caller supplied no
    /// operation name and the document declares a single operation (§4.5).
    pub fn sole(&self) -> Option<&Plan> {
        match self.plans.as_slice() {
            [plan] => Some(plan),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_element_displays_the_wire_grammar() {
        let token = PathElement::list_item(Name::new("allUsers").unwrap(), 0).with_id("1");
        assert_eq!(token.to_string(), "allUsers:0#1");

        let plain = PathElement::field(Name::new("favoriteCatPhoto").unwrap());
        assert_eq!(plain.to_string(), "favoriteCatPhoto");
    }

    #[test]
    fn error_path_strips_index_and_id_decorations() {
        let point = vec![PathElement::list_item(Name::new("allUsers").unwrap(), 0).with_id("1")];
        assert_eq!(error_path(&point), vec![Name::new("allUsers").unwrap()]);
    }
}
