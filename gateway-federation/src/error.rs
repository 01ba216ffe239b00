//! Error kinds produced by schema merging and query planning.
//!
//! Each enum here covers exactly one phase named in the design: [`MergeError`] is what
//! [`crate::merge::merge`] fails with, [`PlanError`] is what [`crate::plan::planner::QueryPlanner`]
//! fails with. Both are `Clone` so that a single failure can be reported to more than one waiter
//! (the plan cache's single-flight compilation shares a failed result the same way it shares a
//! successful one).

use std::sync::Arc;

/// Two locations that disagreed about the same piece of schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictingLocations {
    pub first: Arc<str>,
    pub second: Arc<str>,
}

/// Why [`crate::merge::merge`] could not produce a unified schema.
///
/// Each variant names the §4.1 rule that was violated and carries enough information (type name,
/// field name, the two offending locations) to print a precise diagnostic without re-deriving it
/// from a generic string.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MergeError {
    #[error("interface \"{type_name}\" declares different fields across locations {locations:?}")]
    InterfaceFieldSetMismatch {
        type_name: Arc<str>,
        locations: ConflictingLocations,
    },

    #[error("object \"{type_name}.{field_name}\" is not mergeable across locations {locations:?}: {reason}")]
    ObjectFieldMismatch {
        type_name: Arc<str>,
        field_name: Arc<str>,
        locations: ConflictingLocations,
        reason: String,
    },

    #[error("input object \"{type_name}\" declares different fields across locations {locations:?}")]
    InputFieldSetMismatch {
        type_name: Arc<str>,
        locations: ConflictingLocations,
    },

    #[error("input field \"{type_name}.{field_name}\" is not mergeable across locations {locations:?}: {reason}")]
    InputFieldMismatch {
        type_name: Arc<str>,
        field_name: Arc<str>,
        locations: ConflictingLocations,
        reason: String,
    },

    #[error("enum \"{type_name}\" declares different values across locations {locations:?}")]
    EnumValueSetMismatch {
        type_name: Arc<str>,
        locations: ConflictingLocations,
    },

    #[error("enum value \"{type_name}.{value_name}\" has mismatched directives across locations {locations:?}")]
    EnumValueDirectiveMismatch {
        type_name: Arc<str>,
        value_name: Arc<str>,
        locations: ConflictingLocations,
    },

    #[error("scalar \"{type_name}\" has mismatched directives across locations {locations:?}")]
    ScalarDirectiveMismatch {
        type_name: Arc<str>,
        locations: ConflictingLocations,
    },

    #[error("union \"{type_name}\" declares different member sets across locations {locations:?}")]
    UnionMemberMismatch {
        type_name: Arc<str>,
        locations: ConflictingLocations,
    },

    #[error(
        "directive \"@{name}\" argument \"{argument_name}\" is not mergeable across locations {locations:?}: {reason}"
    )]
    DirectiveArgumentMismatch {
        name: Arc<str>,
        argument_name: Arc<str>,
        locations: ConflictingLocations,
        reason: String,
    },

    #[error(
        "directive \"@{name}\" is declared on executable location {location} in only one of {locations:?}"
    )]
    DirectiveExecutableLocationMismatch {
        name: Arc<str>,
        location: Arc<str>,
        locations: ConflictingLocations,
    },

    #[error("directive \"@{name}\" arguments \"{argument_name}\" have mismatched types across locations {locations:?}")]
    FieldArgumentTypeMismatch {
        name: Arc<str>,
        argument_name: Arc<str>,
        locations: ConflictingLocations,
    },

    #[error("kind mismatch for type \"{type_name}\": declared as both {first_kind} and {second_kind}")]
    KindMismatch {
        type_name: Arc<str>,
        first_kind: &'static str,
        second_kind: &'static str,
    },

    #[error("schema text at location \"{location}\" could not be parsed: {message}")]
    SchemaParseError { location: Arc<str>, message: String },
}

/// Why [`crate::plan::planner::QueryPlanner::plan`] could not produce a [`crate::plan::PlanList`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum PlanError {
    #[error("could not parse operation: {message}")]
    ParseError { message: String },

    #[error("field \"{type_name}.{field_name}\" is not defined in the unified schema")]
    FieldNotFound {
        type_name: Arc<str>,
        field_name: Arc<str>,
    },

    #[error("field \"{type_name}.{field_name}\" has no location that can resolve it")]
    LocationMissing {
        type_name: Arc<str>,
        field_name: Arc<str>,
    },

    #[error("fragment \"{fragment_name}\" is spread but never defined")]
    FragmentUnresolved { fragment_name: Arc<str> },

    #[error("operation named \"{name}\" was not found in the document")]
    OperationNotFound { name: Arc<str> },

    #[error("document declares more than one operation and none was selected by name")]
    AmbiguousOperation,

    #[error("planner work queue for \"{parent_type}\" closed before its children could be scheduled")]
    SchedulingFailed { parent_type: Arc<str> },
}
