//! Schema merger entry point (§4.1): buckets every definition by kind, folds each bucket pairwise
//! into a canonical definition, and builds the [`FieldLocationMap`] as a side product of the same
//! walk — mirroring the teacher's `apollo-federation::merger` module, which is likewise organized
//! as one file per GraphQL definition kind plus a top-level orchestrator.

pub mod directives;
pub mod enums;
pub mod fields;
pub mod inputs;
pub mod interfaces;
pub mod objects;
pub mod scalars;
pub mod unions;
pub mod values;

use std::sync::Arc;

use apollo_compiler::Node;
use apollo_compiler::ast::Definition;
use apollo_compiler::ast::Document;
use apollo_compiler::ast::DirectiveDefinition;
use apollo_compiler::ast::EnumTypeDefinition;
use apollo_compiler::ast::InputObjectTypeDefinition;
use apollo_compiler::ast::InterfaceTypeDefinition;
use apollo_compiler::ast::ObjectTypeDefinition;
use apollo_compiler::ast::ScalarTypeDefinition;
use apollo_compiler::ast::UnionTypeDefinition;
use indexmap::IndexMap;
use indexmap::IndexSet;

use crate::error::MergeError;
use crate::location_map::FieldLocationMap;
use crate::location_map::Location;
use crate::location_map::TypeField;

/// One downstream schema, as supplied to [`merge`]. Immutable for the gateway's lifetime (§3).
#[derive(Debug, Clone)]
pub struct RemoteSchema {
    pub url: Arc<str>,
    pub document: Document,
}

impl RemoteSchema {
    pub fn new(url: impl Into<Arc<str>>, document: Document) -> Self {
        Self {
            url: url.into(),
            document,
        }
    }
}

/// The merged schema plus the indices the merger computes as a side product of unifying it (§3):
/// `implements` (object type -> interfaces it implements) and `possible_types` (interface/union
/// name -> the concrete object type names that satisfy it).
#[derive(Debug, Clone)]
pub struct UnifiedSchema {
    pub document: Document,
    pub locations: FieldLocationMap,
    pub implements: IndexMap<Arc<str>, IndexSet<Arc<str>>>,
    pub possible_types: IndexMap<Arc<str>, IndexSet<Arc<str>>>,
    /// `(TypeName, FieldName) -> named return type`, list/non-null wrappers stripped. The planner
    /// consults this to know what type a nested selection set is selecting against (§4.2 step 4).
    field_types: IndexMap<TypeField, Arc<str>>,
}

impl UnifiedSchema {
    /// The object type names that can stand in for `abstract_type_name` (an interface or union).
    pub fn possible_types(&self, abstract_type_name: &str) -> &[Arc<str>] {
        self.possible_types
            .get(abstract_type_name)
            .map(|set| set.as_slice())
            .unwrap_or(&[])
    }

    /// The named return type of `type_name.field_name`, wrappers stripped.
    pub fn field_return_type(&self, type_name: &str, field_name: &str) -> Option<&Arc<str>> {
        self.field_types.get(&TypeField::new(type_name, field_name))
    }
}

type Bucket<T> = IndexMap<Arc<str>, Vec<(Location, Node<T>)>>;

fn push<T>(bucket: &mut Bucket<T>, name: &str, location: &Location, def: Node<T>) {
    bucket.entry(Arc::from(name)).or_default().push((location.clone(), def));
}

/// Fold a same-name bucket pairwise into one canonical definition (§4.1, Pass 2). Every per-kind
/// merge function shares this `(name, a, a_location, b, b_location) -> Result<Node<T>, MergeError>`
/// shape, so one fold drives all seven kinds.
fn fold<T>(
    name: &str,
    defs: Vec<(Location, Node<T>)>,
    merge_fn: impl Fn(&str, &Node<T>, &Location, &Node<T>, &Location) -> Result<Node<T>, MergeError>,
) -> Result<Node<T>, MergeError> {
    let mut iter = defs.into_iter();
    let (mut acc_location, mut acc) = iter.next().expect("buckets are only created on first insert");
    for (location, def) in iter {
        acc = merge_fn(name, &acc, &acc_location, &def, &location)?;
        acc_location = location;
    }
    Ok(acc)
}

fn fold_bucket<T>(
    bucket: Bucket<T>,
    merge_fn: impl Fn(&str, &Node<T>, &Location, &Node<T>, &Location) -> Result<Node<T>, MergeError>,
) -> Result<IndexMap<Arc<str>, Node<T>>, MergeError> {
    bucket
        .into_iter()
        .map(|(name, defs)| Ok((name.clone(), fold(&name, defs, &merge_fn)?)))
        .collect()
}

/// Check that `name` has not already been declared under a different GraphQL definition kind
/// (§7, `KindMismatch`): objects, interfaces, unions, enums, scalars and input objects all share
/// one type namespace.
fn check_kind(
    kinds: &mut IndexMap<Arc<str>, &'static str>,
    name: &str,
    kind: &'static str,
) -> Result<(), MergeError> {
    match kinds.get(name) {
        None => {
            kinds.insert(Arc::from(name), kind);
            Ok(())
        }
        Some(existing) if *existing == kind => Ok(()),
        Some(existing) => Err(MergeError::KindMismatch {
            type_name: Arc::from(name),
            first_kind: *existing,
            second_kind: kind,
        }),
    }
}

/// Combine every downstream [`RemoteSchema`] into one [`UnifiedSchema`] (§4.1).
pub fn merge(schemas: &[RemoteSchema]) -> Result<UnifiedSchema, MergeError> {
    let mut objects: Bucket<ObjectTypeDefinition> = IndexMap::new();
    let mut interfaces: Bucket<InterfaceTypeDefinition> = IndexMap::new();
    let mut inputs: Bucket<InputObjectTypeDefinition> = IndexMap::new();
    let mut enums: Bucket<EnumTypeDefinition> = IndexMap::new();
    let mut scalars: Bucket<ScalarTypeDefinition> = IndexMap::new();
    let mut unions: Bucket<UnionTypeDefinition> = IndexMap::new();
    let mut directives: Bucket<DirectiveDefinition> = IndexMap::new();
    let mut kinds: IndexMap<Arc<str>, &'static str> = IndexMap::new();
    let mut locations = FieldLocationMap::new();
    let mut field_types: IndexMap<TypeField, Arc<str>> = IndexMap::new();

    for schema in schemas {
        for definition in &schema.document.definitions {
            match definition {
                Definition::ObjectTypeDefinition(def) => {
                    check_kind(&mut kinds, def.name.as_str(), "object")?;
                    for field in &def.fields {
                        locations.record(def.name.as_str(), field.name.as_str(), schema.url.clone());
                        field_types.insert(
                            TypeField::new(def.name.as_str(), field.name.as_str()),
                            Arc::from(field.ty.inner_named_type().as_str()),
                        );
                    }
                    push(&mut objects, def.name.as_str(), &schema.url, def.clone());
                }
                Definition::InterfaceTypeDefinition(def) => {
                    check_kind(&mut kinds, def.name.as_str(), "interface")?;
                    for field in &def.fields {
                        locations.record(def.name.as_str(), field.name.as_str(), schema.url.clone());
                        field_types.insert(
                            TypeField::new(def.name.as_str(), field.name.as_str()),
                            Arc::from(field.ty.inner_named_type().as_str()),
                        );
                    }
                    push(&mut interfaces, def.name.as_str(), &schema.url, def.clone());
                }
                Definition::InputObjectTypeDefinition(def) => {
                    check_kind(&mut kinds, def.name.as_str(), "input object")?;
                    push(&mut inputs, def.name.as_str(), &schema.url, def.clone());
                }
                Definition::EnumTypeDefinition(def) => {
                    check_kind(&mut kinds, def.name.as_str(), "enum")?;
                    push(&mut enums, def.name.as_str(), &schema.url, def.clone());
                }
                Definition::ScalarTypeDefinition(def) => {
                    check_kind(&mut kinds, def.name.as_str(), "scalar")?;
                    push(&mut scalars, def.name.as_str(), &schema.url, def.clone());
                }
                Definition::UnionTypeDefinition(def) => {
                    check_kind(&mut kinds, def.name.as_str(), "union")?;
                    push(&mut unions, def.name.as_str(), &schema.url, def.clone());
                }
                Definition::DirectiveDefinition(def) => {
                    // Directives live in their own namespace, separate from types.
                    push(&mut directives, def.name.as_str(), &schema.url, def.clone());
                }
                // Schema definitions/extensions and executable-only definitions (operations,
                // fragments) never appear in a downstream type-system document; ignored rather
                // than rejected so a stray one doesn't abort the whole merge.
                _ => {}
            }
        }
    }

    let merged_objects = fold_bucket(objects, objects::merge_object)?;
    let merged_interfaces = fold_bucket(interfaces, interfaces::merge_interface)?;
    let merged_inputs = fold_bucket(inputs, inputs::merge_input_object)?;
    let merged_enums = fold_bucket(enums, enums::merge_enum)?;
    let merged_scalars = fold_bucket(scalars, scalars::merge_scalar)?;
    let merged_unions = fold_bucket(unions, unions::merge_union)?;
    let merged_directives: IndexMap<Arc<str>, Node<DirectiveDefinition>> = directives
        .into_iter()
        .map(|(name, defs)| Ok((name.clone(), fold(&name, defs, directives::merge_directive_definition)?)))
        .collect::<Result<_, MergeError>>()?;

    // Minimal introspection shape (§1: "not a spec-complete introspection system"): every merged
    // object/interface answers `__typename`, and `Query` answers `__schema`/`__type`.
    for name in merged_objects.keys().chain(merged_interfaces.keys()) {
        locations.record_internal(name, "__typename");
    }
    locations.record_internal("Query", "__schema");
    locations.record_internal("Query", "__type");

    let mut implements: IndexMap<Arc<str>, IndexSet<Arc<str>>> = IndexMap::new();
    let mut possible_types: IndexMap<Arc<str>, IndexSet<Arc<str>>> = IndexMap::new();
    for (name, def) in &merged_objects {
        let ifaces: IndexSet<Arc<str>> = def
            .implements_interfaces
            .iter()
            .map(|i| Arc::from(i.as_str()))
            .collect();
        for iface in &ifaces {
            possible_types.entry(iface.clone()).or_default().insert(name.clone());
        }
        implements.insert(name.clone(), ifaces);
    }
    for (name, def) in &merged_unions {
        let members: IndexSet<Arc<str>> = def.members.iter().map(|m| Arc::from(m.as_str())).collect();
        possible_types.insert(name.clone(), members);
    }

    let mut definitions = Vec::with_capacity(
        merged_objects.len()
            + merged_interfaces.len()
            + merged_inputs.len()
            + merged_enums.len()
            + merged_scalars.len()
            + merged_unions.len()
            + merged_directives.len(),
    );
    definitions.extend(merged_scalars.into_values().map(Definition::ScalarTypeDefinition));
    definitions.extend(merged_enums.into_values().map(Definition::EnumTypeDefinition));
    definitions.extend(merged_interfaces.into_values().map(Definition::InterfaceTypeDefinition));
    definitions.extend(merged_unions.into_values().map(Definition::UnionTypeDefinition));
    definitions.extend(merged_objects.into_values().map(Definition::ObjectTypeDefinition));
    definitions.extend(merged_inputs.into_values().map(Definition::InputObjectTypeDefinition));
    definitions.extend(merged_directives.into_values().map(Definition::DirectiveDefinition));

    let mut document = Document::new();
    document.definitions = definitions;

    Ok(UnifiedSchema {
        document,
        locations,
        implements,
        possible_types,
        field_types,
    })
}
