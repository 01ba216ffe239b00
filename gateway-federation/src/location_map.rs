//! The field-location index: for every `(Type, field)` pair, the ordered set of downstream
//! locations that can resolve it.
//!
//! This is the side product the [`crate::merge`] pass builds while it reduces the input schemas,
//! and the map the query planner consults when it has to decide, for a given field, whether it can
//! stay inline in the parent step or must be split into a child step at a different location.

use std::sync::Arc;

use indexmap::IndexMap;

/// The synthetic location that owns gateway-level fields and introspection (`__schema`,
/// `__type`, `__typename`, ...). Never a real downstream URL.
pub const INTERNAL_LOCATION: &str = "internal";

/// A downstream location, e.g. a subgraph URL. Cheaply cloned since the same string is shared by
/// every field entry that location contributes to.
pub type Location = Arc<str>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeField {
    pub type_name: Arc<str>,
    pub field_name: Arc<str>,
}

impl TypeField {
    pub fn new(type_name: impl Into<Arc<str>>, field_name: impl Into<Arc<str>>) -> Self {
        Self {
            type_name: type_name.into(),
            field_name: field_name.into(),
        }
    }
}

/// `(TypeName, FieldName) -> ordered locations`.
///
/// Built once at startup by the merger and treated as read-only afterwards; the planner never
/// mutates it. Iteration order of the location list for one field is source order: the first
/// location registered for a field is the one the planner prefers when the field is not already
/// pinned to the parent step's location (§4.2, Open Question (a)).
#[derive(Debug, Clone, Default)]
pub struct FieldLocationMap {
    entries: IndexMap<TypeField, Vec<Location>>,
}

impl FieldLocationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `location` can resolve `type_name.field_name`. Appends to the existing entry's
    /// location list if one is already present, in call order.
    pub fn record(&mut self, type_name: &str, field_name: &str, location: Location) {
        let key = TypeField::new(type_name, field_name);
        let locations = self.entries.entry(key).or_default();
        if !locations.contains(&location) {
            locations.push(location);
        }
    }

    /// Record an internal (gateway-owned or introspection) field.
    pub fn record_internal(&mut self, type_name: &str, field_name: &str) {
        self.record(type_name, field_name, Arc::from(INTERNAL_LOCATION));
    }

    pub fn locations(&self, type_name: &str, field_name: &str) -> &[Location] {
        self.entries
            .get(&TypeField::new(type_name, field_name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The location the planner should prefer for this field when it is not already pinned to a
    /// parent step's location: the first location in source order.
    pub fn preferred_location(&self, type_name: &str, field_name: &str) -> Option<&Location> {
        self.locations(type_name, field_name).first()
    }

    pub fn contains(&self, type_name: &str, field_name: &str) -> bool {
        !self.locations(type_name, field_name).is_empty()
    }

    pub fn is_internal_only(&self, type_name: &str, field_name: &str) -> bool {
        let locations = self.locations(type_name, field_name);
        !locations.is_empty() && locations.iter().all(|l| &**l == INTERNAL_LOCATION)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TypeField, &[Location])> {
        self.entries.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Union two location maps, preserving the order in which each side first registered a
    /// location for a given field (`self`'s locations first, then any new ones from `other`).
    pub fn concat(mut self, other: FieldLocationMap) -> FieldLocationMap {
        for (key, locations) in other.entries {
            let entry = self.entries.entry(key).or_default();
            for location in locations {
                if !entry.contains(&location) {
                    entry.push(location);
                }
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_locations_in_source_order() {
        let mut map = FieldLocationMap::new();
        map.record("User", "lastName", Arc::from("url1"));
        map.record("User", "lastName", Arc::from("url2"));
        assert_eq!(map.locations("User", "lastName"), &[Arc::from("url1"), Arc::from("url2")]);
    }

    #[test]
    fn does_not_duplicate_a_location() {
        let mut map = FieldLocationMap::new();
        map.record("User", "id", Arc::from("url1"));
        map.record("User", "id", Arc::from("url1"));
        assert_eq!(map.locations("User", "id").len(), 1);
    }

    #[test]
    fn internal_fields_resolve_to_the_synthetic_location() {
        let mut map = FieldLocationMap::new();
        map.record_internal("Query", "__schema");
        assert_eq!(map.locations("Query", "__schema"), &[Arc::from(INTERNAL_LOCATION)]);
        assert!(map.is_internal_only("Query", "__schema"));
    }

    #[test]
    fn concat_unions_two_maps_preserving_order() {
        let mut a = FieldLocationMap::new();
        a.record("Query", "allUsers", Arc::from("url1"));
        let mut b = FieldLocationMap::new();
        b.record("Query", "allUsers", Arc::from("url2"));
        b.record("User", "firstName", Arc::from("url2"));

        let merged = a.concat(b);
        assert_eq!(
            merged.locations("Query", "allUsers"),
            &[Arc::from("url1"), Arc::from("url2")]
        );
        assert_eq!(merged.locations("User", "firstName"), &[Arc::from("url2")]);
    }

    #[test]
    fn scenario_1_field_location_map_from_spec() {
        // Sources S1 at `url1` declares `Query.allUsers`, `User.id`, `User.firstName`,
        // `User.lastName`; S2 at `url2` declares `User.lastName` only.
        let mut map = FieldLocationMap::new();
        map.record("Query", "allUsers", Arc::from("url1"));
        map.record("User", "id", Arc::from("url1"));
        map.record("User", "firstName", Arc::from("url1"));
        map.record("User", "lastName", Arc::from("url1"));
        map.record("User", "lastName", Arc::from("url2"));
        map.record_internal("__Schema", "types");

        assert_eq!(map.locations("Query", "allUsers"), &[Arc::from("url1")]);
        assert_eq!(map.locations("User", "firstName"), &[Arc::from("url1")]);
        assert_eq!(
            map.locations("User", "lastName"),
            &[Arc::from("url1"), Arc::from("url2")]
        );
        assert_eq!(map.locations("__Schema", "types"), &[Arc::from(INTERNAL_LOCATION)]);
    }
}
