//! Response stitching (§4.3 "Stitcher", §9 "Dynamic JSON trees").
//!
//! Downstream responses are unconstrained object/array trees. Rather than hand-roll the tagged
//! variant the design note describes, we reuse [`serde_json_bytes::Value`] — it already *is* that
//! variant (`Null | Bool | Number | String | Array | Object`), and it's the representation the
//! teacher's own router carries subgraph responses in, so every downstream `Queryer` speaks it
//! natively.

use gateway_federation::plan::InsertionPoint;
use gateway_federation::plan::PathElement;
use gateway_federation::plan::error_path;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map;
use serde_json_bytes::Value;

use crate::error::ExecError;

pub use gateway_federation::plan::PathElement as StitchPathElement;

fn display_path(insertion_point: &[PathElement]) -> String {
    insertion_point.iter().map(|t| t.to_string()).collect::<Vec<_>>().join("/")
}

/// Merge `result` into `accumulator` at `insertion_point` (§4.3 "Stitcher"). The accumulator is
/// expected to already be an `Object` at the root; intermediate object/list nodes are created on
/// demand, matching the "auto-creating maps along object tokens, auto-creating/extending lists
/// (filling with empty objects) along list tokens" wording.
pub fn merge_at(accumulator: &mut Value, insertion_point: &InsertionPoint, result: Value) -> Result<(), ExecError> {
    let target = navigate_create(accumulator, insertion_point)?;
    match (target, result) {
        (Value::Object(target_map), Value::Object(result_map)) => {
            for (key, value) in result_map {
                target_map.insert(key, value);
            }
            Ok(())
        }
        (target, Value::Null) => {
            *target = Value::Null;
            Ok(())
        }
        (target, result) => {
            *target = result;
            Ok(())
        }
    }
}

/// Walk (and lazily create) the path from `accumulator`'s root down to the node `insertion_point`
/// addresses, returning a mutable reference to that node.
fn navigate_create<'a>(accumulator: &'a mut Value, insertion_point: &[PathElement]) -> Result<&'a mut Value, ExecError> {
    let mut current = accumulator;
    for token in insertion_point {
        let key = ByteString::from(token.response_key().as_str());
        let object = as_object_mut(current, &display_path(insertion_point))?;
        let slot = object.entry(key).or_insert(Value::Null);

        current = match token.index {
            None => slot,
            Some(index) => {
                if !matches!(slot, Value::Array(_)) {
                    *slot = Value::Array(Vec::new());
                }
                let Value::Array(items) = slot else { unreachable!() };
                if items.len() <= index {
                    items.resize_with(index + 1, || Value::Object(Map::new()));
                }
                &mut items[index]
            }
        };

        if matches!(current, Value::Null) {
            *current = Value::Object(Map::new());
        }
    }
    Ok(current)
}

fn as_object_mut<'a>(value: &'a mut Value, path_for_error: &str) -> Result<&'a mut Map<ByteString, Value>, ExecError> {
    if matches!(value, Value::Null) {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ExecError::StitchShape {
            path: path_for_error.to_string(),
            reason: "expected an object node while stitching".to_string(),
        }),
    }
}

/// Remove every synthetic field recorded in `fields_to_scrub` from the stitched response
/// (§4.3 "Completion & scrubbing", §8's scrub invariant).
///
/// `templates` are the plan's alias-only insertion points (no `:index` — a [`PlanStep`]'s
/// insertion point, like a child step's, is a template over the parent's selection, not a
/// concrete runtime path). Scrubbing therefore fans out across any list it meets along the way,
/// the same way [`super::executor`]'s dispatch does, rather than addressing one fixed element.
pub fn scrub(accumulator: &mut Value, field_name: &str, templates: &[InsertionPoint]) {
    for template in templates {
        scrub_along(accumulator, field_name, template);
    }
}

fn scrub_along(value: &mut Value, field_name: &str, remaining: &[PathElement]) {
    let Some((token, rest)) = remaining.split_first() else {
        if let Value::Object(map) = value {
            map.remove(field_name);
        }
        return;
    };
    let Value::Object(map) = value else { return };
    let Some(slot) = map.get_mut(token.response_key().as_str()) else { return };
    match slot {
        Value::Array(items) => {
            for item in items.iter_mut() {
                scrub_along(item, field_name, rest);
            }
        }
        other => scrub_along(other, field_name, rest),
    }
}

/// Read a field off a possibly-absent object node, the read-side counterpart to
/// [`navigate_create`], used by the executor while computing child insertion points (§4.3 step 4).
pub fn field<'a>(value: &'a Value, name: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(name),
        _ => None,
    }
}

/// The plain `id` string at a node, if present and scalar — how a list element's join id is
/// captured for `#id` path decoration (§4.3 "Insertion-point fan-out").
pub fn plain_id(value: &Value) -> Option<String> {
    match field(value, "id")? {
        Value::String(s) => Some(s.as_str().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `GraphQLError.path` for an insertion point, stripped of `:index#id` decorations (§6, §8).
pub fn error_path_for(insertion_point: &InsertionPoint) -> Vec<String> {
    error_path(insertion_point).into_iter().map(|name| name.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use apollo_compiler::Name;
    use gateway_federation::plan::PathElement;

    use super::*;

    #[test]
    fn merges_at_empty_path_key_by_key() {
        let mut acc = Value::Object(Map::new());
        let mut result = Map::new();
        result.insert(ByteString::from("allUsers"), Value::Array(vec![]));
        merge_at(&mut acc, &[], Value::Object(result)).unwrap();
        assert_eq!(field(&acc, "allUsers"), Some(&Value::Array(vec![])));
    }

    #[test]
    fn merges_at_a_list_insertion_point_extending_the_list() {
        let mut acc = Value::Object(Map::new());
        let point = vec![PathElement::list_item(Name::new("allUsers").unwrap(), 0).with_id("1")];
        let mut payload = Map::new();
        payload.insert(ByteString::from("lastName"), Value::String("Hello".into()));
        merge_at(&mut acc, &point, Value::Object(payload)).unwrap();

        let users = field(&acc, "allUsers").unwrap();
        let Value::Array(items) = users else { panic!("expected array") };
        assert_eq!(items.len(), 1);
        assert_eq!(field(&items[0], "lastName"), Some(&Value::String("Hello".into())));
    }

    #[test]
    fn scrub_removes_the_synthetic_field_at_every_recorded_point() {
        let mut acc = Value::Object(Map::new());
        let point = vec![PathElement::list_item(Name::new("allUsers").unwrap(), 0)];
        let mut payload = Map::new();
        payload.insert(ByteString::from("id"), Value::String("1".into()));
        payload.insert(ByteString::from("lastName"), Value::String("Hello".into()));
        merge_at(&mut acc, &point, Value::Object(payload)).unwrap();

        scrub(&mut acc, "id", &[point.clone()]);

        let users = field(&acc, "allUsers").unwrap();
        let Value::Array(items) = users else { panic!("expected array") };
        assert_eq!(field(&items[0], "id"), None);
        assert_eq!(field(&items[0], "lastName"), Some(&Value::String("Hello".into())));
    }
}
