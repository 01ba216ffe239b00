//! Equality helpers shared by every per-kind merge rule: default-value equality (§4.1, "Values"),
//! type equality, element-wise directive-list equality, and "first non-empty wins" for
//! descriptions. Kept in one place because every kind's merge rule leans on the same four checks.

use apollo_compiler::Node;
use apollo_compiler::ast::Directive;
use apollo_compiler::ast::Type;
use apollo_compiler::ast::Value;

/// "Equal iff both null or both same kind and same raw text" (§4.1). Comparing the printed form is
/// exactly that: two values print identically iff they are the same kind with the same content.
pub fn value_eq(a: &Value, b: &Value) -> bool {
    matches!((a, b), (Value::Null, Value::Null)) || a.to_string() == b.to_string()
}

pub fn optional_value_eq(a: &Option<Node<Value>>, b: &Option<Node<Value>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => value_eq(a, b),
        _ => false,
    }
}

pub fn type_eq(a: &Type, b: &Type) -> bool {
    a.to_string() == b.to_string()
}

/// Directive lists merge only when they are element-wise equal (§4.1): same directives, applied
/// in the same order, with the same arguments.
pub fn directives_eq(a: &[Node<Directive>], b: &[Node<Directive>]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|(x, y)| x.name == y.name && arguments_eq(&x.arguments, &y.arguments))
}

fn arguments_eq(
    a: &[Node<apollo_compiler::ast::Argument>],
    b: &[Node<apollo_compiler::ast::Argument>],
) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|(x, y)| x.name == y.name && value_eq(&x.value, &y.value))
}

/// First-non-empty-wins description merge (§4.1, applied identically to every kind).
pub fn merge_description<D>(a: &Option<D>, b: &Option<D>) -> Option<D>
where
    D: Clone + std::fmt::Display,
{
    if let Some(d) = a {
        if !d.to_string().is_empty() {
            return Some(d.clone());
        }
    }
    b.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use apollo_compiler::Name;

    #[test]
    fn null_equals_null() {
        assert!(value_eq(&Value::Null, &Value::Null));
    }

    #[test]
    fn same_kind_same_text_is_equal() {
        assert!(value_eq(
            &Value::String("a".into()),
            &Value::String("a".into())
        ));
        assert!(!value_eq(
            &Value::String("a".into()),
            &Value::String("b".into())
        ));
    }

    #[test]
    fn different_kinds_are_unequal_even_with_same_text() {
        assert!(!value_eq(
            &Value::String("1".into()),
            &Value::Int(1.into())
        ));
    }

    #[test]
    fn description_prefers_first_non_empty() {
        let a: Option<String> = Some(String::new());
        let b: Option<String> = Some("from b".into());
        assert_eq!(merge_description(&a, &b), Some("from b".to_string()));

        let a: Option<String> = Some("from a".into());
        assert_eq!(merge_description(&a, &b), Some("from a".to_string()));
    }

    #[test]
    fn directive_lists_require_matching_names_and_arguments() {
        let name = Name::new("foo").unwrap();
        let d1 = Node::new(Directive {
            name: name.clone(),
            arguments: vec![],
        });
        let d2 = Node::new(Directive {
            name,
            arguments: vec![],
        });
        assert!(directives_eq(&[d1], &[d2]));
    }
}
