//! Predicate matching for conditional deletes.
//!
//! Rule authors gate a delete on "the current value still looks like what we
//! expect". Target documents vary slightly across repositories while sharing
//! a recognizable shape, so two containment forms are supported in addition
//! to plain structural equality.

use serde_yaml::Value;

/// The marker field used to identify entries in a list-of-mappings pattern,
/// e.g. `[{key = "role"}]` matches any tolerations-style list carrying an
/// entry with `key: role`.
const LIST_MARKER_FIELD: &str = "key";

/// Decide whether `current` satisfies `expected`.
///
/// Checked in order:
/// 1. `expected` is a one-element sequence whose element is a mapping with a
///    `"key"` entry: `current` must be a sequence containing at least one
///    mapping whose `"key"` field equals the pattern's (all other fields
///    ignored).
/// 2. `expected` is a non-empty mapping: `current` must be a mapping that
///    contains every key the pattern names (values ignored).
/// 3. Otherwise: structural equality. Mapping comparison is insensitive to
///    key order; scalar comparison is type-exact.
pub fn matches(current: &Value, expected: &Value) -> bool {
    if let Some(marker) = list_marker(expected) {
        return match current.as_sequence() {
            Some(items) => items.iter().any(|item| {
                item.as_mapping()
                    .and_then(|m| m.get(LIST_MARKER_FIELD))
                    .is_some_and(|v| v == marker)
            }),
            None => false,
        };
    }

    if let Some(pattern) = expected.as_mapping() {
        if !pattern.is_empty() {
            return match current.as_mapping() {
                Some(map) => pattern.keys().all(|k| map.contains_key(k)),
                None => false,
            };
        }
    }

    current == expected
}

/// The `"key"` marker value if `expected` has the one-element
/// list-of-mappings shape, `None` otherwise.
fn list_marker(expected: &Value) -> Option<&Value> {
    match expected.as_sequence()?.as_slice() {
        [only] => only.as_mapping()?.get(LIST_MARKER_FIELD),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(input: &str) -> Value {
        serde_yaml::from_str(input).expect("test yaml")
    }

    #[test]
    fn list_pattern_matches_by_marker_key() {
        let current = yaml("- key: role\n  operator: Exists\n- key: zone\n");
        let expected = yaml("- key: role\n");
        assert!(matches(&current, &expected));
    }

    #[test]
    fn list_pattern_rejects_missing_marker() {
        let current = yaml("- key: zone\n  operator: Exists\n");
        let expected = yaml("- key: role\n");
        assert!(!matches(&current, &expected));
    }

    #[test]
    fn list_pattern_rejects_non_sequence_current() {
        let current = yaml("key: role\n");
        let expected = yaml("- key: role\n");
        assert!(!matches(&current, &expected));
    }

    #[test]
    fn mapping_pattern_matches_on_key_presence() {
        let current = yaml("nodeAffinity:\n  requiredDuringScheduling: {}\n");
        let expected = yaml("nodeAffinity: {}\n");
        assert!(matches(&current, &expected));
    }

    #[test]
    fn mapping_pattern_rejects_absent_key() {
        let current = yaml("podAffinity: {}\n");
        let expected = yaml("nodeAffinity: {}\n");
        assert!(!matches(&current, &expected));
    }

    #[test]
    fn scalar_equality_is_type_exact() {
        assert!(matches(&yaml("3"), &yaml("3")));
        assert!(!matches(&yaml("'3'"), &yaml("3")));
        assert!(matches(&yaml("true"), &yaml("true")));
    }

    #[test]
    fn structural_equality_ignores_mapping_key_order() {
        // Not reachable through the mapping tier: nest the mappings in a
        // sequence so tier 3 does the comparison.
        let current = yaml("- a: 1\n  b: 2\n");
        let expected = yaml("- b: 2\n  a: 1\n");
        assert!(matches(&current, &expected));
    }

    #[test]
    fn multi_element_sequence_falls_through_to_equality() {
        let current = yaml("- key: role\n- key: zone\n");
        let expected = yaml("- key: role\n- key: zone\n");
        assert!(matches(&current, &expected));

        let reordered = yaml("- key: zone\n- key: role\n");
        assert!(!matches(&current, &reordered));
    }
}
