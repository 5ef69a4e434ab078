//! Navigation over parsed documents.
//!
//! A document is a `serde_yaml::Value` tree (JSON documents are converted
//! into the same form before navigation). Navigation never panics and never
//! coerces: a step that does not fit the container it lands on stops the
//! walk with a logged warning and the operation becomes a no-op.

use crate::matcher;
use crate::path::{PathExpr, PathStep};
use serde_yaml::{Mapping, Value};
use tracing::{info, warn};

/// Set `value` at `path`, creating intermediate containers as needed.
///
/// Missing mapping keys are created as empty mappings. An intermediate
/// sequence index past the end pads the sequence with empty mappings until
/// the index exists. A final index may overwrite an existing slot or append
/// at exactly the current length; anything further past the end is a warned
/// no-op.
///
/// Returns whether the document was mutated.
pub fn set_path(doc: &mut Value, path: &PathExpr, value: Value) -> bool {
    let Some((last, parents)) = path.steps().split_last() else {
        warn!("empty path; set ignored");
        return false;
    };

    let mut current = doc;
    for step in parents {
        current = match descend_for_write(current, step, path) {
            Some(next) => next,
            None => return false,
        };
    }

    match (last, current) {
        (PathStep::Key(key), Value::Mapping(map)) => {
            map.insert(Value::String(key.clone()), value);
            true
        }
        (PathStep::Index(idx), Value::Sequence(seq)) => {
            if *idx < seq.len() {
                seq[*idx] = value;
                true
            } else if *idx == seq.len() {
                seq.push(value);
                true
            } else {
                warn!(%path, index = idx, len = seq.len(), "index past end of sequence; set ignored");
                false
            }
        }
        (step, found) => {
            warn_mismatch(path, step, found);
            false
        }
    }
}

/// Delete the value at `path` if it exists and, when `expected` is present,
/// the predicate matcher confirms the current value still has the expected
/// shape. Never creates containers.
///
/// Returns whether the document was mutated.
pub fn delete_path(doc: &mut Value, path: &PathExpr, expected: Option<&Value>) -> bool {
    let Some((last, parents)) = path.steps().split_last() else {
        warn!("empty path; delete ignored");
        return false;
    };

    let mut current = doc;
    for step in parents {
        current = match descend_readonly(current, step, path) {
            Some(next) => next,
            None => return false,
        };
    }

    match (last, current) {
        (PathStep::Key(key), Value::Mapping(map)) => {
            let Some(current_value) = map.get(key.as_str()) else {
                return false;
            };
            if let Some(pattern) = expected {
                if !matcher::matches(current_value, pattern) {
                    info!(%path, "current value does not match expected shape; delete skipped");
                    return false;
                }
            }
            map.remove(key.as_str());
            true
        }
        (PathStep::Index(idx), Value::Sequence(seq)) => {
            let Some(current_value) = seq.get(*idx) else {
                return false;
            };
            if let Some(pattern) = expected {
                if !matcher::matches(current_value, pattern) {
                    info!(%path, "current value does not match expected shape; delete skipped");
                    return false;
                }
            }
            seq.remove(*idx);
            true
        }
        (step, found) => {
            warn_mismatch(path, step, found);
            false
        }
    }
}

fn descend_for_write<'a>(
    current: &'a mut Value,
    step: &PathStep,
    path: &PathExpr,
) -> Option<&'a mut Value> {
    match step {
        PathStep::Key(key) => match current {
            Value::Mapping(map) => {
                if !map.contains_key(key.as_str()) {
                    map.insert(Value::String(key.clone()), Value::Mapping(Mapping::new()));
                }
                map.get_mut(key.as_str())
            }
            found => {
                warn_mismatch(path, step, found);
                None
            }
        },
        PathStep::Index(idx) => match current {
            Value::Sequence(seq) => {
                while seq.len() <= *idx {
                    seq.push(Value::Mapping(Mapping::new()));
                }
                seq.get_mut(*idx)
            }
            found => {
                warn_mismatch(path, step, found);
                None
            }
        },
    }
}

fn descend_readonly<'a>(
    current: &'a mut Value,
    step: &PathStep,
    path: &PathExpr,
) -> Option<&'a mut Value> {
    match step {
        PathStep::Key(key) => match current {
            Value::Mapping(map) => map.get_mut(key.as_str()),
            found => {
                warn_mismatch(path, step, found);
                None
            }
        },
        PathStep::Index(idx) => match current {
            Value::Sequence(seq) => seq.get_mut(*idx),
            found => {
                warn_mismatch(path, step, found);
                None
            }
        },
    }
}

fn warn_mismatch(path: &PathExpr, step: &PathStep, found: &Value) {
    warn!(%path, %step, found = kind_name(found), "type mismatch during navigation; operation skipped");
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(input: &str) -> Value {
        serde_yaml::from_str(input).expect("test yaml")
    }

    #[test]
    fn set_overwrites_existing_key() {
        let mut doc = yaml("image:\n  tag: v1\n");
        assert!(set_path(&mut doc, &PathExpr::parse("image.tag"), yaml("v2")));
        assert_eq!(doc["image"]["tag"], yaml("v2"));
    }

    #[test]
    fn set_creates_intermediate_mappings() {
        let mut doc = yaml("{}");
        assert!(set_path(
            &mut doc,
            &PathExpr::parse("config.database.host"),
            Value::String("db.example.com".to_string()),
        ));
        assert_eq!(doc["config"]["database"]["host"], yaml("db.example.com"));
    }

    #[test]
    fn set_through_sequence_index() {
        let mut doc = yaml("jobs:\n  build:\n    steps:\n    - {}\n");
        assert!(set_path(
            &mut doc,
            &PathExpr::parse("jobs.build.steps[0].uses"),
            Value::String("v".to_string()),
        ));
        assert_eq!(doc["jobs"]["build"]["steps"][0]["uses"], yaml("v"));
    }

    #[test]
    fn set_appends_at_exact_sequence_end() {
        let mut doc = yaml("items:\n- a\n");
        assert!(set_path(&mut doc, &PathExpr::parse("items[1]"), yaml("b")));
        assert_eq!(doc["items"], yaml("- a\n- b\n"));
    }

    #[test]
    fn set_past_sequence_end_is_noop() {
        let mut doc = yaml("items:\n- a\n");
        assert!(!set_path(&mut doc, &PathExpr::parse("items[3]"), yaml("b")));
        assert_eq!(doc["items"], yaml("- a\n"));
    }

    #[test]
    fn set_pads_intermediate_sequence_with_mappings() {
        let mut doc = yaml("steps: []\n");
        assert!(set_path(
            &mut doc,
            &PathExpr::parse("steps[1].name"),
            Value::String("second".to_string()),
        ));
        assert_eq!(doc["steps"][0], Value::Mapping(Mapping::new()));
        assert_eq!(doc["steps"][1]["name"], yaml("second"));
    }

    #[test]
    fn set_type_mismatch_is_noop() {
        let mut doc = yaml("replicaCount: 2\n");
        assert!(!set_path(
            &mut doc,
            &PathExpr::parse("replicaCount[0]"),
            yaml("3"),
        ));
        assert_eq!(doc, yaml("replicaCount: 2\n"));
    }

    #[test]
    fn delete_existing_key() {
        let mut doc = yaml("a: 1\nb: 2\n");
        assert!(delete_path(&mut doc, &PathExpr::parse("a"), None));
        assert_eq!(doc, yaml("b: 2\n"));
    }

    #[test]
    fn delete_absent_key_is_noop() {
        let mut doc = yaml("a: 1\n");
        assert!(!delete_path(&mut doc, &PathExpr::parse("missing"), None));
        assert_eq!(doc, yaml("a: 1\n"));
    }

    #[test]
    fn delete_does_not_create_containers() {
        let mut doc = yaml("a: 1\n");
        assert!(!delete_path(&mut doc, &PathExpr::parse("b.c"), None));
        assert_eq!(doc, yaml("a: 1\n"));
    }

    #[test]
    fn delete_respects_predicate() {
        let mut doc = yaml("tolerations:\n- key: zone\n");
        let expected = yaml("- key: role\n");
        assert!(!delete_path(
            &mut doc,
            &PathExpr::parse("tolerations"),
            Some(&expected),
        ));
        assert!(doc.get("tolerations").is_some());

        let mut doc = yaml("tolerations:\n- key: role\n  operator: Exists\n");
        assert!(delete_path(
            &mut doc,
            &PathExpr::parse("tolerations"),
            Some(&expected),
        ));
        assert!(doc.get("tolerations").is_none());
    }

    #[test]
    fn delete_sequence_element() {
        let mut doc = yaml("items:\n- a\n- b\n");
        assert!(delete_path(&mut doc, &PathExpr::parse("items[0]"), None));
        assert_eq!(doc["items"], yaml("- b\n"));
    }
}
