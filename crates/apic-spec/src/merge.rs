//! # allOf Merging
//!
//! Flattens `allOf` compositions into a single schema so the validator
//! sees one object with the union of every member's properties and
//! required lists. Objects merge key by key, arrays merge as a distinct
//! union preserving first-seen order, and any other value is replaced by
//! the later one.

use serde_json::{Map, Value};

/// Merge every `allOf` in `node`, at any depth.
///
/// Sibling keywords next to an `allOf` are applied on top of the merged
/// members.
pub fn merge_all_of(node: &Value) -> Value {
    match node {
        Value::Object(map) => {
            let rest: Map<String, Value> = map
                .iter()
                .filter(|(k, _)| k.as_str() != "allOf")
                .map(|(k, v)| (k.clone(), merge_all_of(v)))
                .collect();
            match map.get("allOf").and_then(Value::as_array) {
                Some(members) => {
                    let merged = members
                        .iter()
                        .map(merge_all_of)
                        .fold(Value::Object(Map::new()), recursive_distinct_merge);
                    recursive_distinct_merge(merged, Value::Object(rest))
                }
                None => Value::Object(rest),
            }
        }
        Value::Array(items) => Value::Array(items.iter().map(merge_all_of).collect()),
        other => other.clone(),
    }
}

/// Merge `overlay` into `base`.
pub fn recursive_distinct_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                let merged = match base.remove(&key) {
                    Some(existing) => recursive_distinct_merge(existing, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            Value::Object(base)
        }
        (Value::Array(mut base), Value::Array(overlay)) => {
            for item in overlay {
                if !base.contains(&item) {
                    base.push(item);
                }
            }
            Value::Array(base)
        }
        (_, overlay) => overlay,
    }
}
