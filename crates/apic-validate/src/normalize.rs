//! # Schema Normalisation
//!
//! Declarations are written in the OpenAPI 3.0 schema dialect. The
//! validator speaks JSON Schema Draft 7. This module rewrites the
//! differences:
//!
//! - `nullable: true` becomes `type: [T, "null"]` when the node has a
//!   single type, and an `anyOf` with a `null` branch otherwise. A
//!   nullable `enum` gains `null` as an allowed value.
//! - Boolean `exclusiveMinimum`/`exclusiveMaximum` become numeric bounds.
//! - OpenAPI-only annotations are dropped.
//!
//! Only schema-bearing keywords are walked, so data such as `default`
//! and `enum` values is never rewritten.

use serde_json::{json, Map, Value};

const OPENAPI_ONLY: &[&str] = &["nullable", "discriminator", "example", "deprecated", "xml", "externalDocs"];

const SCHEMA_MAPS: &[&str] = &["properties", "patternProperties", "definitions"];
const SCHEMA_LISTS: &[&str] = &["allOf", "anyOf", "oneOf"];
const SCHEMA_SINGLES: &[&str] = &["not", "additionalProperties", "items", "additionalItems", "contains", "propertyNames"];

/// Rewrite an OpenAPI schema into its Draft 7 equivalent.
pub fn to_draft7(node: &Value) -> Value {
    let Some(map) = node.as_object() else {
        return node.clone();
    };

    let mut out = Map::new();
    for (key, value) in map {
        let key_str = key.as_str();
        if OPENAPI_ONLY.contains(&key_str) {
            continue;
        }
        let rewritten = if SCHEMA_MAPS.contains(&key_str) {
            match value {
                Value::Object(children) => Value::Object(
                    children
                        .iter()
                        .map(|(name, child)| (name.clone(), to_draft7(child)))
                        .collect(),
                ),
                other => other.clone(),
            }
        } else if SCHEMA_LISTS.contains(&key_str) || (key_str == "items" && value.is_array()) {
            match value {
                Value::Array(children) => Value::Array(children.iter().map(to_draft7).collect()),
                other => other.clone(),
            }
        } else if SCHEMA_SINGLES.contains(&key_str) {
            to_draft7(value)
        } else {
            value.clone()
        };
        out.insert(key.clone(), rewritten);
    }

    rewrite_exclusive(&mut out, "minimum", "exclusiveMinimum");
    rewrite_exclusive(&mut out, "maximum", "exclusiveMaximum");

    if map.get("nullable") == Some(&Value::Bool(true)) {
        return make_nullable(out);
    }
    Value::Object(out)
}

fn rewrite_exclusive(out: &mut Map<String, Value>, bound: &str, exclusive: &str) {
    match out.get(exclusive) {
        Some(Value::Bool(true)) => {
            out.remove(exclusive);
            if let Some(limit) = out.remove(bound) {
                out.insert(exclusive.to_string(), limit);
            }
        }
        Some(Value::Bool(false)) => {
            out.remove(exclusive);
        }
        _ => {}
    }
}

fn make_nullable(mut out: Map<String, Value>) -> Value {
    if let Some(Value::Array(values)) = out.get_mut("enum") {
        if !values.contains(&Value::Null) {
            values.push(Value::Null);
        }
    }
    match out.get("type").cloned() {
        Some(Value::String(single)) => {
            out.insert("type".into(), json!([single, "null"]));
            Value::Object(out)
        }
        Some(Value::Array(mut list)) => {
            if !list.contains(&json!("null")) {
                list.push(json!("null"));
            }
            out.insert("type".into(), Value::Array(list));
            Value::Object(out)
        }
        _ => json!({ "anyOf": [Value::Object(out), { "type": "null" }] }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nullable_scalar_gets_null_type() {
        assert_eq!(
            to_draft7(&json!({"type": "string", "nullable": true, "maxLength": 3})),
            json!({"type": ["string", "null"], "maxLength": 3})
        );
    }

    #[test]
    fn nullable_enum_allows_null() {
        assert_eq!(
            to_draft7(&json!({"type": "string", "nullable": true, "enum": ["a", "b"]})),
            json!({"type": ["string", "null"], "enum": ["a", "b", null]})
        );
    }

    #[test]
    fn untyped_nullable_becomes_any_of() {
        assert_eq!(
            to_draft7(&json!({"properties": {"a": {"type": "integer"}}, "nullable": true})),
            json!({"anyOf": [{"properties": {"a": {"type": "integer"}}}, {"type": "null"}]})
        );
    }

    #[test]
    fn boolean_exclusive_bounds_become_numeric() {
        assert_eq!(
            to_draft7(&json!({"type": "number", "minimum": 0, "exclusiveMinimum": true, "maximum": 5, "exclusiveMaximum": false})),
            json!({"type": "number", "exclusiveMinimum": 0, "maximum": 5})
        );
    }

    #[test]
    fn nested_schemas_are_walked_but_data_is_not() {
        let schema = json!({
            "type": "object",
            "default": {"nullable": true},
            "properties": {"inner": {"type": "integer", "nullable": true, "example": 3}},
            "items": [{"type": "string", "deprecated": true}]
        });
        assert_eq!(
            to_draft7(&schema),
            json!({
                "type": "object",
                "default": {"nullable": true},
                "properties": {"inner": {"type": ["integer", "null"]}},
                "items": [{"type": "string"}]
            })
        );
    }
}
