//! # Lenient Pass
//!
//! A second, schema-driven adjustment that runs right before validation
//! and catches what the per-parameter coercion rules did not: required
//! properties that are missing but declare a default get it, and scalars
//! of a compatible type are converted to the declared one.
//!
//! The pass reads the resolved documentation schema (OpenAPI flavour,
//! `nullable` as a flag) and only touches values it can convert
//! losslessly. Everything else is left for the validator to reject.

use serde_json::{Map, Value};

use crate::config::ValidationConfig;

/// Apply defaults and type coercion to `instance` as `schema` describes.
pub fn apply(schema: &Value, instance: &mut Value, config: &ValidationConfig) {
    if !config.apply_defaults && !config.coerce_types {
        return;
    }
    walk(schema, instance, config);
}

fn walk(schema: &Value, value: &mut Value, config: &ValidationConfig) {
    let Some(schema) = schema.as_object() else {
        return;
    };
    if config.coerce_types {
        coerce_scalar(schema, value);
    }
    match value {
        Value::Object(map) => {
            let properties = schema.get("properties").and_then(Value::as_object);
            if config.apply_defaults {
                fill_required_defaults(schema, properties, map);
            }
            if let Some(properties) = properties {
                for (name, property_schema) in properties {
                    if let Some(child) = map.get_mut(name) {
                        walk(property_schema, child, config);
                    }
                }
            }
        }
        Value::Array(items) => match schema.get("items") {
            Some(item_schema @ Value::Object(_)) => {
                for item in items {
                    walk(item_schema, item, config);
                }
            }
            // Positional item schemas, one per element.
            Some(Value::Array(item_schemas)) => {
                for (item_schema, item) in item_schemas.iter().zip(items.iter_mut()) {
                    walk(item_schema, item, config);
                }
            }
            _ => {}
        },
        _ => {}
    }
}

fn fill_required_defaults(
    schema: &Map<String, Value>,
    properties: Option<&Map<String, Value>>,
    map: &mut Map<String, Value>,
) {
    let (Some(required), Some(properties)) = (schema.get("required").and_then(Value::as_array), properties)
    else {
        return;
    };
    for name in required.iter().filter_map(Value::as_str) {
        if map.contains_key(name) {
            continue;
        }
        if let Some(default) = properties.get(name).and_then(|p| p.get("default")) {
            map.insert(name.to_string(), default.clone());
        }
    }
}

fn coerce_scalar(schema: &Map<String, Value>, value: &mut Value) {
    let Some(target) = schema.get("type").and_then(Value::as_str) else {
        return;
    };
    let converted = match (target, &*value) {
        ("integer", Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),
        ("integer", Value::Number(n)) if n.as_i64().is_none() && n.as_u64().is_none() => n
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0)
            .map(|f| Value::from(f as i64)),
        ("integer", Value::Bool(b)) => Some(Value::from(i64::from(*b))),
        ("number", Value::String(s)) => parse_number(s),
        ("number", Value::Bool(b)) => Some(Value::from(i64::from(*b))),
        ("boolean", Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(Value::Bool(true)),
            "false" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
        ("boolean", Value::Number(n)) => match n.as_i64() {
            Some(1) => Some(Value::Bool(true)),
            Some(0) => Some(Value::Bool(false)),
            _ => None,
        },
        ("string", Value::Number(n)) => Some(Value::String(n.to_string())),
        ("string", Value::Bool(b)) => Some(Value::String(b.to_string())),
        ("array", other) if !other.is_array() && !other.is_null() => Some(Value::Array(vec![other.clone()])),
        _ => None,
    };
    if let Some(converted) = converted {
        *value = converted;
    }
}

fn parse_number(s: &str) -> Option<Value> {
    let trimmed = s.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Value::from(i));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "type": "object",
            "required": ["count", "flag"],
            "properties": {
                "count": {"type": "integer", "default": 10},
                "flag": {"type": "boolean"},
                "ratio": {"type": "number"},
                "label": {"type": "string"},
                "ids": {"type": "array", "items": {"type": "integer"}},
                "note": {"type": "string", "default": "optional defaults are not applied"}
            }
        })
    }

    #[test]
    fn required_defaults_only() {
        let mut instance = json!({"flag": true});
        apply(&schema(), &mut instance, &ValidationConfig::default());
        assert_eq!(instance, json!({"flag": true, "count": 10}));
    }

    #[test]
    fn compatible_types_are_converted() {
        let mut instance = json!({
            "count": "7", "flag": "false", "ratio": "0.25", "label": 12, "ids": "3"
        });
        apply(&schema(), &mut instance, &ValidationConfig::default());
        assert_eq!(
            instance,
            json!({"count": 7, "flag": false, "ratio": 0.25, "label": "12", "ids": [3]})
        );
    }

    #[test]
    fn incompatible_values_are_left_alone() {
        let mut instance = json!({"count": "seven", "flag": "abcdef"});
        apply(&schema(), &mut instance, &ValidationConfig::default());
        assert_eq!(instance, json!({"count": "seven", "flag": "abcdef"}));
    }

    #[test]
    fn positional_items_convert_each_element() {
        let schema = json!({"type": "array", "items": [
            {"type": "object", "properties": {"n": {"type": "integer"}}},
            {"type": "object", "properties": {"b": {"type": "boolean"}}}
        ]});
        let mut instance = json!([{"n": "4"}, {"b": "true"}]);
        apply(&schema, &mut instance, &ValidationConfig::default());
        assert_eq!(instance, json!([{"n": 4}, {"b": true}]));
    }

    #[test]
    fn disabled_config_is_a_no_op() {
        let config = ValidationConfig {
            validate_responses: false,
            apply_defaults: false,
            coerce_types: false,
        };
        let mut instance = json!({"count": "7"});
        apply(&schema(), &mut instance, &config);
        assert_eq!(instance, json!({"count": "7"}));
    }
}
