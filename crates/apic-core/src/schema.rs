//! # Schema → Parameter Conversion
//!
//! Reads a JSON-Schema-shaped node back into a [`Parameter`]. Post bodies
//! declared as schemas, and branches of a discriminated union, are turned
//! into parameters this way so they go through the same coercion rules
//! as flat parameter maps.
//!
//! The node must already be resolved: `$ref`, `allOf`, `oneOf` and `anyOf`
//! are rejected here and handled by the specification registry.

use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::parameter::{Parameter, ParameterKind, ParameterType};

impl Parameter {
    /// Build a parameter from a resolved schema node.
    ///
    /// The `type` keyword may be a string or a two-element list containing
    /// `"null"` (which marks the parameter nullable). When `type` is absent
    /// the kind is inferred from `properties` or `items`.
    ///
    /// # Errors
    ///
    /// [`CoreError::UnknownType`] for an unrecognised type tag and
    /// [`CoreError::InvalidSchema`] for unresolved compositions or
    /// malformed nodes.
    pub fn from_schema(schema: &Value) -> Result<Self, CoreError> {
        from_node(schema, "")
    }
}

fn from_node(node: &Value, pointer: &str) -> Result<Parameter, CoreError> {
    let obj = node
        .as_object()
        .ok_or_else(|| CoreError::invalid_schema(pointer, "schema node must be an object"))?;

    for keyword in ["$ref", "allOf", "oneOf", "anyOf"] {
        if obj.contains_key(keyword) {
            return Err(CoreError::invalid_schema(
                pointer,
                format!("'{keyword}' must be resolved before conversion"),
            ));
        }
    }

    let (parameter_type, null_in_type) = read_type(obj, pointer)?;
    let mut param = Parameter::of_type(parameter_type);

    match &mut param.kind {
        ParameterKind::String(rules) => {
            rules.format = str_field(obj, "format");
            rules.pattern = str_field(obj, "pattern");
            rules.min_length = obj.get("minLength").and_then(Value::as_u64);
            rules.max_length = obj.get("maxLength").and_then(Value::as_u64);
        }
        ParameterKind::Integer(rules) | ParameterKind::Number(rules) => {
            rules.format = str_field(obj, "format");
            rules.minimum = obj.get("minimum").and_then(Value::as_f64);
            rules.maximum = obj.get("maximum").and_then(Value::as_f64);
            rules.multiple_of = obj.get("multipleOf").and_then(Value::as_f64);
            // Draft 6+ spells exclusive bounds as numbers.
            match obj.get("exclusiveMinimum") {
                Some(Value::Bool(b)) => rules.exclusive_minimum = *b,
                Some(n) if n.is_number() => {
                    rules.minimum = n.as_f64();
                    rules.exclusive_minimum = true;
                }
                _ => {}
            }
            match obj.get("exclusiveMaximum") {
                Some(Value::Bool(b)) => rules.exclusive_maximum = *b,
                Some(n) if n.is_number() => {
                    rules.maximum = n.as_f64();
                    rules.exclusive_maximum = true;
                }
                _ => {}
            }
        }
        ParameterKind::Boolean => {}
        ParameterKind::Array(rules) => {
            if let Some(items) = obj.get("items") {
                let child = format!("{pointer}/items");
                rules.items = Some(Box::new(from_node(items, &child)?));
            }
            rules.min_items = obj.get("minItems").and_then(Value::as_u64);
            rules.max_items = obj.get("maxItems").and_then(Value::as_u64);
            rules.unique_items = bool_field(obj, "uniqueItems");
        }
        ParameterKind::Object(rules) => {
            let required: Vec<&str> = obj
                .get("required")
                .and_then(Value::as_array)
                .map(|names| names.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            if let Some(props) = obj.get("properties") {
                let props = props.as_object().ok_or_else(|| {
                    CoreError::invalid_schema(pointer, "'properties' must be an object")
                })?;
                for (name, child_schema) in props {
                    let child = format!("{pointer}/properties/{}", escape_pointer(name));
                    let mut child_param = from_node(child_schema, &child)?;
                    if required.contains(&name.as_str()) {
                        child_param = child_param.required();
                    }
                    rules.properties.insert(name.clone(), child_param);
                }
            }
            rules.additional_properties = match obj.get("additionalProperties") {
                Some(Value::Bool(b)) => Some(*b),
                Some(Value::Object(_)) => Some(true),
                _ => None,
            };
        }
    }

    param.nullable = null_in_type || bool_field(obj, "nullable");
    param.deprecated = bool_field(obj, "deprecated");
    param.read_only = bool_field(obj, "readOnly");
    param.write_only = bool_field(obj, "writeOnly");
    param.title = str_field(obj, "title");
    param.description = str_field(obj, "description");
    param.default = obj.get("default").cloned();
    param.example = obj.get("example").cloned();
    param.enum_values = obj.get("enum").and_then(Value::as_array).cloned();
    param.examples = obj
        .get("examples")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    Ok(param)
}

fn read_type(obj: &Map<String, Value>, pointer: &str) -> Result<(ParameterType, bool), CoreError> {
    match obj.get("type") {
        Some(Value::String(tag)) => Ok((tag.parse()?, false)),
        Some(Value::Array(tags)) => {
            let tags: Vec<&str> = tags.iter().filter_map(Value::as_str).collect();
            let non_null: Vec<&str> = tags.iter().copied().filter(|t| *t != "null").collect();
            match non_null.as_slice() {
                [single] => Ok((single.parse()?, tags.len() > non_null.len())),
                _ => Err(CoreError::invalid_schema(
                    pointer,
                    "type list must name exactly one non-null type",
                )),
            }
        }
        Some(_) => Err(CoreError::invalid_schema(pointer, "'type' must be a string or list")),
        None if obj.contains_key("properties") => Ok((ParameterType::Object, false)),
        None if obj.contains_key("items") => Ok((ParameterType::Array, false)),
        None => Err(CoreError::invalid_schema(pointer, "schema node has no type")),
    }
}

fn str_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

fn bool_field(obj: &Map<String, Value>, key: &str) -> bool {
    obj.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn escape_pointer(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}
